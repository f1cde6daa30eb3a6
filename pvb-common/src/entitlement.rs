//! Entitlement reconciliation against lookup catalogs.
//!
//! `find_or_create` is a non-atomic check-then-act sequence: two callers
//! racing on the same new code can both miss the existence check and both
//! create. Creation is therefore at-least-once. After a create the code is
//! re-read and, when several entitlements carry it, every caller converges
//! on the one with the lowest key.

use crate::errors::InvalidArgument;
use crate::schema::SchemaCache;
use crate::store::{AppInstanceDirectory, EntitlementStore, LookupCatalog};
use crate::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// A persisted entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Entitlement {
    pub key: i64,
    /// External identifier, unique within its lookup list.
    pub code: String,
    /// Decoded label from the lookup list.
    pub value: String,
    pub display_name: String,
    pub lookup_list: String,
    pub app_instance: String,
    pub app_instance_key: i64,
    pub it_resource_key: i64,
    pub object_key: i64,
    pub form_key: i64,
    pub form_field_key: i64,
    pub lookup_value_key: i64,
    pub valid: bool,
}

/// An entitlement ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEntitlement {
    pub code: String,
    pub value: String,
    pub display_name: String,
    pub lookup_list: String,
    pub app_instance: String,
    pub app_instance_key: i64,
    pub it_resource_key: i64,
    pub object_key: i64,
    pub form_key: i64,
    pub form_field_key: i64,
    pub lookup_value_key: i64,
    pub valid: bool,
}

impl NewEntitlement {
    /// Attach the key assigned by the store.
    pub fn into_entitlement(self, key: i64) -> Entitlement {
        Entitlement {
            key,
            code: self.code,
            value: self.value,
            display_name: self.display_name,
            lookup_list: self.lookup_list,
            app_instance: self.app_instance,
            app_instance_key: self.app_instance_key,
            it_resource_key: self.it_resource_key,
            object_key: self.object_key,
            form_key: self.form_key,
            form_field_key: self.form_field_key,
            lookup_value_key: self.lookup_value_key,
            valid: self.valid,
        }
    }
}

/// What to reconcile: a lookup pair bound to a child-form field of an
/// application instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementTarget {
    pub app_instance: String,
    pub lookup_list: String,
    pub code: String,
    pub label: String,
    pub form: String,
    pub field: String,
}

/// Outcome of [`EntitlementReconciler::find_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// An entitlement with the code already existed (or won a create race).
    Existing(Entitlement),
    /// This call created the entitlement.
    Created(Entitlement),
}

impl Reconciliation {
    pub fn entitlement(&self) -> &Entitlement {
        match self {
            Self::Existing(e) | Self::Created(e) => e,
        }
    }

    pub fn into_entitlement(self) -> Entitlement {
        match self {
            Self::Existing(e) | Self::Created(e) => e,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

pub struct EntitlementReconciler {
    entitlements: Arc<dyn EntitlementStore>,
    lookups: Arc<dyn LookupCatalog>,
    apps: Arc<dyn AppInstanceDirectory>,
    schema: SchemaCache,
}

impl EntitlementReconciler {
    pub fn new(
        entitlements: Arc<dyn EntitlementStore>,
        lookups: Arc<dyn LookupCatalog>,
        apps: Arc<dyn AppInstanceDirectory>,
        schema: SchemaCache,
    ) -> Self {
        Self {
            entitlements,
            lookups,
            apps,
            schema,
        }
    }

    /// Return the entitlement carrying `target.code`, creating it if none
    /// exists. Every referenced key is validated before anything is written.
    ///
    /// When duplicates carry the code, the lowest key is returned whatever
    /// order the store lists them in.
    pub fn find_or_create(&self, target: &EntitlementTarget) -> Result<Reconciliation> {
        let existing = self
            .entitlements
            .find_by_code(&target.code)?
            .into_iter()
            .min_by_key(|e| e.key);
        if let Some(existing) = existing {
            info!(
                code = %target.code,
                key = existing.key,
                "found existing entitlement"
            );
            return Ok(Reconciliation::Existing(existing));
        }

        let lookup_value_key = self
            .lookups
            .lookup_values(&target.lookup_list)?
            .into_iter()
            .find(|v| v.code == target.code && v.decode == target.label)
            .map(|v| v.key)
            .ok_or_else(|| InvalidArgument::LookupPairNotFound {
                list: target.lookup_list.clone(),
                code: target.code.clone(),
                label: target.label.clone(),
            })?;

        let app = self
            .apps
            .find_by_name(&target.app_instance)?
            .ok_or_else(|| InvalidArgument::UnknownAppInstance(target.app_instance.clone()))?;

        let form_key = self.schema.form_key(&target.form)?;
        let form_field_key = self
            .schema
            .field_keys(&target.form)?
            .get(&target.field)
            .copied()
            .ok_or_else(|| InvalidArgument::FieldKeyUnresolved {
                form: target.form.clone(),
                field: target.field.clone(),
            })?;

        let prefix = format!("{}~", app.it_resource_name);
        let display_name = target
            .label
            .strip_prefix(&prefix)
            .unwrap_or(&target.label)
            .to_string();

        let created = self.entitlements.add(NewEntitlement {
            code: target.code.clone(),
            value: target.label.clone(),
            display_name,
            lookup_list: target.lookup_list.clone(),
            app_instance: app.name.clone(),
            app_instance_key: app.key,
            it_resource_key: app.it_resource_key,
            object_key: app.object_key,
            form_key,
            form_field_key,
            lookup_value_key,
            valid: true,
        })?;
        info!(
            code = %created.code,
            key = created.key,
            app_instance = %app.name,
            "created entitlement"
        );

        Ok(self.converge(created))
    }

    /// Re-read the code after a create so racing callers agree on one record.
    fn converge(&self, created: Entitlement) -> Reconciliation {
        let carrying = match self.entitlements.find_by_code(&created.code) {
            Ok(carrying) => carrying,
            Err(err) => {
                warn!(code = %created.code, error = %err, "could not re-read entitlement after create");
                return Reconciliation::Created(created);
            }
        };
        if carrying.len() > 1 {
            warn!(
                code = %created.code,
                count = carrying.len(),
                "duplicate entitlements carry the same code"
            );
        }
        match carrying.into_iter().min_by_key(|e| e.key) {
            Some(winner) if winner.key != created.key => Reconciliation::Existing(winner),
            _ => Reconciliation::Created(created),
        }
    }
}
