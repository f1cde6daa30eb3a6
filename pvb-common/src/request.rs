//! Typed provisioning requests for the approval subsystem.
//!
//! A request carries one beneficiary with one application-instance target.
//! Attribute types are either supplied by the caller as [`AttributeValue`]s
//! or inferred from loosely-typed [`FieldValue`]s by runtime category:
//! integer, then long, then date, then boolean, with text as the fallback.
//! Null values are skipped (no-op, not a clear).

use crate::errors::{EntityKind, InvalidArgument, PvbError};
use crate::store::{AppInstanceDirectory, ApplicationInstance, RequestGateway};
use crate::types::{FieldMap, FieldValue};
use crate::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Wire-level type tag of a request attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    Integer,
    Long,
    Date,
    Boolean,
    String,
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AttributeValue {
    Integer(i32),
    Long(i64),
    Date(DateTime<Utc>),
    Boolean(bool),
    String(String),
}

impl AttributeValue {
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Self::Integer(_) => AttributeType::Integer,
            Self::Long(_) => AttributeType::Long,
            Self::Date(_) => AttributeType::Date,
            Self::Boolean(_) => AttributeType::Boolean,
            Self::String(_) => AttributeType::String,
        }
    }

    /// Infer the type from the value's runtime category; `None` for null.
    pub fn infer(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Null => None,
            FieldValue::Integer(n) => Some(Self::Integer(*n)),
            FieldValue::Long(n) => Some(Self::Long(*n)),
            FieldValue::Date(d) => Some(Self::Date(*d)),
            FieldValue::Boolean(b) => Some(Self::Boolean(*b)),
            FieldValue::Text(s) => Some(Self::String(s.clone())),
            other @ FieldValue::Decimal(_) => Some(Self::String(other.to_string())),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Long(n) => write!(f, "{n}"),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Per-attribute action, set on modify requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeAction {
    Add,
    Modify,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedAttribute {
    pub name: String,
    pub value: AttributeValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<AttributeAction>,
}

impl TypedAttribute {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
            action: None,
        }
    }

    pub fn attribute_type(&self) -> AttributeType {
        self.value.attribute_type()
    }

    /// Build attributes from loosely-typed values, dropping nulls.
    pub fn infer_all(fields: &FieldMap) -> Vec<Self> {
        fields
            .iter()
            .filter_map(|(name, value)| {
                let typed = AttributeValue::infer(value)?;
                debug!(field = %name, attribute_type = ?typed.attribute_type(), "inferred attribute type");
                Some(Self::new(name, typed))
            })
            .collect()
    }
}

/// Operation requested on the target entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Provision,
    Modify,
    Revoke,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provision => write!(f, "PROVISION"),
            Self::Modify => write!(f, "MODIFY"),
            Self::Revoke => write!(f, "REVOKE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    ApplicationInstance,
}

/// The single target entity of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEntity {
    pub entity_type: EntityType,
    /// Application instance name.
    pub sub_type: String,
    /// Application instance key for grants, account id otherwise.
    pub entity_key: String,
    pub operation: Operation,
    #[serde(default)]
    pub attributes: Vec<TypedAttribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub key: String,
    pub targets: Vec<RequestEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestData {
    pub beneficiaries: Vec<Beneficiary>,
}

impl RequestData {
    fn single(beneficiary: &str, entity: RequestEntity) -> Self {
        Self {
            beneficiaries: vec![Beneficiary {
                key: beneficiary.to_string(),
                targets: vec![entity],
            }],
        }
    }
}

/// Whether a submission goes through approval or is applied directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    #[default]
    Request,
    Direct,
}

/// Result returned by the approval subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Builds and submits grant, modify and revoke requests.
///
/// Each method returns the terminal status reported by the approval
/// subsystem, or `None` when it returned no result (submitted, status
/// unknown). Transport failures propagate unchanged; nothing is retried.
pub struct RequestBuilder {
    gateway: Arc<dyn RequestGateway>,
    apps: Arc<dyn AppInstanceDirectory>,
    intent: Intent,
}

impl RequestBuilder {
    pub fn new(gateway: Arc<dyn RequestGateway>, apps: Arc<dyn AppInstanceDirectory>) -> Self {
        Self {
            gateway,
            apps,
            intent: Intent::Request,
        }
    }

    #[must_use]
    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = intent;
        self
    }

    /// Request a new account with loosely-typed form values.
    pub fn grant(
        &self,
        beneficiary: &str,
        app_instance: &str,
        fields: &FieldMap,
    ) -> Result<Option<String>> {
        self.grant_typed(beneficiary, app_instance, TypedAttribute::infer_all(fields))
    }

    /// Request a new account with caller-typed attributes.
    pub fn grant_typed(
        &self,
        beneficiary: &str,
        app_instance: &str,
        attributes: Vec<TypedAttribute>,
    ) -> Result<Option<String>> {
        require_beneficiary(beneficiary)?;
        let app = self.app_instance(app_instance)?;
        let request = grant_request(beneficiary, &app, attributes);
        self.submit(&request, beneficiary, app_instance, Operation::Provision)
    }

    /// Request changes to an existing account. Every attribute is tagged
    /// with the modify action.
    pub fn modify(
        &self,
        beneficiary: &str,
        app_instance: &str,
        account_id: &str,
        attributes: Vec<TypedAttribute>,
    ) -> Result<Option<String>> {
        require_beneficiary(beneficiary)?;
        require_account_id(account_id)?;
        let attributes = attributes
            .into_iter()
            .map(|a| TypedAttribute {
                action: Some(AttributeAction::Modify),
                ..a
            })
            .collect();
        let request = RequestData::single(
            beneficiary,
            RequestEntity {
                entity_type: EntityType::ApplicationInstance,
                sub_type: app_instance.to_string(),
                entity_key: account_id.to_string(),
                operation: Operation::Modify,
                attributes,
            },
        );
        self.submit(&request, beneficiary, app_instance, Operation::Modify)
    }

    /// Request revocation of an account.
    pub fn revoke(
        &self,
        beneficiary: &str,
        app_instance: &str,
        account_id: &str,
    ) -> Result<Option<String>> {
        require_beneficiary(beneficiary)?;
        require_account_id(account_id)?;
        let request = RequestData::single(
            beneficiary,
            RequestEntity {
                entity_type: EntityType::ApplicationInstance,
                sub_type: app_instance.to_string(),
                entity_key: account_id.to_string(),
                operation: Operation::Revoke,
                attributes: Vec::new(),
            },
        );
        self.submit(&request, beneficiary, app_instance, Operation::Revoke)
    }

    fn app_instance(&self, name: &str) -> Result<ApplicationInstance> {
        self.apps
            .find_by_name(name)?
            .ok_or_else(|| PvbError::not_found(EntityKind::ApplicationInstance, name))
    }

    fn submit(
        &self,
        request: &RequestData,
        beneficiary: &str,
        app_instance: &str,
        operation: Operation,
    ) -> Result<Option<String>> {
        let result = self.gateway.submit(request, self.intent)?;
        let status = result.map(|r| r.status);
        info!(
            beneficiary,
            app_instance,
            %operation,
            intent = ?self.intent,
            status = status.as_deref().unwrap_or("<none>"),
            "submitted provisioning request"
        );
        Ok(status)
    }
}

fn grant_request(
    beneficiary: &str,
    app: &ApplicationInstance,
    attributes: Vec<TypedAttribute>,
) -> RequestData {
    RequestData::single(
        beneficiary,
        RequestEntity {
            entity_type: EntityType::ApplicationInstance,
            sub_type: app.name.clone(),
            entity_key: app.key.to_string(),
            operation: Operation::Provision,
            attributes,
        },
    )
}

fn require_beneficiary(beneficiary: &str) -> Result<()> {
    if beneficiary.trim().is_empty() {
        return Err(InvalidArgument::EmptyBeneficiary.into());
    }
    Ok(())
}

fn require_account_id(account_id: &str) -> Result<()> {
    if account_id.trim().is_empty() {
        return Err(InvalidArgument::EmptyAccountId.into());
    }
    Ok(())
}
