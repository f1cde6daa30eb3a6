//! Form schema resolution.
//!
//! Every query re-reads form, version and field metadata from the
//! [`FormStore`]; nothing is cached between calls, so an administrator's
//! schema change is visible on the next call. Callers issuing several
//! queries against one form should [`SchemaCache::load`] once and use the
//! returned [`FormSchema`].

use crate::errors::{EntityKind, PvbError};
use crate::store::{AppInstanceDirectory, Criteria, FormStore, ObjectStore, RecordSet, Row, columns};
use crate::types::{FieldMap, SchemaConfig};
use crate::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Identifies a form by table name or numeric key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormRef<'a> {
    Name(&'a str),
    Key(i64),
}

impl fmt::Display for FormRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Key(key) => write!(f, "#{key}"),
        }
    }
}

impl<'a> From<&'a str> for FormRef<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl From<i64> for FormRef<'_> {
    fn from(key: i64) -> Self {
        Self::Key(key)
    }
}

/// A form as returned by the form search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormDefinition {
    pub key: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Declared type of a form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum FieldType {
    TextField,
    PasswordField,
    CheckBox,
    DateField,
    LookupField,
    ItResourceLookupField,
    Other(String),
}

impl FieldType {
    /// Parse a platform type name, ignoring case.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "textfield" => Self::TextField,
            "passwordfield" => Self::PasswordField,
            "checkbox" => Self::CheckBox,
            "datefielddlg" | "datefield" => Self::DateField,
            "lookupfield" => Self::LookupField,
            "itresourcelookupfield" => Self::ItResourceLookupField,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::TextField => "TextField",
            Self::PasswordField => "PasswordField",
            Self::CheckBox => "CheckBox",
            Self::DateField => "DateFieldDlg",
            Self::LookupField => "LookupField",
            Self::ItResourceLookupField => "ITResourceLookupField",
            Self::Other(raw) => raw,
        }
    }

    pub fn matches(&self, type_name: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(type_name)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

/// One field of a form version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDefinition {
    pub key: i64,
    pub name: String,
    pub label: Option<String>,
    pub field_type: FieldType,
    /// Lookup list bound to the field, for lookup-typed fields.
    pub lookup: Option<String>,
    /// Display order; unset sorts after every set order.
    pub order: Option<i64>,
    pub visible: bool,
    pub encrypted: bool,
}

impl FieldDefinition {
    /// Encrypted or hidden fields are never rendered.
    pub fn is_redacted(&self) -> bool {
        self.encrypted || !self.visible
    }

    /// The label when non-empty, otherwise the system name.
    pub fn display_name(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ => &self.name,
        }
    }

    fn from_row(row: &Row, lookup_column: bool) -> Result<Self> {
        let name = row.get_string(columns::FORM_FIELD_NAME)?.unwrap_or_default();
        let field_type = row.get_string(columns::FORM_FIELD_TYPE)?.unwrap_or_default();
        let encrypted = row
            .get_string(columns::FORM_FIELD_ENCRYPTED)?
            .is_some_and(|raw| is_truthy(&raw));
        let visible = if row.has_column(columns::FORM_FIELD_VISIBLE) {
            !row
                .get_string(columns::FORM_FIELD_VISIBLE)?
                .is_some_and(|raw| raw.eq_ignore_ascii_case("false"))
        } else {
            true
        };
        let lookup = if lookup_column {
            row.get_string(columns::FORM_FIELD_LOOKUP_CODE)?
                .filter(|l| !l.is_empty())
        } else {
            None
        };

        Ok(Self {
            key: row.get_i64(columns::FORM_FIELD_KEY)?,
            name,
            label: row.get_string(columns::FORM_FIELD_LABEL)?,
            field_type: FieldType::parse(&field_type),
            lookup,
            order: row.get_opt_i64(columns::FORM_FIELD_ORDER)?,
            visible,
            encrypted,
        })
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y")
}

/// Active version of a form with its fields in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSchema {
    pub form: FormDefinition,
    pub version: i32,
    pub fields: Vec<FieldDefinition>,
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the fields declared with the given type, in display order.
    pub fn field_names_by_type(&self, type_name: &str) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.field_type.matches(type_name))
            .map(|f| f.name.clone())
            .collect()
    }

    /// Reorder values by stored field order. Unknown names keep their
    /// relative order after every known field.
    pub fn order_values(&self, values: FieldMap) -> FieldMap {
        let mut entries: Vec<(String, _)> = values.into_iter().collect();
        entries.sort_by_key(|(name, _)| {
            self.fields
                .iter()
                .position(|f| f.name == *name)
                .unwrap_or(usize::MAX)
        });
        entries.into_iter().collect()
    }
}

/// Resolves form, field and object metadata on every call.
#[derive(Clone)]
pub struct SchemaCache {
    forms: Arc<dyn FormStore>,
    objects: Arc<dyn ObjectStore>,
    apps: Arc<dyn AppInstanceDirectory>,
    config: SchemaConfig,
}

impl SchemaCache {
    pub fn new(
        forms: Arc<dyn FormStore>,
        objects: Arc<dyn ObjectStore>,
        apps: Arc<dyn AppInstanceDirectory>,
    ) -> Self {
        Self {
            forms,
            objects,
            apps,
            config: SchemaConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SchemaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Resolve a form by name or key. Zero matches is `NotFound`, more than
    /// one is `Ambiguous`.
    pub fn resolve_form<'a>(&self, form: impl Into<FormRef<'a>>) -> Result<FormDefinition> {
        let form = form.into();
        let criteria = match form {
            FormRef::Name(name) => Criteria::eq(columns::FORM_NAME, name),
            FormRef::Key(key) => Criteria::eq(columns::FORM_KEY, key),
        };
        let found = self.forms.find_forms(&criteria)?;
        let row = single_row(&found, EntityKind::Form, &form.to_string())?;
        Ok(FormDefinition {
            key: row.get_i64(columns::FORM_KEY)?,
            name: row.get_string(columns::FORM_NAME)?.unwrap_or_default(),
            description: if row.has_column(columns::FORM_DESCRIPTION) {
                row.get_string(columns::FORM_DESCRIPTION)?
            } else {
                None
            },
        })
    }

    pub fn form_key(&self, name: &str) -> Result<i64> {
        Ok(self.resolve_form(name)?.key)
    }

    pub fn form_name(&self, key: i64) -> Result<String> {
        Ok(self.resolve_form(key)?.name)
    }

    pub fn form_description(&self, name: &str) -> Result<Option<String>> {
        Ok(self.resolve_form(name)?.description)
    }

    /// Active version of a form, `None` when the form has no versions.
    pub fn active_version(&self, form_key: i64) -> Result<Option<i32>> {
        let versions = self.forms.form_versions(form_key)?;
        match versions.first() {
            Some(row) => Ok(Some(row.get_i32(columns::FORM_ACTIVE_VERSION)?)),
            None => Ok(None),
        }
    }

    /// Load a form's active schema, or `None` when the form has no version.
    pub fn load_active(&self, name: &str) -> Result<Option<FormSchema>> {
        let form = self.resolve_form(name)?;
        let Some(version) = self.active_version(form.key)? else {
            debug!(form = %name, "form has no active version");
            return Ok(None);
        };

        let rows = self.forms.form_fields(form.key, version)?;
        let lookup_column = rows.has_column(columns::FORM_FIELD_LOOKUP_CODE);
        let mut fields = rows
            .rows()
            .iter()
            .map(|row| FieldDefinition::from_row(row, lookup_column))
            .collect::<Result<Vec<_>>>()?;
        // Stable: equal orders keep their stored sequence.
        fields.sort_by_key(|f| (f.order.is_none(), f.order));

        debug!(form = %name, version, fields = fields.len(), "loaded form schema");
        Ok(Some(FormSchema {
            form,
            version,
            fields,
        }))
    }

    /// Load a form's active schema; a form without a version is `NotFound`.
    pub fn load(&self, name: &str) -> Result<FormSchema> {
        self.load_active(name)?
            .ok_or_else(|| PvbError::not_found(EntityKind::FormVersion, name))
    }

    /// Fields of the active version in display order.
    pub fn list_fields(&self, name: &str) -> Result<Vec<FieldDefinition>> {
        Ok(self.load(name)?.fields)
    }

    pub fn field_labels(&self, name: &str) -> Result<BTreeMap<String, Option<String>>> {
        Ok(self
            .list_fields(name)?
            .into_iter()
            .map(|f| (f.name, f.label))
            .collect())
    }

    pub fn field_keys(&self, name: &str) -> Result<BTreeMap<String, i64>> {
        Ok(self
            .list_fields(name)?
            .into_iter()
            .map(|f| (f.name, f.key))
            .collect())
    }

    pub fn field_orders(&self, name: &str) -> Result<BTreeMap<String, Option<i64>>> {
        Ok(self
            .list_fields(name)?
            .into_iter()
            .map(|f| (f.name, f.order))
            .collect())
    }

    /// Field name to (declared type, bound lookup list).
    pub fn field_types(&self, name: &str) -> Result<BTreeMap<String, (FieldType, Option<String>)>> {
        Ok(self
            .list_fields(name)?
            .into_iter()
            .map(|f| (f.name, (f.field_type, f.lookup)))
            .collect())
    }

    pub fn field_names_by_type(&self, name: &str, type_name: &str) -> Result<Vec<String>> {
        Ok(self.load(name)?.field_names_by_type(type_name))
    }

    /// The field carrying the downstream IT-resource selector, if any.
    pub fn it_resource_field_name(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .field_names_by_type(name, &self.config.it_resource_field_type)?
            .into_iter()
            .next())
    }

    pub fn order_by_schema(&self, name: &str, values: FieldMap) -> Result<FieldMap> {
        Ok(self.load(name)?.order_values(values))
    }

    pub fn object_key(&self, name: &str) -> Result<i64> {
        let found = self
            .objects
            .find_objects(&Criteria::eq(columns::OBJECT_NAME, name))?;
        Ok(single_row(&found, EntityKind::Object, name)?.get_i64(columns::OBJECT_KEY)?)
    }

    pub fn object_name(&self, key: i64) -> Result<String> {
        let found = self
            .objects
            .find_objects(&Criteria::eq(columns::OBJECT_KEY, key))?;
        Ok(single_row(&found, EntityKind::Object, &format!("#{key}"))?
            .get_string(columns::OBJECT_NAME)?
            .unwrap_or_default())
    }

    /// Name of the application instance bound to an (object, IT resource)
    /// pair, `None` when no instance has that binding.
    pub fn app_instance_name(&self, object_key: i64, it_resource_key: i64) -> Result<Option<String>> {
        let mut found = self.apps.find_by_binding(object_key, it_resource_key)?;
        if found.len() > 1 {
            return Err(PvbError::ambiguous(
                EntityKind::ApplicationInstance,
                format!("object #{object_key} / IT resource #{it_resource_key}"),
                found.len(),
            ));
        }
        Ok(found.pop().map(|app| app.name))
    }
}

fn single_row<'a>(found: &'a RecordSet, kind: EntityKind, name: &str) -> Result<&'a Row> {
    match found.rows() {
        [row] => Ok(row),
        [] => Err(PvbError::not_found(kind, name)),
        rows => Err(PvbError::ambiguous(kind, name, rows.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FieldRecord, FormRecord, MemoryStore, StoreCall};
    use crate::store::{ApplicationInstance, ServiceError};

    fn store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::builder()
                .form(
                    FormRecord::new(10, "UD_APP")
                        .description("Application account")
                        .version(
                            1,
                            vec![FieldRecord::new(100, "UD_APP_OLD").order(1)],
                        )
                        .version(
                            2,
                            vec![
                                FieldRecord::new(101, "UD_APP_NOTES"),
                                FieldRecord::new(102, "UD_APP_PWD")
                                    .label("Password")
                                    .order(2)
                                    .encrypted(),
                                FieldRecord::new(103, "UD_APP_USR").label("User").order(1),
                                FieldRecord::new(104, "UD_APP_SERVER")
                                    .field_type("ITResourceLookupField")
                                    .order(0),
                                FieldRecord::new(105, "UD_APP_GROUP")
                                    .field_type("LookupField")
                                    .lookup("Lookup.App.Groups"),
                            ],
                        )
                        .active(2),
                )
                .form(FormRecord::new(20, "UD_EMPTY"))
                .object(5, "App Resource")
                .build(),
        )
    }

    fn cache(store: &Arc<MemoryStore>) -> SchemaCache {
        SchemaCache::new(store.clone(), store.clone(), store.clone())
    }

    #[test]
    fn test_resolve_form_by_name_and_key() {
        let store = store();
        let cache = cache(&store);
        let by_name = cache.resolve_form("UD_APP").unwrap();
        assert_eq!(by_name.key, 10);
        assert_eq!(by_name.description.as_deref(), Some("Application account"));
        assert_eq!(cache.resolve_form(10_i64).unwrap(), by_name);
        assert_eq!(cache.form_name(10).unwrap(), "UD_APP");
        assert_eq!(cache.form_key("UD_APP").unwrap(), 10);
    }

    #[test]
    fn test_unknown_form_is_not_found() {
        let store = store();
        let err = cache(&store).resolve_form("UD_NOPE").unwrap_err();
        assert!(matches!(
            err,
            PvbError::NotFound {
                kind: EntityKind::Form,
                ..
            }
        ));
    }

    #[test]
    fn test_list_fields_uses_active_version_in_order() {
        let store = store();
        let names: Vec<String> = cache(&store)
            .list_fields("UD_APP")
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "UD_APP_SERVER",
                "UD_APP_USR",
                "UD_APP_PWD",
                "UD_APP_NOTES",
                "UD_APP_GROUP"
            ]
        );
    }

    #[test]
    fn test_form_without_version() {
        let store = store();
        let cache = cache(&store);
        assert!(cache.load_active("UD_EMPTY").unwrap().is_none());
        let err = cache.list_fields("UD_EMPTY").unwrap_err();
        assert!(matches!(
            err,
            PvbError::NotFound {
                kind: EntityKind::FormVersion,
                ..
            }
        ));
    }

    #[test]
    fn test_derived_queries() {
        let store = store();
        let cache = cache(&store);

        let labels = cache.field_labels("UD_APP").unwrap();
        assert_eq!(labels["UD_APP_USR"].as_deref(), Some("User"));
        assert_eq!(labels["UD_APP_NOTES"], None);

        assert_eq!(cache.field_keys("UD_APP").unwrap()["UD_APP_PWD"], 102);
        assert_eq!(cache.field_orders("UD_APP").unwrap()["UD_APP_NOTES"], None);

        let types = cache.field_types("UD_APP").unwrap();
        assert_eq!(
            types["UD_APP_GROUP"],
            (FieldType::LookupField, Some("Lookup.App.Groups".to_string()))
        );

        assert_eq!(
            cache.it_resource_field_name("UD_APP").unwrap().as_deref(),
            Some("UD_APP_SERVER")
        );
        assert_eq!(
            cache
                .field_names_by_type("UD_APP", "lookupfield")
                .unwrap(),
            vec!["UD_APP_GROUP"]
        );
    }

    #[test]
    fn test_every_query_rereads() {
        let store = store();
        let cache = cache(&store);
        cache.field_labels("UD_APP").unwrap();
        cache.field_keys("UD_APP").unwrap();
        assert_eq!(store.calls(StoreCall::FormFields), 2);
    }

    #[test]
    fn test_order_by_schema_puts_unknown_last() {
        let store = store();
        let values = FieldMap::new()
            .with("EXTRA", 1)
            .with("UD_APP_USR", "alice")
            .with("UD_APP_SERVER", 4)
            .with("OTHER", 2);
        let ordered = cache(&store).order_by_schema("UD_APP", values).unwrap();
        let keys: Vec<&str> = ordered.keys().collect();
        assert_eq!(keys, vec!["UD_APP_SERVER", "UD_APP_USR", "EXTRA", "OTHER"]);
    }

    #[test]
    fn test_objects() {
        let store = store();
        let cache = cache(&store);
        assert_eq!(cache.object_key("App Resource").unwrap(), 5);
        assert_eq!(cache.object_name(5).unwrap(), "App Resource");
        assert!(matches!(
            cache.object_key("Nope").unwrap_err(),
            PvbError::NotFound {
                kind: EntityKind::Object,
                ..
            }
        ));
    }

    #[test]
    fn test_app_instance_by_binding() {
        let app = |key, name: &str| ApplicationInstance {
            key,
            name: name.to_string(),
            object_key: 5,
            it_resource_key: 1,
            it_resource_name: "AD".to_string(),
        };
        let store = Arc::new(
            MemoryStore::builder()
                .app_instance(app(1, "ActiveDirectory"))
                .build(),
        );
        let cache = cache(&store);
        assert_eq!(
            cache.app_instance_name(5, 1).unwrap().as_deref(),
            Some("ActiveDirectory")
        );
        assert_eq!(cache.app_instance_name(5, 2).unwrap(), None);

        let store = Arc::new(
            MemoryStore::builder()
                .app_instance(app(1, "AD-1"))
                .app_instance(app(2, "AD-2"))
                .build(),
        );
        let err = self::cache(&store).app_instance_name(5, 1).unwrap_err();
        assert!(matches!(
            err,
            PvbError::Ambiguous {
                kind: EntityKind::ApplicationInstance,
                count: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_form_description() {
        let store = store();
        let cache = cache(&store);
        assert_eq!(
            cache.form_description("UD_APP").unwrap().as_deref(),
            Some("Application account")
        );
        assert_eq!(cache.form_description("UD_EMPTY").unwrap(), None);
    }

    #[test]
    fn test_duplicate_form_is_ambiguous() {
        let store = Arc::new(
            MemoryStore::builder()
                .form(FormRecord::new(1, "UD_DUP"))
                .form(FormRecord::new(2, "UD_DUP"))
                .build(),
        );
        let err = cache(&store).resolve_form("UD_DUP").unwrap_err();
        assert!(matches!(err, PvbError::Ambiguous { count: 2, .. }));
    }

    #[test]
    fn test_transport_failure_propagates() {
        let store = store();
        store.fail_next(
            StoreCall::FindForms,
            ServiceError::AccessDenied("schema read".to_string()),
        );
        let err = cache(&store).list_fields("UD_APP").unwrap_err();
        assert!(matches!(err, PvbError::Transport(ServiceError::AccessDenied(_))));
    }

    #[test]
    fn test_field_type_parse() {
        assert_eq!(FieldType::parse("itresourcelookupfield"), FieldType::ItResourceLookupField);
        assert_eq!(FieldType::parse("DateFieldDlg"), FieldType::DateField);
        assert_eq!(
            FieldType::parse("RadioButton"),
            FieldType::Other("RadioButton".to_string())
        );
        assert!(FieldType::ItResourceLookupField.matches("ITResourceLookupField"));
    }
}
