//! Common types used across provisioning bridge components.

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::Schema;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A loosely-typed form value as supplied by callers.
///
/// JSON mapping: `null`, booleans, strings and numbers map directly (numbers
/// that fit 32 bits become [`FieldValue::Integer`], wider integers
/// [`FieldValue::Long`], fractional numbers [`FieldValue::Decimal`]).
/// `{"long": n}` forces a wide integer and `{"date": "<rfc3339>"}` a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i32),
    Long(i64),
    Decimal(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(s) => write!(f, "{s}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Long(n) => write!(f, "{n}"),
            Self::Decimal(n) => write!(f, "{n}"),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl TryFrom<Value> for FieldValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Boolean(b)),
            Value::String(s) => Ok(Self::Text(s)),
            Value::Number(n) => {
                if let Some(wide) = n.as_i64() {
                    Ok(i32::try_from(wide).map_or(Self::Long(wide), Self::Integer))
                } else {
                    n.as_f64()
                        .map(Self::Decimal)
                        .ok_or_else(|| format!("unrepresentable number {n}"))
                }
            }
            Value::Object(map) => tagged_value(map),
            Value::Array(_) => Err("arrays are not valid form values".to_string()),
        }
    }
}

fn tagged_value(map: Map<String, Value>) -> Result<FieldValue, String> {
    if map.len() != 1 {
        return Err("tagged values must have exactly one key (`date` or `long`)".to_string());
    }
    match map.into_iter().next() {
        Some((tag, Value::String(raw))) if tag == "date" => DateTime::parse_from_rfc3339(&raw)
            .map(|d| FieldValue::Date(d.with_timezone(&Utc)))
            .map_err(|e| format!("invalid date '{raw}': {e}")),
        Some((tag, Value::Number(n))) if tag == "long" => n
            .as_i64()
            .map(FieldValue::Long)
            .ok_or_else(|| format!("invalid long {n}")),
        Some((tag, other)) => Err(format!("unsupported tagged value {tag}: {other}")),
        None => Err("empty tagged value".to_string()),
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => Value::Null,
            FieldValue::Text(s) => Value::String(s),
            FieldValue::Integer(n) => Value::from(n),
            FieldValue::Long(n) => serde_json::json!({ "long": n }),
            FieldValue::Decimal(n) => Number::from_f64(n).map_or(Value::Null, Value::Number),
            FieldValue::Date(d) => serde_json::json!({
                "date": d.to_rfc3339_opts(SecondsFormat::Secs, true)
            }),
            FieldValue::Boolean(b) => Value::Bool(b),
        }
    }
}

impl JsonSchema for FieldValue {
    fn schema_name() -> String {
        "FieldValue".to_string()
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        Schema::Bool(true)
    }
}

/// Insertion-ordered field name to value mapping.
///
/// Keys are unique; inserting an existing key replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, FieldValue)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert a value, returning the previous one for this key.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let idx = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldMapVisitor;

        impl<'de> Visitor<'de> for FieldMapVisitor {
            type Value = FieldMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of field names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldMap, A::Error> {
                let mut map = FieldMap::new();
                while let Some((k, v)) = access.next_entry::<String, FieldValue>()? {
                    map.insert(k, v);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(FieldMapVisitor)
    }
}

impl JsonSchema for FieldMap {
    fn schema_name() -> String {
        "FieldMap".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        <BTreeMap<String, FieldValue>>::json_schema(generator)
    }
}

/// Action attached to one repeating-section row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChildAction {
    #[serde(alias = "create")]
    Add,
    #[serde(alias = "update")]
    Modify,
    Delete,
}

impl fmt::Display for ChildAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "Add"),
            Self::Modify => write!(f, "Modify"),
            Self::Delete => write!(f, "Delete"),
        }
    }
}

/// One row of a child (repeating-section) form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildSectionRecord {
    pub action: ChildAction,
    #[serde(default)]
    pub data: FieldMap,
}

impl ChildSectionRecord {
    pub fn new(action: ChildAction, data: FieldMap) -> Self {
        Self { action, data }
    }
}

/// Child-form rows keyed by child form name.
pub type ChildSections = BTreeMap<String, Vec<ChildSectionRecord>>;

/// Ordering applied when projecting form data for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionOrder {
    /// Schema fields by their stored order, unknown keys after in input order.
    #[default]
    Schema,
    /// Keep the order the caller supplied.
    Supplied,
}

impl fmt::Display for ProjectionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => write!(f, "schema"),
            Self::Supplied => write!(f, "supplied"),
        }
    }
}

impl std::str::FromStr for ProjectionOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "schema" => Ok(Self::Schema),
            "supplied" => Ok(Self::Supplied),
            _ => Err(format!("Invalid projection order: {s}")),
        }
    }
}

/// Provisioning bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PvbConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub projection: ProjectionConfig,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub account: AccountConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Suffixes of platform-managed columns stripped before projection.
    #[serde(default = "default_system_suffixes")]
    pub system_field_suffixes: Vec<String>,
    /// Field type that carries the downstream IT-resource selector.
    #[serde(default = "default_it_resource_type")]
    pub it_resource_field_type: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            system_field_suffixes: default_system_suffixes(),
            it_resource_field_type: default_it_resource_type(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Ordering for both top-level and child-section projection.
    #[serde(default)]
    pub order: ProjectionOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Status token returned by direct (non-approval) writes.
    #[serde(default = "default_completed_status")]
    pub completed_status: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            completed_status: default_completed_status(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Only scan primary accounts when locating an account by process instance.
    #[serde(default = "default_true")]
    pub primary_only: bool,
    /// Account statuses treated as live when reading primary account fields.
    #[serde(default = "default_active_statuses")]
    pub active_statuses: Vec<String>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            primary_only: true,
            active_statuses: default_active_statuses(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Platform-managed column suffixes on every form table.
pub const SYSTEM_FIELD_SUFFIXES: &[&str] = &[
    "_KEY",
    "_CREATE",
    "_ROWVER",
    "_UPDATE",
    "_CREATEBY",
    "_REVOKE",
    "_NOTE",
    "_UPDATEBY",
    "_VERSION",
    "_DATA_LEVEL",
];

fn default_system_suffixes() -> Vec<String> {
    SYSTEM_FIELD_SUFFIXES.iter().map(|s| (*s).to_string()).collect()
}

fn default_it_resource_type() -> String {
    "ITResourceLookupField".to_string()
}

fn default_completed_status() -> String {
    "COMPLETED".to_string()
}

fn default_active_statuses() -> Vec<String> {
    vec!["Provisioned".to_string(), "Enabled".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_field_value_from_json_numbers() {
        let small: FieldValue = serde_json::from_str("42").unwrap();
        assert_eq!(small, FieldValue::Integer(42));

        let wide: FieldValue = serde_json::from_str("5000000000").unwrap();
        assert_eq!(wide, FieldValue::Long(5_000_000_000));

        let fraction: FieldValue = serde_json::from_str("1.5").unwrap();
        assert_eq!(fraction, FieldValue::Decimal(1.5));
    }

    #[test]
    fn test_field_value_tagged_forms() {
        let long: FieldValue = serde_json::from_str(r#"{"long": 42}"#).unwrap();
        assert_eq!(long, FieldValue::Long(42));

        let date: FieldValue = serde_json::from_str(r#"{"date": "2024-03-01T10:00:00Z"}"#).unwrap();
        assert_eq!(
            date,
            FieldValue::Date(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );

        assert!(serde_json::from_str::<FieldValue>(r#"{"colour": "red"}"#).is_err());
        assert!(serde_json::from_str::<FieldValue>("[1, 2]").is_err());
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Null.to_string(), "");
        assert_eq!(FieldValue::from("alice").to_string(), "alice");
        assert_eq!(FieldValue::Boolean(true).to_string(), "true");
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(FieldValue::Date(date).to_string(), "2024-03-01T10:00:00Z");
    }

    #[test]
    fn test_field_map_preserves_insertion_order() {
        let map: FieldMap = serde_json::from_str(r#"{"Z": 1, "A": "x", "M": true}"#).unwrap();
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["Z", "A", "M"]);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"Z":1,"A":"x","M":true}"#);
    }

    #[test]
    fn test_field_map_insert_replaces_in_place() {
        let mut map = FieldMap::new().with("A", 1).with("B", 2);
        let previous = map.insert("A", 3);
        assert_eq!(previous, Some(FieldValue::Integer(1)));
        let entries: Vec<_> = map.iter().collect();
        assert_eq!(
            entries,
            vec![("A", &FieldValue::Integer(3)), ("B", &FieldValue::Integer(2))]
        );
    }

    #[test]
    fn test_projection_order_parse() {
        assert_eq!("schema".parse::<ProjectionOrder>(), Ok(ProjectionOrder::Schema));
        assert_eq!("SUPPLIED".parse::<ProjectionOrder>(), Ok(ProjectionOrder::Supplied));
        assert!("random".parse::<ProjectionOrder>().is_err());
    }

    #[test]
    fn test_default_config_values() {
        let config = PvbConfig::default();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.schema.system_field_suffixes.len(), 10);
        assert_eq!(config.schema.it_resource_field_type, "ITResourceLookupField");
        assert_eq!(config.projection.order, ProjectionOrder::Schema);
        assert_eq!(config.request.completed_status, "COMPLETED");
        assert!(config.account.primary_only);
    }

    #[test]
    fn test_config_from_partial_toml() {
        let config: PvbConfig = toml::from_str(
            r#"
            [projection]
            order = "supplied"

            [account]
            primary_only = false
            "#,
        )
        .unwrap();
        assert_eq!(config.projection.order, ProjectionOrder::Supplied);
        assert!(!config.account.primary_only);
        assert_eq!(config.account.active_statuses, vec!["Provisioned", "Enabled"]);
        assert_eq!(config.request.completed_status, "COMPLETED");
    }
}
