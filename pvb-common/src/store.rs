//! Collaborator interfaces of the identity-governance platform.
//!
//! Form and object metadata come back as tabular [`RecordSet`]s keyed by
//! named columns, the way the platform's query API returns them. Everything
//! else (lookups, entitlements, application instances, accounts, request
//! submission) is exposed as typed records. Implementations must be safe to
//! share between callers; no cross-call atomicity is assumed.

use crate::account::Account;
use crate::entitlement::{Entitlement, NewEntitlement};
use crate::errors::ErrorCode;
use crate::request::{Intent, OperationResult, RequestData};
use crate::types::FieldMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Column names used by the platform's form and object queries.
pub mod columns {
    pub const FORM_NAME: &str = "Structure Utility.Table Name";
    pub const FORM_KEY: &str = "Structure Utility.Key";
    pub const FORM_DESCRIPTION: &str = "Structure Utility.Description";
    pub const FORM_ACTIVE_VERSION: &str = "Structure Utility.Active Version";

    pub const FORM_FIELD_NAME: &str = "Structure Utility.Additional Columns.Name";
    pub const FORM_FIELD_KEY: &str = "Structure Utility.Additional Columns.Key";
    pub const FORM_FIELD_LABEL: &str = "Structure Utility.Additional Columns.Field Label";
    pub const FORM_FIELD_TYPE: &str = "Structure Utility.Additional Columns.Field Type";
    pub const FORM_FIELD_ORDER: &str = "Structure Utility.Additional Columns.Order";
    pub const FORM_FIELD_ENCRYPTED: &str = "Structure Utility.Additional Columns.Encrypted";
    pub const FORM_FIELD_VISIBLE: &str = "VISIBLE";
    pub const FORM_FIELD_LOOKUP_CODE: &str = "LOOKUPCODE";

    pub const OBJECT_KEY: &str = "Objects.Key";
    pub const OBJECT_NAME: &str = "Objects.Name";
}

/// Failure reported by a collaborator. The detail string is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("column {0} not found in result set")]
    ColumnNotFound(String),

    #[error("column {column} holds {found}, expected {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
        found: String,
    },

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("stale data: {0}")]
    StaleData(String),

    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("unknown reference: {0}")]
    UnknownReference(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ColumnNotFound(_) => ErrorCode::ServiceColumnNotFound,
            Self::ColumnType { .. } => ErrorCode::ServiceColumnType,
            Self::AccessDenied(_) => ErrorCode::ServiceAccessDenied,
            Self::StaleData(_) => ErrorCode::ServiceStaleData,
            Self::ConcurrentModification(_) => ErrorCode::ServiceConcurrentModification,
            Self::Malformed(_) => ErrorCode::ServiceMalformedRequest,
            Self::UnknownReference(_) => ErrorCode::ServiceUnknownReference,
            Self::Unavailable(_) => ErrorCode::ServiceUnavailable,
        }
    }
}

/// One cell of a tabular result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Null,
    Text(String),
    Number(i64),
}

impl Cell {
    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Number(_) => "number",
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One row of a [`RecordSet`] with typed column accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: BTreeMap<String, Cell>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, cell: impl Into<Cell>) -> Self {
        self.cells.insert(column.into(), cell.into());
        self
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    fn cell(&self, column: &str) -> Result<&Cell, ServiceError> {
        self.cells
            .get(column)
            .ok_or_else(|| ServiceError::ColumnNotFound(column.to_string()))
    }

    /// String value of a column. Null reads as `None`, numbers are rendered.
    pub fn get_string(&self, column: &str) -> Result<Option<String>, ServiceError> {
        Ok(match self.cell(column)? {
            Cell::Null => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) => Some(n.to_string()),
        })
    }

    /// Integer value of a column. Null and blank text read as `None`.
    pub fn get_opt_i64(&self, column: &str) -> Result<Option<i64>, ServiceError> {
        match self.cell(column)? {
            Cell::Null => Ok(None),
            Cell::Number(n) => Ok(Some(*n)),
            Cell::Text(s) if s.trim().is_empty() => Ok(None),
            Cell::Text(s) => s.trim().parse().map(Some).map_err(|_| ServiceError::ColumnType {
                column: column.to_string(),
                expected: "integer",
                found: format!("text '{s}'"),
            }),
        }
    }

    pub fn get_i64(&self, column: &str) -> Result<i64, ServiceError> {
        self.get_opt_i64(column)?
            .ok_or_else(|| ServiceError::ColumnType {
                column: column.to_string(),
                expected: "integer",
                found: self.cells.get(column).map_or("null", Cell::kind).to_string(),
            })
    }

    pub fn get_i32(&self, column: &str) -> Result<i32, ServiceError> {
        let wide = self.get_i64(column)?;
        i32::try_from(wide).map_err(|_| ServiceError::ColumnType {
            column: column.to_string(),
            expected: "32-bit integer",
            found: wide.to_string(),
        })
    }
}

/// Tabular result of a platform query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl RecordSet {
    /// Build a result set; the column list is the union of all row columns.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for column in row.cells.keys() {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Exact-match search criteria, all clauses ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    clauses: Vec<(String, Cell)>,
}

impl Criteria {
    pub fn eq(column: impl Into<String>, value: impl Into<Cell>) -> Self {
        Self::default().and(column, value)
    }

    #[must_use]
    pub fn and(mut self, column: impl Into<String>, value: impl Into<Cell>) -> Self {
        self.clauses.push((column.into(), value.into()));
        self
    }

    pub fn clauses(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.clauses.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Whether a row satisfies every clause. Numbers match their text form.
    pub fn matches(&self, row: &Row) -> bool {
        self.clauses.iter().all(|(column, expected)| {
            match (row.cells.get(column), expected) {
                (Some(actual), expected) if actual == expected => true,
                (Some(Cell::Number(n)), Cell::Text(s)) | (Some(Cell::Text(s)), Cell::Number(n)) => {
                    s.trim() == n.to_string()
                }
                _ => false,
            }
        })
    }
}

/// One code/decode pair of a lookup list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LookupValue {
    pub key: i64,
    pub code: String,
    pub decode: String,
}

/// A configured binding between a resource object and an IT resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ApplicationInstance {
    pub key: i64,
    pub name: String,
    pub object_key: i64,
    pub it_resource_key: i64,
    pub it_resource_name: String,
}

/// Form definitions and their versioned field metadata.
pub trait FormStore: Send + Sync {
    fn find_forms(&self, criteria: &Criteria) -> Result<RecordSet, ServiceError>;

    /// Versions of a form; the first row carries the active version.
    fn form_versions(&self, form_key: i64) -> Result<RecordSet, ServiceError>;

    fn form_fields(&self, form_key: i64, version: i32) -> Result<RecordSet, ServiceError>;
}

/// Resource object definitions.
pub trait ObjectStore: Send + Sync {
    fn find_objects(&self, criteria: &Criteria) -> Result<RecordSet, ServiceError>;
}

/// Lookup lists of code/decode pairs.
pub trait LookupCatalog: Send + Sync {
    fn lookup_values(&self, list: &str) -> Result<Vec<LookupValue>, ServiceError>;

    /// Remove every value whose code is in `codes`; returns the number removed.
    fn remove_values(&self, list: &str, codes: &[String]) -> Result<usize, ServiceError>;
}

/// Entitlement records.
pub trait EntitlementStore: Send + Sync {
    /// Every entitlement carrying `code`, in no guaranteed order. Callers
    /// that need one record pick the lowest key.
    fn find_by_code(&self, code: &str) -> Result<Vec<Entitlement>, ServiceError>;

    fn add(&self, entitlement: NewEntitlement) -> Result<Entitlement, ServiceError>;
}

/// Application instance lookup.
pub trait AppInstanceDirectory: Send + Sync {
    fn find_by_name(&self, name: &str) -> Result<Option<ApplicationInstance>, ServiceError>;

    fn find_by_binding(
        &self,
        object_key: i64,
        it_resource_key: i64,
    ) -> Result<Vec<ApplicationInstance>, ServiceError>;
}

/// Approval subsystem entry point.
pub trait RequestGateway: Send + Sync {
    /// Submit a request. `Ok(None)` means the service returned no result.
    fn submit(
        &self,
        request: &RequestData,
        intent: Intent,
    ) -> Result<Option<OperationResult>, ServiceError>;
}

/// Provisioned accounts and their process forms.
pub trait ProvisioningGateway: Send + Sync {
    fn accounts_for_user(
        &self,
        user_id: &str,
        primary_only: bool,
    ) -> Result<Vec<Account>, ServiceError>;

    /// Write back an account's data mapping immediately.
    fn modify_account(&self, account: &Account) -> Result<(), ServiceError>;

    fn process_form_data(&self, process_instance_key: i64) -> Result<RecordSet, ServiceError>;

    fn set_process_form_data(
        &self,
        process_instance_key: i64,
        values: &FieldMap,
    ) -> Result<(), ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_row() -> Row {
        Row::new()
            .with(columns::FORM_FIELD_NAME, "UD_APP_USR")
            .with(columns::FORM_FIELD_KEY, 11_i64)
            .with(columns::FORM_FIELD_ORDER, "3")
            .with(columns::FORM_FIELD_LABEL, Cell::Null)
    }

    #[test]
    fn test_row_typed_accessors() {
        let row = field_row();
        assert_eq!(
            row.get_string(columns::FORM_FIELD_NAME).unwrap(),
            Some("UD_APP_USR".to_string())
        );
        assert_eq!(row.get_i64(columns::FORM_FIELD_KEY).unwrap(), 11);
        assert_eq!(row.get_i32(columns::FORM_FIELD_ORDER).unwrap(), 3);
        assert_eq!(row.get_string(columns::FORM_FIELD_LABEL).unwrap(), None);
        assert_eq!(
            row.get_string(columns::FORM_FIELD_KEY).unwrap(),
            Some("11".to_string())
        );
    }

    #[test]
    fn test_row_missing_column() {
        let err = field_row().get_string("NOPE").unwrap_err();
        assert_eq!(err, ServiceError::ColumnNotFound("NOPE".to_string()));
        assert_eq!(err.code(), ErrorCode::ServiceColumnNotFound);
    }

    #[test]
    fn test_row_type_mismatch() {
        let err = field_row().get_i64(columns::FORM_FIELD_NAME).unwrap_err();
        assert!(matches!(err, ServiceError::ColumnType { .. }));

        let err = field_row().get_i64(columns::FORM_FIELD_LABEL).unwrap_err();
        assert!(err.to_string().contains("null"));
    }

    #[test]
    fn test_record_set_columns_union() {
        let rs = RecordSet::from_rows(vec![
            Row::new().with("A", 1_i64),
            Row::new().with("B", "x"),
        ]);
        assert_eq!(rs.len(), 2);
        assert!(rs.has_column("A"));
        assert!(rs.has_column("B"));
        assert!(!rs.has_column("C"));
        assert!(RecordSet::default().is_empty());
    }

    #[test]
    fn test_criteria_matches_numbers_as_text() {
        let row = Row::new()
            .with(columns::FORM_KEY, 7_i64)
            .with(columns::FORM_NAME, "UD_APP");
        assert!(Criteria::eq(columns::FORM_KEY, 7_i64).matches(&row));
        assert!(Criteria::eq(columns::FORM_KEY, "7").matches(&row));
        assert!(
            Criteria::eq(columns::FORM_NAME, "UD_APP")
                .and(columns::FORM_KEY, 7_i64)
                .matches(&row)
        );
        assert!(!Criteria::eq(columns::FORM_NAME, "UD_OTHER").matches(&row));
        assert!(!Criteria::eq("missing", "x").matches(&row));
    }
}
