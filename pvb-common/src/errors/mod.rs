//! Runtime errors and the error catalog for the provisioning bridge.
//!
//! Every failure surfaced by a component is a [`PvbError`]. Each error maps
//! to a stable catalog code so operators can look up remediation steps.
//!
//! # Error Code Ranges
//!
//! | Range      | Category    | Description                              |
//! |------------|-------------|------------------------------------------|
//! | E001-E099  | Config      | Configuration and snapshot loading       |
//! | E100-E199  | Schema      | Form, field and object resolution        |
//! | E200-E299  | Entitlement | Entitlement reconciliation               |
//! | E300-E399  | Request     | Provisioning request construction        |
//! | E400-E499  | Account     | Direct account and process-form writes   |
//! | E500-E599  | Service     | Collaborator (transport) failures        |

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

use crate::store::ServiceError;
use std::fmt;
use thiserror::Error;

/// Kind of record a lookup failed to find (or found too many of).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Form,
    FormVersion,
    Object,
    ApplicationInstance,
    Account,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Form => "form",
            Self::FormVersion => "form version",
            Self::Object => "resource object",
            Self::ApplicationInstance => "application instance",
            Self::Account => "account",
        };
        f.write_str(name)
    }
}

/// Arguments rejected before any mutating call is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidArgument {
    #[error("lookup value for pair ({code}, {label}) not found in {list}")]
    LookupPairNotFound {
        list: String,
        code: String,
        label: String,
    },

    #[error("application instance {0} not found")]
    UnknownAppInstance(String),

    #[error("unable to find field key for name {field} on form {form}")]
    FieldKeyUnresolved { form: String, field: String },

    #[error("cannot infer form name from field key {0}")]
    FormNameUninferable(String),

    #[error("beneficiary must not be empty")]
    EmptyBeneficiary,

    #[error("account id must not be empty")]
    EmptyAccountId,
}

/// Error type for every public operation of the bridge.
#[derive(Debug, Error)]
pub enum PvbError {
    #[error("{kind} {name} not found")]
    NotFound { kind: EntityKind, name: String },

    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),

    #[error("service call failed: {0}")]
    Transport(#[from] ServiceError),

    #[error("{kind} {name} is ambiguous ({count} matches)")]
    Ambiguous {
        kind: EntityKind,
        name: String,
        count: usize,
    },
}

impl PvbError {
    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn ambiguous(kind: EntityKind, name: impl Into<String>, count: usize) -> Self {
        Self::Ambiguous {
            kind,
            name: name.into(),
            count,
        }
    }

    /// Catalog code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { kind, .. } => match kind {
                EntityKind::Form => ErrorCode::SchemaFormNotFound,
                EntityKind::FormVersion => ErrorCode::SchemaNoActiveVersion,
                EntityKind::Object => ErrorCode::SchemaObjectNotFound,
                EntityKind::ApplicationInstance => ErrorCode::RequestAppInstanceNotFound,
                EntityKind::Account => ErrorCode::AccountNotFound,
            },
            Self::Ambiguous { kind, .. } => match kind {
                EntityKind::Object => ErrorCode::SchemaObjectAmbiguous,
                EntityKind::ApplicationInstance => ErrorCode::RequestAppInstanceAmbiguous,
                EntityKind::Account => ErrorCode::AccountAmbiguous,
                _ => ErrorCode::SchemaFormAmbiguous,
            },
            Self::InvalidArgument(reason) => match reason {
                InvalidArgument::LookupPairNotFound { .. } => ErrorCode::EntitlementLookupPairMissing,
                InvalidArgument::UnknownAppInstance(_) => ErrorCode::EntitlementAppInstanceUnknown,
                InvalidArgument::FieldKeyUnresolved { .. } => ErrorCode::EntitlementFieldKeyUnresolved,
                InvalidArgument::FormNameUninferable(_) => ErrorCode::SchemaFormNameUninferable,
                InvalidArgument::EmptyBeneficiary => ErrorCode::RequestEmptyBeneficiary,
                InvalidArgument::EmptyAccountId => ErrorCode::RequestEmptyAccountId,
            },
            Self::Transport(err) => err.code(),
        }
    }

    /// Whether the caller may see a different outcome by re-reading state.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = PvbError::not_found(EntityKind::Form, "UD_APP");
        assert_eq!(err.to_string(), "form UD_APP not found");
        assert_eq!(err.code(), ErrorCode::SchemaFormNotFound);
    }

    #[test]
    fn test_invalid_argument_is_transparent() {
        let err: PvbError = InvalidArgument::LookupPairNotFound {
            list: "Lookup.Groups".to_string(),
            code: "1~admins".to_string(),
            label: "AD~admins".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "lookup value for pair (1~admins, AD~admins) not found in Lookup.Groups"
        );
        assert_eq!(err.code(), ErrorCode::EntitlementLookupPairMissing);
        assert_eq!(err.code().code_string(), "PVB-E200");
    }

    #[test]
    fn test_transport_preserves_detail() {
        let err: PvbError = ServiceError::StaleData("row version 3 != 4".to_string()).into();
        assert!(err.is_transport());
        assert!(err.to_string().contains("row version 3 != 4"));
        assert_eq!(err.code(), ErrorCode::ServiceStaleData);
    }

    #[test]
    fn test_ambiguous_codes() {
        let err = PvbError::ambiguous(EntityKind::Form, "UD_DUP", 2);
        assert_eq!(err.to_string(), "form UD_DUP is ambiguous (2 matches)");
        assert_eq!(err.code(), ErrorCode::SchemaFormAmbiguous);
        assert_eq!(
            PvbError::ambiguous(EntityKind::Object, "AD User", 3).code(),
            ErrorCode::SchemaObjectAmbiguous
        );
        assert_eq!(
            PvbError::ambiguous(EntityKind::Account, "process instance 9001", 2)
                .code()
                .code_string(),
            "PVB-E401"
        );
    }

    #[test]
    fn test_every_error_maps_into_catalog() {
        let errors = vec![
            PvbError::not_found(EntityKind::Account, "pik 7"),
            PvbError::not_found(EntityKind::ApplicationInstance, "AD"),
            InvalidArgument::EmptyBeneficiary.into(),
            ServiceError::AccessDenied("nope".to_string()).into(),
        ];
        for err in errors {
            assert!(ErrorCode::all().contains(&err.code()), "{err:?}");
        }
    }
}
