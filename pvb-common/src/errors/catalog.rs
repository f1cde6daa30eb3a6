//! Error Catalog for the provisioning bridge
//!
//! Each error code carries:
//! - A unique code (PVB-E001 through PVB-E599)
//! - A human-readable message
//! - Remediation steps
//!
//! # Example
//!
//! ```rust
//! use pvb_common::errors::catalog::ErrorCode;
//!
//! let entry = ErrorCode::SchemaFormNotFound.entry();
//! println!("Error {}: {}", entry.code, entry.message);
//! for step in entry.remediation {
//!     println!("  - {}", step);
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering all bridge error scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Config Errors (E001-E099)
    // =========================================================================
    /// Configuration file not found
    ConfigNotFound,
    /// Configuration file could not be read
    ConfigReadError,
    /// Configuration file contains invalid TOML syntax
    ConfigParseError,
    /// Configuration contains invalid values
    ConfigValidationError,
    /// Environment variable has invalid value
    ConfigEnvError,
    /// Identity store snapshot could not be read
    SnapshotReadError,
    /// Identity store snapshot is not valid JSON for the snapshot format
    SnapshotParseError,
    /// Identity store snapshot could not be written back
    SnapshotWriteError,

    // =========================================================================
    // Schema Errors (E100-E199)
    // =========================================================================
    /// No form matches the name or key
    SchemaFormNotFound,
    /// Form exists but has no active version
    SchemaNoActiveVersion,
    /// No resource object matches the name or key
    SchemaObjectNotFound,
    /// More than one form matches
    SchemaFormAmbiguous,
    /// More than one resource object matches
    SchemaObjectAmbiguous,
    /// Form name could not be inferred from the data keys
    SchemaFormNameUninferable,

    // =========================================================================
    // Entitlement Errors (E200-E299)
    // =========================================================================
    /// Code/label pair is absent from the lookup list
    EntitlementLookupPairMissing,
    /// Application instance named for the entitlement does not exist
    EntitlementAppInstanceUnknown,
    /// Form field key could not be resolved for the entitlement binding
    EntitlementFieldKeyUnresolved,

    // =========================================================================
    // Request Errors (E300-E399)
    // =========================================================================
    /// Target application instance does not exist
    RequestAppInstanceNotFound,
    /// Several application instances match the binding
    RequestAppInstanceAmbiguous,
    /// Beneficiary identifier is empty
    RequestEmptyBeneficiary,
    /// Account identifier is empty
    RequestEmptyAccountId,

    // =========================================================================
    // Account Errors (E400-E499)
    // =========================================================================
    /// No provisioned account matches the user and process instance
    AccountNotFound,
    /// Several accounts match the user and process instance
    AccountAmbiguous,

    // =========================================================================
    // Service Errors (E500-E599)
    // =========================================================================
    /// Result set lacks an expected column
    ServiceColumnNotFound,
    /// Result set column holds an unexpected type
    ServiceColumnType,
    /// Caller lacks permission for the operation
    ServiceAccessDenied,
    /// Record changed since it was read
    ServiceStaleData,
    /// Concurrent modification detected by the service
    ServiceConcurrentModification,
    /// Service rejected the request payload
    ServiceMalformedRequest,
    /// Service does not know a referenced record
    ServiceUnknownReference,
    /// Service unreachable or failing
    ServiceUnavailable,
}

impl ErrorCode {
    /// Returns the numeric error code (without prefix).
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            // Config (001-099)
            Self::ConfigNotFound => 1,
            Self::ConfigReadError => 2,
            Self::ConfigParseError => 3,
            Self::ConfigValidationError => 4,
            Self::ConfigEnvError => 5,
            Self::SnapshotReadError => 6,
            Self::SnapshotParseError => 7,
            Self::SnapshotWriteError => 8,

            // Schema (100-199)
            Self::SchemaFormNotFound => 100,
            Self::SchemaNoActiveVersion => 101,
            Self::SchemaObjectNotFound => 103,
            Self::SchemaFormAmbiguous => 104,
            Self::SchemaObjectAmbiguous => 105,
            Self::SchemaFormNameUninferable => 106,

            // Entitlement (200-299)
            Self::EntitlementLookupPairMissing => 200,
            Self::EntitlementAppInstanceUnknown => 201,
            Self::EntitlementFieldKeyUnresolved => 202,

            // Request (300-399)
            Self::RequestAppInstanceNotFound => 300,
            Self::RequestAppInstanceAmbiguous => 301,
            Self::RequestEmptyBeneficiary => 302,
            Self::RequestEmptyAccountId => 303,

            // Account (400-499)
            Self::AccountNotFound => 400,
            Self::AccountAmbiguous => 401,

            // Service (500-599)
            Self::ServiceColumnNotFound => 500,
            Self::ServiceColumnType => 501,
            Self::ServiceAccessDenied => 502,
            Self::ServiceStaleData => 503,
            Self::ServiceConcurrentModification => 504,
            Self::ServiceMalformedRequest => 505,
            Self::ServiceUnknownReference => 506,
            Self::ServiceUnavailable => 507,
        }
    }

    /// Returns the formatted error code string (e.g., "PVB-E001").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("PVB-E{:03}", self.code_number())
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Schema,
            200..=299 => ErrorCategory::Entitlement,
            300..=399 => ErrorCategory::Request,
            400..=499 => ErrorCategory::Account,
            _ => ErrorCategory::Service,
        }
    }

    /// Returns the full error entry with all metadata.
    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// Returns the error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            // Config
            Self::ConfigNotFound => "Configuration file not found",
            Self::ConfigReadError => "Failed to read configuration file",
            Self::ConfigParseError => "Configuration file contains invalid TOML syntax",
            Self::ConfigValidationError => "Configuration contains invalid values",
            Self::ConfigEnvError => "Environment variable has invalid value",
            Self::SnapshotReadError => "Failed to read identity store snapshot",
            Self::SnapshotParseError => "Identity store snapshot is malformed",
            Self::SnapshotWriteError => "Failed to write identity store snapshot",

            // Schema
            Self::SchemaFormNotFound => "Form not found",
            Self::SchemaNoActiveVersion => "Form has no active version",
            Self::SchemaObjectNotFound => "Resource object not found",
            Self::SchemaFormAmbiguous => "Form name matches more than one form",
            Self::SchemaObjectAmbiguous => "Resource object matches more than one object",
            Self::SchemaFormNameUninferable => "Form name could not be inferred from field names",

            // Entitlement
            Self::EntitlementLookupPairMissing => {
                "Entitlement code and label pair not present in lookup list"
            }
            Self::EntitlementAppInstanceUnknown => {
                "Application instance for entitlement does not exist"
            }
            Self::EntitlementFieldKeyUnresolved => {
                "Form field key could not be resolved for entitlement binding"
            }

            // Request
            Self::RequestAppInstanceNotFound => "Application instance not found",
            Self::RequestAppInstanceAmbiguous => {
                "Application instance binding matches more than one instance"
            }
            Self::RequestEmptyBeneficiary => "Request beneficiary is empty",
            Self::RequestEmptyAccountId => "Request account identifier is empty",

            // Account
            Self::AccountNotFound => "No account matches the process instance",
            Self::AccountAmbiguous => "Several accounts match the process instance",

            // Service
            Self::ServiceColumnNotFound => "Service result is missing an expected column",
            Self::ServiceColumnType => "Service result column has an unexpected type",
            Self::ServiceAccessDenied => "Service denied access",
            Self::ServiceStaleData => "Record changed since it was read",
            Self::ServiceConcurrentModification => "Record was modified concurrently",
            Self::ServiceMalformedRequest => "Service rejected the request as malformed",
            Self::ServiceUnknownReference => "Service does not know a referenced record",
            Self::ServiceUnavailable => "Service is unavailable",
        }
    }

    /// Returns remediation steps for the error.
    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            // Config
            Self::ConfigNotFound => &[
                "Check the path passed with --config",
                "Omit --config to fall back to ~/.config/pvb/config.toml or built-in defaults",
            ],
            Self::ConfigReadError => &[
                "Check file permissions on the configuration file",
                "Ensure the path points to a regular file",
            ],
            Self::ConfigParseError => &[
                "Validate TOML syntax (missing quotes, brackets, or commas)",
                "Run 'pvb config show' against the defaults to compare structure",
            ],
            Self::ConfigValidationError => &[
                "Review the errors listed by 'pvb config show'",
                "Restore blank tokens to their defaults",
            ],
            Self::ConfigEnvError => &[
                "Check PVB_* environment variables for typos",
                "Unset the variable to use the configured value",
            ],
            Self::SnapshotReadError => &[
                "Check the path passed with --snapshot",
                "Ensure the file is readable",
            ],
            Self::SnapshotParseError => &[
                "Compare the file against 'pvb snapshot schema'",
                "Check that numeric keys are numbers, not strings",
            ],
            Self::SnapshotWriteError => &[
                "Check write permissions on the snapshot file",
                "Re-run without --write for a dry run",
            ],

            // Schema
            Self::SchemaFormNotFound => &[
                "Check the form table name (e.g. UD_APP) for typos",
                "Confirm the form is deployed in the target environment",
            ],
            Self::SchemaNoActiveVersion => &[
                "Create and activate a form version in the form designer",
            ],
            Self::SchemaObjectNotFound => &[
                "Check the resource object name",
                "Confirm the object is imported in the target environment",
            ],
            Self::SchemaFormAmbiguous => &[
                "Remove or rename the duplicate form definition",
                "Resolve the form by key instead of by name",
            ],
            Self::SchemaObjectAmbiguous => &[
                "Remove or rename the duplicate resource object",
                "Resolve the object by key instead of by name",
            ],
            Self::SchemaFormNameUninferable => &[
                "Prefix data keys with the form table name (UD_<NAME>_...)",
                "Call the projection with an explicit form name",
            ],

            // Entitlement
            Self::EntitlementLookupPairMissing => &[
                "Run the lookup reconciliation so the list contains the code",
                "Check that the supplied label matches the lookup decode exactly",
            ],
            Self::EntitlementAppInstanceUnknown => &[
                "Check the application instance name",
                "Create the application instance before reconciling entitlements",
            ],
            Self::EntitlementFieldKeyUnresolved => &[
                "Check the entitlement field name on the child form",
                "Confirm the field exists on the active form version",
            ],

            // Request
            Self::RequestAppInstanceNotFound => &[
                "Check the application instance name",
                "Confirm the instance is published to the beneficiary's organization",
            ],
            Self::RequestAppInstanceAmbiguous => &[
                "Remove the duplicate application instance bound to the same object and IT resource",
            ],
            Self::RequestEmptyBeneficiary => &["Pass the beneficiary user key"],
            Self::RequestEmptyAccountId => &["Pass the target account identifier"],

            // Account
            Self::AccountNotFound => &[
                "Check the process instance key against the user's accounts",
                "Set account.primary_only = false to include secondary accounts",
            ],
            Self::AccountAmbiguous => &[
                "Inspect the user's accounts for duplicated process instance keys",
            ],

            // Service
            Self::ServiceColumnNotFound => &[
                "Check the platform version matches the expected column names",
            ],
            Self::ServiceColumnType => &[
                "Check the platform version matches the expected column types",
            ],
            Self::ServiceAccessDenied => &[
                "Run under an identity with the required admin role",
            ],
            Self::ServiceStaleData => &["Re-read the record and retry the operation"],
            Self::ServiceConcurrentModification => &[
                "Another writer changed the record; re-read and retry",
            ],
            Self::ServiceMalformedRequest => &[
                "Check attribute names against the form fields",
                "Check attribute types against the declared field types",
            ],
            Self::ServiceUnknownReference => &[
                "Check that referenced keys exist in the identity store",
            ],
            Self::ServiceUnavailable => &[
                "Check connectivity to the identity-governance service",
                "Retry once the service is reachable",
            ],
        }
    }

    /// Returns all error codes.
    #[must_use]
    pub const fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigNotFound,
            Self::ConfigReadError,
            Self::ConfigParseError,
            Self::ConfigValidationError,
            Self::ConfigEnvError,
            Self::SnapshotReadError,
            Self::SnapshotParseError,
            Self::SnapshotWriteError,
            Self::SchemaFormNotFound,
            Self::SchemaNoActiveVersion,
            Self::SchemaObjectNotFound,
            Self::SchemaFormAmbiguous,
            Self::SchemaObjectAmbiguous,
            Self::SchemaFormNameUninferable,
            Self::EntitlementLookupPairMissing,
            Self::EntitlementAppInstanceUnknown,
            Self::EntitlementFieldKeyUnresolved,
            Self::RequestAppInstanceNotFound,
            Self::RequestAppInstanceAmbiguous,
            Self::RequestEmptyBeneficiary,
            Self::RequestEmptyAccountId,
            Self::AccountNotFound,
            Self::AccountAmbiguous,
            Self::ServiceColumnNotFound,
            Self::ServiceColumnType,
            Self::ServiceAccessDenied,
            Self::ServiceStaleData,
            Self::ServiceConcurrentModification,
            Self::ServiceMalformedRequest,
            Self::ServiceUnknownReference,
            Self::ServiceUnavailable,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// Error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Configuration and snapshot loading errors (E001-E099)
    Config,
    /// Form, field and object resolution errors (E100-E199)
    Schema,
    /// Entitlement reconciliation errors (E200-E299)
    Entitlement,
    /// Provisioning request errors (E300-E399)
    Request,
    /// Direct account write errors (E400-E499)
    Account,
    /// Collaborator failures (E500-E599)
    Service,
}

impl ErrorCategory {
    /// Returns a human-readable name for the category.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config => "Configuration",
            Self::Schema => "Schema",
            Self::Entitlement => "Entitlement",
            Self::Request => "Request",
            Self::Account => "Account",
            Self::Service => "Service",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Complete error entry with all metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Error code string (e.g., "PVB-E001")
    pub code: String,
    /// Error category
    pub category: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Steps to remediate the error
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Formats the error for display with full remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut output = format!("[{}] {}\n", self.code, self.message);

        if !self.remediation.is_empty() {
            output.push_str("\nRemediation steps:\n");
            for (i, step) in self.remediation.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }

        output
    }

    /// Formats the error as a single line.
    #[must_use]
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_brief())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_numbers_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for code in ErrorCode::all() {
            let num = code.code_number();
            assert!(
                seen.insert(num),
                "Duplicate error code number: {} for {:?}",
                num,
                code
            );
        }
    }

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.code_string(), "PVB-E001");
        assert_eq!(ErrorCode::SchemaFormNotFound.code_string(), "PVB-E100");
        assert_eq!(
            ErrorCode::EntitlementLookupPairMissing.code_string(),
            "PVB-E200"
        );
        assert_eq!(ErrorCode::RequestAppInstanceNotFound.code_string(), "PVB-E300");
        assert_eq!(ErrorCode::AccountNotFound.code_string(), "PVB-E400");
        assert_eq!(ErrorCode::ServiceColumnNotFound.code_string(), "PVB-E500");
    }

    #[test]
    fn test_all_errors_have_message_and_remediation() {
        for code in ErrorCode::all() {
            assert!(!code.message().is_empty(), "Error {:?} has empty message", code);
            assert!(
                !code.remediation().is_empty(),
                "Error {:?} has no remediation steps",
                code
            );
        }
    }

    #[test]
    fn test_category_ranges() {
        for code in ErrorCode::all() {
            let num = code.code_number();
            let expected = match num / 100 {
                0 => ErrorCategory::Config,
                1 => ErrorCategory::Schema,
                2 => ErrorCategory::Entitlement,
                3 => ErrorCategory::Request,
                4 => ErrorCategory::Account,
                _ => ErrorCategory::Service,
            };
            assert_eq!(code.category(), expected, "{:?}", code);
        }
    }

    #[test]
    fn test_error_entry_serialization() {
        let entry = ErrorCode::SchemaFormNotFound.entry();
        let json = serde_json::to_string(&entry).expect("serialization failed");
        assert!(json.contains("PVB-E100"));
        assert!(json.contains("schema"));

        let parsed: ErrorEntry = serde_json::from_str(&json).expect("deserialization failed");
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::ServiceStaleData).unwrap();
        assert_eq!(json, "\"SERVICE_STALE_DATA\"");
    }

    #[test]
    fn test_format_full_and_brief() {
        let entry = ErrorCode::AccountNotFound.entry();
        assert_eq!(
            entry.format_brief(),
            "[PVB-E400] No account matches the process instance"
        );

        let full = entry.format_full();
        assert!(full.contains("Remediation steps:"));
        assert!(full.contains("  1. Check the process instance key"));
        assert!(full.contains("primary_only"));
    }

    #[test]
    fn test_display_implementations() {
        let display = ErrorCode::SchemaNoActiveVersion.to_string();
        assert_eq!(display, "PVB-E101: Form has no active version");
        assert_eq!(ErrorCategory::Entitlement.to_string(), "Entitlement");
    }
}
