//! Configuration validation.
//!
//! [`validate_config`] reports every problem without failing.
//! [`check_config`] turns error-severity problems into a [`ConfigError`].

use super::ConfigError;
use crate::types::PvbConfig;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    pub severity: Severity,
    /// Dotted key, e.g. `schema.system_field_suffixes`.
    pub key: &'static str,
    pub message: String,
}

impl ConfigWarning {
    fn warning(key: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            key,
            message: message.into(),
        }
    }

    fn error(key: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            key,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{tag}: {}: {}", self.key, self.message)
    }
}

pub fn validate_config(config: &PvbConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    let suffixes = &config.schema.system_field_suffixes;
    if suffixes.is_empty() {
        warnings.push(ConfigWarning::warning(
            "schema.system_field_suffixes",
            "empty list: platform-managed columns will reach projection output",
        ));
    }
    for suffix in suffixes.iter().filter(|s| !s.starts_with('_')) {
        warnings.push(ConfigWarning::warning(
            "schema.system_field_suffixes",
            format!("suffix '{suffix}' does not start with '_'"),
        ));
    }

    if config.schema.it_resource_field_type.trim().is_empty() {
        warnings.push(ConfigWarning::warning(
            "schema.it_resource_field_type",
            "empty type: no field will be reported as the IT-resource selector",
        ));
    }

    if config.request.completed_status.trim().is_empty() {
        warnings.push(ConfigWarning::error(
            "request.completed_status",
            "empty status token: direct writes cannot be told apart from failures",
        ));
    }

    if config.account.active_statuses.is_empty() {
        warnings.push(ConfigWarning::warning(
            "account.active_statuses",
            "empty list: no primary account field can be read",
        ));
    }

    warnings
}

/// Validate `config`, failing on any error-severity problem. On success the
/// remaining warnings are returned for the caller to report.
pub fn check_config(config: &PvbConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let (errors, warnings): (Vec<_>, Vec<_>) = validate_config(config)
        .into_iter()
        .partition(|w| w.severity == Severity::Error);
    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::Invalid(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_clean() {
        assert!(validate_config(&PvbConfig::default()).is_empty());
    }

    #[test]
    fn test_reports_every_problem() {
        let mut config = PvbConfig::default();
        config.schema.system_field_suffixes = vec!["KEY".to_string()];
        config.schema.it_resource_field_type = " ".to_string();
        config.request.completed_status = String::new();
        config.account.active_statuses.clear();

        let warnings = validate_config(&config);
        let keys: Vec<&str> = warnings.iter().map(|w| w.key).collect();
        assert_eq!(
            keys,
            vec![
                "schema.system_field_suffixes",
                "schema.it_resource_field_type",
                "request.completed_status",
                "account.active_statuses"
            ]
        );
        assert_eq!(warnings[2].severity, Severity::Error);
        assert!(warnings[0].to_string().starts_with("warning: schema.system_field_suffixes"));
    }

    #[test]
    fn test_check_config_fails_only_on_errors() {
        let mut config = PvbConfig::default();
        config.account.active_statuses.clear();
        let warnings = check_config(&config).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].key, "account.active_statuses");

        config.request.completed_status = "  ".to_string();
        let err = check_config(&config).unwrap_err();
        assert_eq!(err.code(), crate::errors::ErrorCode::ConfigValidationError);
        assert_eq!(err.code().code_string(), "PVB-E004");
        match err {
            ConfigError::Invalid(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].key, "request.completed_status");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
