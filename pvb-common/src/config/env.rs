//! Environment variable parsing with type safety.
//!
//! Provides a type-safe parser for `PVB_` environment variables with
//! validation, error collection, and source tracking.

use super::source::Sourced;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// Invalid value for a variable.
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    /// Invalid log level.
    #[error("Invalid log level for {var}: {value}")]
    InvalidLogLevel { var: String, value: String },
}

/// Type-safe environment variable parser.
///
/// Collects errors during parsing so all issues can be reported at once.
/// Reads the process environment unless built with [`EnvParser::from_vars`].
pub struct EnvParser {
    prefix: &'static str,
    vars: Option<HashMap<String, String>>,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Create a new parser over the process environment with the PVB_ prefix.
    pub fn new() -> Self {
        Self {
            prefix: "PVB_",
            vars: None,
            errors: Vec::new(),
        }
    }

    /// Create a parser over a fixed set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            ..Self::new()
        }
    }

    /// Get all accumulated errors.
    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    /// Check if any errors occurred.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Take ownership of errors.
    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    /// Get the full variable name with prefix.
    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn lookup(&self, var_name: &str) -> Option<String> {
        match &self.vars {
            Some(vars) => vars.get(var_name).cloned(),
            None => std::env::var(var_name).ok(),
        }
    }

    /// Get a string value with default.
    pub fn get_string(&mut self, name: &str, default: &str) -> Sourced<String> {
        let var_name = self.var_name(name);
        match self.lookup(&var_name) {
            Some(value) => Sourced::from_env(value, var_name),
            None => Sourced::default_value(default.to_string()),
        }
    }

    /// Get a boolean value with default.
    ///
    /// Accepts: 1, true, yes, on (for true)
    ///          0, false, no, off, "" (for false)
    pub fn get_bool(&mut self, name: &str, default: bool) -> Sourced<bool> {
        let var_name = self.var_name(name);
        match self.lookup(&var_name) {
            Some(value) => match parse_bool(&value) {
                Some(parsed) => Sourced::from_env(parsed, var_name),
                None => {
                    self.errors.push(EnvError::InvalidValue {
                        var: var_name.clone(),
                        expected: "boolean (true/false/1/0/yes/no)".to_string(),
                        value,
                    });
                    Sourced::default_value(default)
                }
            },
            None => Sourced::default_value(default),
        }
    }

    /// Get any value implementing `FromStr`, recording an error on failure.
    pub fn get_parsed<T: FromStr>(&mut self, name: &str, default: T, expected: &str) -> Sourced<T> {
        let var_name = self.var_name(name);
        match self.lookup(&var_name) {
            Some(value) => match value.trim().parse::<T>() {
                Ok(parsed) => Sourced::from_env(parsed, var_name),
                Err(_) => {
                    self.errors.push(EnvError::InvalidValue {
                        var: var_name.clone(),
                        expected: expected.to_string(),
                        value,
                    });
                    Sourced::default_value(default)
                }
            },
            None => Sourced::default_value(default),
        }
    }

    /// Get a log level value with validation.
    pub fn get_log_level(&mut self, name: &str, default: &str) -> Sourced<String> {
        let var_name = self.var_name(name);
        match self.lookup(&var_name) {
            Some(value) => match parse_log_level(&value) {
                Some(level) => Sourced::from_env(level, var_name),
                None => {
                    self.errors.push(EnvError::InvalidLogLevel {
                        var: var_name.clone(),
                        value,
                    });
                    Sourced::default_value(default.to_string())
                }
            },
            None => Sourced::default_value(default.to_string()),
        }
    }

    /// Get a comma-separated list of strings.
    pub fn get_string_list(&mut self, name: &str, default: Vec<String>) -> Sourced<Vec<String>> {
        let var_name = self.var_name(name);
        match self.lookup(&var_name) {
            Some(value) => Sourced::from_env(parse_string_list(&value), var_name),
            None => Sourced::default_value(default),
        }
    }

    /// Get an optional string (None if not set or empty).
    pub fn get_optional_string(&mut self, name: &str) -> Sourced<Option<String>> {
        let var_name = self.var_name(name);
        match self.lookup(&var_name) {
            Some(value) if value.is_empty() => Sourced::from_env(None, var_name),
            Some(value) => Sourced::from_env(Some(value), var_name),
            None => Sourced::default_value(None),
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn parse_log_level(value: &str) -> Option<String> {
    let lower = value.to_lowercase();
    matches!(
        lower.as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    )
    .then_some(lower)
}

fn parse_string_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
