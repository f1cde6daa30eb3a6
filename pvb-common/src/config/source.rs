//! Source tracking for configuration values.

use serde::Serialize;
use std::fmt;

/// Where a configuration value came from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::File => write!(f, "file"),
            Self::Environment => write!(f, "env"),
        }
    }
}

/// A value paired with its source (and the variable name, for env values).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ConfigSource,
    pub var: Option<String>,
}

impl<T> Sourced<T> {
    pub fn default_value(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::Default,
            var: None,
        }
    }

    pub fn from_env(value: T, var: impl Into<String>) -> Self {
        Self {
            value,
            source: ConfigSource::Environment,
            var: Some(var.into()),
        }
    }

    pub fn is_env(&self) -> bool {
        self.source == ConfigSource::Environment
    }

    /// Write the value into `slot` when it came from the environment.
    pub fn apply_to(self, slot: &mut T) -> bool {
        if self.is_env() {
            *slot = self.value;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_only_env_values() {
        let mut slot = 1;
        assert!(!Sourced::default_value(5).apply_to(&mut slot));
        assert_eq!(slot, 1);
        assert!(Sourced::from_env(7, "PVB_X").apply_to(&mut slot));
        assert_eq!(slot, 7);
    }

    #[test]
    fn test_source_ordering() {
        assert!(ConfigSource::Environment > ConfigSource::File);
        assert!(ConfigSource::File > ConfigSource::Default);
        assert_eq!(ConfigSource::Environment.to_string(), "env");
    }
}
