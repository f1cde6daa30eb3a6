//! Configuration system for the provisioning bridge.
//!
//! Values are layered, lowest precedence first:
//! - built-in defaults
//! - a TOML file (explicit path, or `<config_dir>/pvb/config.toml`)
//! - `PVB_*` environment variables
//!
//! The source of every tunable key is tracked for `pvb config show`.

pub mod env;
pub mod source;
pub mod validate;

pub use env::{EnvError, EnvParser};
pub use source::{ConfigSource, Sourced};
pub use validate::{ConfigWarning, Severity, check_config, validate_config};

use crate::errors::ErrorCode;
use crate::types::{ProjectionOrder, PvbConfig};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Dotted keys of every tunable value.
pub const CONFIG_KEYS: &[&str] = &[
    "general.log_level",
    "schema.system_field_suffixes",
    "schema.it_resource_field_type",
    "projection.order",
    "request.completed_status",
    "account.primary_only",
    "account.active_statuses",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid environment overrides: {}", join(.0))]
    Env(Vec<EnvError>),

    #[error("invalid configuration: {}", join(.0))]
    Invalid(Vec<ConfigWarning>),
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::ConfigNotFound,
            Self::Read { .. } => ErrorCode::ConfigReadError,
            Self::Parse { .. } => ErrorCode::ConfigParseError,
            Self::Env(_) => ErrorCode::ConfigEnvError,
            Self::Invalid(_) => ErrorCode::ConfigValidationError,
        }
    }
}

/// A loaded configuration with the file it came from and per-key sources.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: PvbConfig,
    pub path: Option<PathBuf>,
    pub sources: BTreeMap<&'static str, ConfigSource>,
}

impl LoadedConfig {
    pub fn source_of(&self, key: &str) -> ConfigSource {
        self.sources.get(key).copied().unwrap_or(ConfigSource::Default)
    }
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pvb").join("config.toml"))
}

/// Load configuration from the process environment.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    load_config_with(explicit, default_config_path().as_deref(), EnvParser::new())
}

/// Load configuration with an explicit fallback path and environment.
///
/// An explicit path must exist; the fallback path is used only if present.
pub fn load_config_with(
    explicit: Option<&Path>,
    fallback: Option<&Path>,
    mut env: EnvParser,
) -> Result<LoadedConfig, ConfigError> {
    let path = match explicit {
        Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
        Some(path) => Some(path.to_path_buf()),
        None => fallback.filter(|p| p.is_file()).map(Path::to_path_buf),
    };

    let mut sources = BTreeMap::new();
    let mut config = match &path {
        Some(path) => {
            let (config, present) = read_file(path)?;
            for key in CONFIG_KEYS {
                if present.iter().any(|p| p.as_str() == *key) {
                    sources.insert(*key, ConfigSource::File);
                }
            }
            config
        }
        None => PvbConfig::default(),
    };

    apply_env(&mut config, &mut env, &mut sources);
    if env.has_errors() {
        return Err(ConfigError::Env(env.take_errors()));
    }

    debug!(path = ?path, overrides = sources.len(), "loaded configuration");
    Ok(LoadedConfig {
        config,
        path,
        sources,
    })
}

/// Parse a config file, returning the config and the dotted keys it sets.
fn read_file(path: &Path) -> Result<(PvbConfig, Vec<String>), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let config: PvbConfig = toml::from_str(&content).map_err(parse_err)?;
    let table: toml::Table = toml::from_str(&content).map_err(parse_err)?;

    let mut present = Vec::new();
    for (section, value) in &table {
        if let Some(keys) = value.as_table() {
            present.extend(keys.keys().map(|key| format!("{section}.{key}")));
        }
    }
    Ok((config, present))
}

fn apply_env(
    config: &mut PvbConfig,
    env: &mut EnvParser,
    sources: &mut BTreeMap<&'static str, ConfigSource>,
) {
    let mut track = |key: &'static str, applied: bool| {
        if applied {
            sources.insert(key, ConfigSource::Environment);
        }
    };

    let level = env.get_log_level("LOG_LEVEL", &config.general.log_level);
    track("general.log_level", level.apply_to(&mut config.general.log_level));

    let suffixes = env.get_string_list(
        "SYSTEM_FIELD_SUFFIXES",
        config.schema.system_field_suffixes.clone(),
    );
    track(
        "schema.system_field_suffixes",
        suffixes.apply_to(&mut config.schema.system_field_suffixes),
    );

    let it_type = env.get_string(
        "IT_RESOURCE_FIELD_TYPE",
        &config.schema.it_resource_field_type,
    );
    track(
        "schema.it_resource_field_type",
        it_type.apply_to(&mut config.schema.it_resource_field_type),
    );

    let order = env.get_parsed::<ProjectionOrder>(
        "PROJECTION_ORDER",
        config.projection.order,
        "projection order (schema|supplied)",
    );
    track("projection.order", order.apply_to(&mut config.projection.order));

    let status = env.get_string("COMPLETED_STATUS", &config.request.completed_status);
    track(
        "request.completed_status",
        status.apply_to(&mut config.request.completed_status),
    );

    let primary_only = env.get_bool("PRIMARY_ONLY", config.account.primary_only);
    track(
        "account.primary_only",
        primary_only.apply_to(&mut config.account.primary_only),
    );

    let statuses = env.get_string_list("ACTIVE_STATUSES", config.account.active_statuses.clone());
    track(
        "account.active_statuses",
        statuses.apply_to(&mut config.account.active_statuses),
    );
}
