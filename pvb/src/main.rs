//! Provisioning Bridge - operator CLI
//!
//! Loads a JSON snapshot of an identity store into the in-memory store and
//! runs schema inspection, form rendering, entitlement reconciliation,
//! request construction and direct account edits against it.

#![forbid(unsafe_code)]

mod commands;
mod context;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use commands::{AccountCommand, ConfigCommand, EntitlementCommand, RequestCommand, SnapshotCommand};
use context::Context;
use pvb_common::config::{ConfigError, check_config};
use pvb_common::memory::SnapshotError;
use pvb_common::{ErrorCode, LoadedConfig, LogConfig, PvbError, init_logging, load_config};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;

/// Log level when no configuration could be loaded.
const FALLBACK_LOG_LEVEL: &str = "warn";

#[derive(Parser)]
#[command(name = "pvb")]
#[command(author, version, about = "Provisioning bridge - identity store operator CLI")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Identity store snapshot (JSON)
    #[arg(long, global = true, env = "PVB_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "PVB_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Save store mutations back to the snapshot file
    #[arg(long, global = true)]
    write: bool,

    /// Submit requests for direct application instead of approval
    #[arg(long, global = true)]
    direct: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the fields of a form's active version
    Fields {
        /// Form name (e.g. UD_ADUSER)
        form: String,
    },

    /// Project form data for display
    ///
    /// Without a form name, the form is inferred from the `UD_<NAME>` prefix
    /// of the first key and the result is rendered as `label: value` lines.
    Render {
        /// Form name
        form: Option<String>,

        /// Form data as a JSON object, or @path to a JSON file
        #[arg(long)]
        data: String,
    },

    /// Render child-form rows as text
    RenderChildren {
        /// Child sections as JSON (`{"<form>": [{"action": "add", "data": {...}}]}`),
        /// or @path to a JSON file
        #[arg(long)]
        data: String,
    },

    /// Entitlement reconciliation
    #[command(subcommand)]
    Entitlement(EntitlementCommand),

    /// Build and submit provisioning requests
    #[command(subcommand)]
    Request(RequestCommand),

    /// Direct account edits
    #[command(subcommand)]
    Account(AccountCommand),

    /// Configuration inspection
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Snapshot file utilities
    #[command(subcommand)]
    Snapshot(SnapshotCommand),

    /// Explain an error code (e.g. PVB-E200), or list all codes
    Explain {
        code: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    // `--verbose` wins over PVB_LOG_LEVEL, which wins over general.log_level.
    let default_level = config
        .as_ref()
        .map_or(FALLBACK_LOG_LEVEL, |loaded| loaded.config.general.log_level.as_str());
    let mut log_config = LogConfig::from_env(default_level).with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = match init_logging(&log_config) {
        Ok(guards) => Some(guards),
        Err(err) => {
            eprintln!("warning: logging disabled: {err}");
            None
        }
    };

    match run(&cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: Result<LoadedConfig, ConfigError>) -> Result<()> {
    match &cli.command {
        Commands::Snapshot(cmd) => return commands::snapshot::run(cmd),
        Commands::Explain { code } => return commands::explain::run(code.as_deref(), cli.json),
        _ => {}
    }

    let config = config.context("loading configuration")?;
    // `config show` lists problems instead of failing on them.
    if !matches!(cli.command, Commands::Config(_)) {
        let warnings = check_config(&config.config).context("validating configuration")?;
        for warning in warnings {
            warn!(key = warning.key, "{}", warning.message);
        }
    }

    let ctx = Context::load(cli, config)?;
    match &cli.command {
        Commands::Fields { form } => commands::forms::fields(&ctx, form)?,
        Commands::Render { form, data } => commands::forms::render(&ctx, form.as_deref(), data)?,
        Commands::RenderChildren { data } => commands::forms::render_children(&ctx, data)?,
        Commands::Entitlement(cmd) => commands::entitlement::run(&ctx, cmd)?,
        Commands::Request(cmd) => commands::request::run(&ctx, cmd)?,
        Commands::Account(cmd) => commands::account::run(&ctx, cmd)?,
        Commands::Config(cmd) => commands::config::run(&ctx, cmd)?,
        Commands::Snapshot(_) | Commands::Explain { .. } => {}
    }
    ctx.persist()
}

/// Print the error chain, then the catalog entry of the first coded cause.
fn report(err: &anyhow::Error) {
    eprintln!("error: {err:#}");
    if let Some(code) = error_code(err) {
        eprintln!();
        eprintln!("{}", code.entry().format_full());
    }
}

fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<PvbError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<ConfigError>() {
            Some(e.code())
        } else {
            cause.downcast_ref::<SnapshotError>().map(SnapshotError::code)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pvb_common::errors::EntityKind;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_field_help_explains_json_values() {
        let mut cmd = Cli::command();
        let set_field = cmd
            .find_subcommand_mut("account")
            .and_then(|account| account.find_subcommand_mut("set-field"))
            .unwrap();
        let help = set_field.render_long_help().to_string();
        assert!(help.contains("parses as JSON"), "{help}");
        assert!(help.contains(r#"'LOGIN="1e3"'"#), "{help}");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pvb",
            "request",
            "revoke",
            "--beneficiary",
            "1001",
            "--app-instance",
            "AD",
            "--account-id",
            "alice",
            "--direct",
            "--json",
        ])
        .unwrap();
        assert!(cli.direct);
        assert!(cli.json);
        assert!(!cli.write);
    }

    #[test]
    fn test_error_code_found_through_context() {
        let err = anyhow::Error::new(PvbError::not_found(EntityKind::Form, "UD_X"))
            .context("rendering form");
        assert_eq!(error_code(&err), Some(ErrorCode::SchemaFormNotFound));
        assert_eq!(error_code(&anyhow::anyhow!("plain")), None);
    }

    #[test]
    fn test_invalid_config_fails_before_context() {
        let cli = Cli::try_parse_from(["pvb", "fields", "UD_APP"]).unwrap();
        let mut config = pvb_common::PvbConfig::default();
        config.request.completed_status = String::new();
        let loaded = LoadedConfig {
            config,
            path: None,
            sources: Default::default(),
        };

        let err = run(&cli, Ok(loaded)).unwrap_err();
        assert_eq!(error_code(&err), Some(ErrorCode::ConfigValidationError));
        assert!(format!("{err:#}").contains("request.completed_status"));
    }
}
