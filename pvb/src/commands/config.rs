//! `pvb config` subcommands.

use crate::context::Context;
use anyhow::Result;
use clap::Subcommand;
use pvb_common::config::{CONFIG_KEYS, ConfigSource, ConfigWarning, validate_config};
use pvb_common::PvbConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration and where each value came from
    Show,
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    path: Option<String>,
    config: &'a PvbConfig,
    sources: BTreeMap<&'static str, ConfigSource>,
    warnings: Vec<ConfigWarning>,
}

pub fn run(ctx: &Context, cmd: &ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(ctx),
    }
}

fn show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.config;
    let sources = CONFIG_KEYS
        .iter()
        .map(|key| (*key, loaded.source_of(key)))
        .collect();
    let output = ShowOutput {
        path: loaded.path.as_ref().map(|p| p.display().to_string()),
        config: &loaded.config,
        sources,
        warnings: validate_config(&loaded.config),
    };

    ctx.emit(&output, || {
        let mut text = String::new();
        let _ = writeln!(
            text,
            "config file: {}",
            output.path.as_deref().unwrap_or("(none)")
        );
        let value = serde_json::to_value(&loaded.config).unwrap_or_default();
        for (key, source) in &output.sources {
            let shown = key
                .split_once('.')
                .and_then(|(section, name)| value.get(section)?.get(name))
                .map(ToString::to_string)
                .unwrap_or_default();
            let _ = writeln!(text, "  {key:<32} {shown}  ({source})");
        }
        for warning in &output.warnings {
            let _ = writeln!(text, "{warning}");
        }
        text
    })
}
