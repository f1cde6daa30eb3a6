//! Shared argument parsing for pvb commands.

use anyhow::{Context as _, Result, anyhow};
use pvb_common::{FieldMap, FieldValue};
use serde::de::DeserializeOwned;
use std::fmt::Write;
use std::path::Path;

/// Parse a JSON argument given inline or as `@path`.
pub fn read_json_arg<T: DeserializeOwned>(arg: &str) -> Result<T> {
    match arg.strip_prefix('@') {
        Some(path) => {
            let content = std::fs::read_to_string(Path::new(path))
                .with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&content).with_context(|| format!("parsing {path}"))
        }
        None => serde_json::from_str(arg).context("parsing inline JSON"),
    }
}

/// Parse a `NAME=VALUE` assignment.
///
/// The value is read as JSON when it parses (`42`, `1e3`, `true`,
/// `{"long": 5}`, `{"date": "2024-01-02T00:00:00Z"}`, `null`), otherwise as
/// plain text. A JSON string (`LOGIN="007"`) is always text.
pub fn parse_assignment(raw: &str) -> Result<(String, FieldValue)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("empty field name in '{raw}'"));
    }
    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(json) => FieldValue::try_from(json).map_err(|e| anyhow!("{name}: {e}"))?,
        Err(_) => FieldValue::from(value),
    };
    Ok((name.to_string(), value))
}

pub fn parse_assignments(raw: &[String]) -> Result<FieldMap> {
    let mut fields = FieldMap::new();
    for item in raw {
        let (name, value) = parse_assignment(item)?;
        fields.insert(name, value);
    }
    Ok(fields)
}

/// Render a field map as aligned `name: value` lines.
pub fn format_fields(fields: &FieldMap) -> String {
    let width = fields.keys().map(str::len).max().unwrap_or(0);
    let mut out = String::new();
    for (name, value) in fields.iter() {
        let _ = writeln!(out, "{name:<width$}  {value}");
    }
    out
}
