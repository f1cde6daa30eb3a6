//! `pvb snapshot` subcommands.

use anyhow::Result;
use clap::Subcommand;
use pvb_common::Snapshot;

#[derive(Subcommand)]
pub enum SnapshotCommand {
    /// Print the JSON Schema of the snapshot file format
    Schema,
}

pub fn run(cmd: &SnapshotCommand) -> Result<()> {
    match cmd {
        SnapshotCommand::Schema => {
            println!("{}", serde_json::to_string_pretty(&Snapshot::json_schema())?);
        }
    }
    Ok(())
}
