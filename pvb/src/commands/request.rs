//! `pvb request` subcommands.
//!
//! Requests go to the snapshot's approval stub; with `--direct` they are
//! submitted with the direct intent.

use super::helpers::parse_assignments;
use crate::context::Context;
use anyhow::Result;
use clap::Subcommand;
use pvb_common::TypedAttribute;
use serde::Serialize;

#[derive(Subcommand)]
pub enum RequestCommand {
    /// Request a new account
    Grant {
        #[arg(long)]
        beneficiary: String,

        #[arg(long)]
        app_instance: String,

        /// Form value as NAME=VALUE (repeatable)
        ///
        /// VALUE is typed when it parses as JSON: `42` and `1e3` are numbers,
        /// `true` is a boolean, `{"long": 5}` and `{"date": "..."}` are tagged.
        /// Anything else is text. Quote VALUE as a JSON string to keep it as
        /// text, e.g. `--field 'LOGIN="1e3"'`.
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
    },

    /// Request changes to an existing account
    Modify {
        #[arg(long)]
        beneficiary: String,

        #[arg(long)]
        app_instance: String,

        #[arg(long)]
        account_id: String,

        /// Changed value as NAME=VALUE (repeatable)
        ///
        /// VALUE is typed when it parses as JSON: `42` and `1e3` are numbers,
        /// `true` is a boolean, `{"long": 5}` and `{"date": "..."}` are tagged.
        /// Anything else is text. Quote VALUE as a JSON string to keep it as
        /// text, e.g. `--field 'LOGIN="1e3"'`.
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
    },

    /// Request revocation of an account
    Revoke {
        #[arg(long)]
        beneficiary: String,

        #[arg(long)]
        app_instance: String,

        #[arg(long)]
        account_id: String,
    },
}

#[derive(Serialize)]
struct RequestOutput {
    status: Option<String>,
}

pub fn run(ctx: &Context, cmd: &RequestCommand) -> Result<()> {
    let requests = ctx.requests();
    let status = match cmd {
        RequestCommand::Grant {
            beneficiary,
            app_instance,
            fields,
        } => requests.grant(beneficiary, app_instance, &parse_assignments(fields)?)?,
        RequestCommand::Modify {
            beneficiary,
            app_instance,
            account_id,
            fields,
        } => {
            let attributes = TypedAttribute::infer_all(&parse_assignments(fields)?);
            requests.modify(beneficiary, app_instance, account_id, attributes)?
        }
        RequestCommand::Revoke {
            beneficiary,
            app_instance,
            account_id,
        } => requests.revoke(beneficiary, app_instance, account_id)?,
    };

    let output = RequestOutput { status };
    ctx.emit(&output, || match &output.status {
        Some(status) => status.clone(),
        None => "submitted (no status returned)".to_string(),
    })
}
