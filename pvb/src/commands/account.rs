//! `pvb account` subcommands.

use super::helpers::parse_assignments;
use crate::context::Context;
use anyhow::Result;
use clap::Subcommand;
use pvb_common::FieldMap;
use serde::Serialize;

#[derive(Subcommand)]
pub enum AccountCommand {
    /// Write account fields directly, bypassing approval
    SetField {
        /// User key owning the account
        #[arg(long)]
        user: String,

        /// Process instance the account is bound to
        #[arg(long)]
        process_instance: i64,

        /// Field assignment as NAME=VALUE (repeatable)
        ///
        /// VALUE is typed when it parses as JSON: `42` and `1e3` are numbers,
        /// `true` is a boolean, `{"long": 5}` and `{"date": "..."}` are tagged.
        /// Anything else is text. Quote VALUE as a JSON string to keep it as
        /// text, e.g. `--field 'LOGIN="1e3"'`.
        #[arg(long = "field", value_name = "NAME=VALUE", required = true)]
        fields: Vec<String>,
    },

    /// Read a field of the user's live primary account
    Get {
        #[arg(long)]
        user: String,

        #[arg(long)]
        app_instance: String,

        #[arg(long)]
        field: String,
    },
}

#[derive(Serialize)]
struct SetFieldOutput {
    status: String,
    fields: FieldMap,
}

#[derive(Serialize)]
struct GetOutput {
    value: Option<String>,
}

pub fn run(ctx: &Context, cmd: &AccountCommand) -> Result<()> {
    match cmd {
        AccountCommand::SetField {
            user,
            process_instance,
            fields,
        } => {
            let values = parse_assignments(fields)?;
            let status = ctx.mutator().set_fields(user, *process_instance, &values)?;
            let output = SetFieldOutput {
                status,
                fields: values,
            };
            ctx.emit(&output, || output.status.clone())
        }
        AccountCommand::Get {
            user,
            app_instance,
            field,
        } => {
            let value = ctx.mutator().primary_account_field(user, app_instance, field)?;
            let output = GetOutput { value };
            ctx.emit(&output, || {
                output
                    .value
                    .clone()
                    .unwrap_or_else(|| "(no live primary account)".to_string())
            })
        }
    }
}
