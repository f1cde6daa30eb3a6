//! `pvb entitlement` subcommands.

use crate::context::Context;
use anyhow::Result;
use clap::Subcommand;
use pvb_common::EntitlementTarget;
use serde::Serialize;

#[derive(Subcommand)]
pub enum EntitlementCommand {
    /// Find the entitlement for a lookup code, creating it if missing
    Ensure {
        /// Application instance the entitlement belongs to
        #[arg(long)]
        app_instance: String,

        /// Lookup list holding the code/label pair
        #[arg(long)]
        lookup_list: String,

        /// Entitlement code (lookup code)
        #[arg(long)]
        code: String,

        /// Entitlement label (lookup decode)
        #[arg(long)]
        label: String,

        /// Child form carrying the entitlement field
        #[arg(long)]
        form: String,

        /// Field of the child form
        #[arg(long)]
        field: String,
    },
}

#[derive(Serialize)]
struct EnsureOutput<'a> {
    created: bool,
    entitlement: &'a pvb_common::Entitlement,
}

pub fn run(ctx: &Context, cmd: &EntitlementCommand) -> Result<()> {
    match cmd {
        EntitlementCommand::Ensure {
            app_instance,
            lookup_list,
            code,
            label,
            form,
            field,
        } => {
            let target = EntitlementTarget {
                app_instance: app_instance.clone(),
                lookup_list: lookup_list.clone(),
                code: code.clone(),
                label: label.clone(),
                form: form.clone(),
                field: field.clone(),
            };
            let outcome = ctx.reconciler().find_or_create(&target)?;
            let entitlement = outcome.entitlement();
            let output = EnsureOutput {
                created: outcome.is_created(),
                entitlement,
            };
            ctx.emit(&output, || {
                format!(
                    "{} entitlement #{} {} ({})",
                    if output.created { "created" } else { "existing" },
                    entitlement.key,
                    entitlement.code,
                    entitlement.display_name
                )
            })
        }
    }
}
