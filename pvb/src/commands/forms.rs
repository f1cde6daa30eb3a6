//! Schema inspection and form rendering.

use super::helpers::{format_fields, read_json_arg};
use crate::context::Context;
use anyhow::{Context as _, Result};
use pvb_common::{ChildSections, FieldDefinition, FieldMap};
use serde::Serialize;
use std::fmt::Write;

#[derive(Serialize)]
struct FieldsOutput<'a> {
    form: &'a str,
    version: i32,
    fields: &'a [FieldDefinition],
}

pub fn fields(ctx: &Context, form: &str) -> Result<()> {
    let schema = ctx.schema().load(form)?;
    let output = FieldsOutput {
        form,
        version: schema.version,
        fields: &schema.fields,
    };
    ctx.emit(&output, || {
        let mut text = format!("{form} (version {})\n", schema.version);
        for field in &schema.fields {
            let order = field.order.map_or_else(|| "-".to_string(), |o| o.to_string());
            let mut flags = Vec::new();
            if field.encrypted {
                flags.push("encrypted");
            }
            if !field.visible {
                flags.push("hidden");
            }
            let _ = writeln!(
                text,
                "  {order:>3}  {:<24} {:<24} {}{}",
                field.name,
                field.label.as_deref().unwrap_or(""),
                field.field_type,
                if flags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", flags.join(", "))
                }
            );
        }
        text
    })
}

pub fn render(ctx: &Context, form: Option<&str>, data: &str) -> Result<()> {
    let values: FieldMap = read_json_arg(data)?;
    match form {
        Some(form) => {
            let projected = ctx
                .projector()
                .project(form, values)
                .with_context(|| format!("projecting {form}"))?;
            ctx.emit(&projected, || format_fields(&projected))
        }
        None => {
            let text = ctx.projector().render_form_values(values)?;
            ctx.emit(&text, || text.clone())
        }
    }
}

pub fn render_children(ctx: &Context, data: &str) -> Result<()> {
    let sections: ChildSections = read_json_arg(data)?;
    let text = ctx.projector().project_child_sections(&sections)?;
    ctx.emit(&text, || text.clone())
}
