//! Display projection of form data.
//!
//! Projection strips platform-managed columns, drops every encrypted or
//! hidden field unconditionally, and re-keys labelled fields from system
//! name to label. The configured [`ProjectionOrder`] applies to top-level
//! projection and child-section rendering alike. Rendered text is plain:
//! nothing is escaped.

use crate::errors::InvalidArgument;
use crate::schema::{FormRef, FormSchema, SchemaCache};
use crate::types::{ChildSections, FieldMap, ProjectionOrder};
use crate::Result;
use regex::Regex;
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::LazyLock;
use tracing::debug;

static FORM_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(UD_[A-Z0-9]*)").expect("form prefix pattern is valid"));

#[derive(Clone)]
pub struct FieldProjector {
    schema: SchemaCache,
    order: ProjectionOrder,
}

impl FieldProjector {
    pub fn new(schema: SchemaCache) -> Self {
        Self {
            schema,
            order: ProjectionOrder::default(),
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: ProjectionOrder) -> Self {
        self.order = order;
        self
    }

    /// Project one form's data for display.
    ///
    /// A form without an active version passes through with only the
    /// platform-managed columns removed.
    pub fn project(&self, form: &str, data: FieldMap) -> Result<FieldMap> {
        let data = self.strip_system_fields(form, data);
        match self.schema.load_active(form)? {
            Some(schema) => Ok(self.apply(&schema, data)),
            None => Ok(data),
        }
    }

    /// Render child-form rows as text.
    ///
    /// Each child form is introduced by its description (or name) and a
    /// colon; each projected field becomes `<action> - <label>: <value>`.
    /// Every line ends with a newline.
    pub fn project_child_sections(&self, sections: &ChildSections) -> Result<String> {
        let mut out = String::new();
        for (child, records) in sections {
            let definition = self.schema.resolve_form(FormRef::Name(child))?;
            let schema = self.schema.load_active(child)?;
            let heading = definition.description.as_deref().unwrap_or(&definition.name);
            let _ = writeln!(out, "{heading}:");

            for record in records {
                let data = self.strip_system_fields(child, record.data.clone());
                let projected = match &schema {
                    Some(schema) => self.apply(schema, data),
                    None => data,
                };
                for (field, value) in projected.iter() {
                    let _ = writeln!(out, "{} - {field}: {value}", record.action);
                }
            }
        }
        Ok(out)
    }

    /// Render parent-form data as `<label>: <value>` lines. The form name is
    /// taken from the `UD_<NAME>` prefix of the first key.
    pub fn render_form_values(&self, data: FieldMap) -> Result<String> {
        let Some(first) = data.keys().next() else {
            return Ok(String::new());
        };
        let form = FORM_PREFIX
            .captures(first)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| InvalidArgument::FormNameUninferable(first.to_string()))?;

        let projected = self.project(&form, data)?;
        let mut out = String::new();
        for (field, value) in projected.iter() {
            let _ = writeln!(out, "{field}: {value}");
        }
        Ok(out)
    }

    fn strip_system_fields(&self, form: &str, mut data: FieldMap) -> FieldMap {
        for suffix in &self.schema.config().system_field_suffixes {
            data.remove(&format!("{form}{suffix}"));
        }
        data
    }

    /// Keys the schema does not know pass through unchanged, except when
    /// they collide with the label of a field present in `data`: the
    /// labelled field's value is kept.
    fn apply(&self, schema: &FormSchema, data: FieldMap) -> FieldMap {
        let labels: HashSet<&str> = schema
            .fields
            .iter()
            .filter(|f| !f.is_redacted() && data.contains_key(&f.name))
            .map(|f| f.display_name())
            .filter(|label| schema.field(label).is_none())
            .collect();

        let mut redacted = 0usize;
        let mut out = FieldMap::new();
        match self.order {
            ProjectionOrder::Supplied => {
                for (name, value) in data {
                    match schema.field(&name) {
                        Some(field) if field.is_redacted() => redacted += 1,
                        Some(field) => {
                            out.insert(field.display_name(), value);
                        }
                        None if labels.contains(name.as_str()) => {
                            debug!(key = %name, "dropped key shadowed by a field label");
                        }
                        None => {
                            out.insert(name, value);
                        }
                    }
                }
            }
            ProjectionOrder::Schema => {
                let mut rest = data;
                for field in &schema.fields {
                    let Some(value) = rest.remove(&field.name) else {
                        continue;
                    };
                    if field.is_redacted() {
                        redacted += 1;
                    } else {
                        out.insert(field.display_name(), value);
                    }
                }
                for (name, value) in rest {
                    if labels.contains(name.as_str()) {
                        debug!(key = %name, "dropped key shadowed by a field label");
                        continue;
                    }
                    out.insert(name, value);
                }
            }
        }
        debug!(form = %schema.form.name, redacted, emitted = out.len(), "projected form data");
        out
    }
}
