//! Populating entries from foreign items and rendering templates against them.

use indexmap::IndexMap;
use log::trace;

use crate::{
    error::{EntryResult, RenderError},
    value::{Value, ValueMap},
};

use super::record::Entry;

/// Something whose fields can be read by name: a mapping or a value with
/// attributes.
pub trait FieldSource {
    /// Value of `name`, if present.
    fn field(&self, name: &str) -> Option<Value>;
}

impl FieldSource for Value {
    fn field(&self, name: &str) -> Option<Value> {
        match self {
            Value::Map(map) => map.get(name).cloned(),
            Value::Custom(custom) => custom.0.attr(name),
            _ => None,
        }
    }
}

impl FieldSource for ValueMap {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl FieldSource for serde_json::Value {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).map(Value::from_json)
    }
}

impl FieldSource for Entry {
    fn field(&self, name: &str) -> Option<Value> {
        self.peek(name).cloned()
    }
}

/// Follows a dot separated path (`"a.b.c"`) through `source`.
pub fn lookup_path(source: &dyn FieldSource, path: &str) -> Option<Value> {
    let mut parts = path.split('.');
    let mut current = source.field(parts.next()?)?;
    for part in parts {
        current = current.field(part)?;
    }
    Some(current)
}

/// How one entry field is obtained from a source item.
pub enum FieldMapping {
    /// Dotted path into the source.
    Path(String),
    /// Computed from the whole source.
    Compute(Box<dyn Fn(&dyn FieldSource) -> Value + Send + Sync>),
}

impl FieldMapping {
    /// Path mapping.
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    /// Computed mapping.
    pub fn compute<F>(func: F) -> Self
    where
        F: Fn(&dyn FieldSource) -> Value + Send + Sync + 'static,
    {
        Self::Compute(Box::new(func))
    }
}

/// Result of rendering a template.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    /// Rendered text.
    Text(String),
    /// Native value, produced in native mode.
    Native(Value),
}

/// Template engine used by [`Entry::render`].
pub trait TemplateRenderer {
    /// Renders `template` with `context` as the variable scope. Lazy fields
    /// may be resolved through `context` while rendering.
    fn render(&self, template: &str, context: &mut Entry, native: bool) -> Result<Rendered, RenderError>;
}

impl Entry {
    /// Sets entry fields from `source` following `field_map`.
    ///
    /// Missing paths produce `Value::Null`; with `ignore_none` those fields
    /// are left untouched.
    pub fn update_using_map(
        &mut self,
        field_map: &IndexMap<String, FieldMapping>,
        source: &dyn FieldSource,
        ignore_none: bool,
    ) -> EntryResult<()> {
        for (field, mapping) in field_map {
            let value = match mapping {
                FieldMapping::Path(path) => lookup_path(source, path).unwrap_or(Value::Null),
                FieldMapping::Compute(func) => func(source),
            };
            if ignore_none && value == Value::Null {
                continue;
            }
            self.set(field.as_str(), value)?;
        }
        Ok(())
    }

    /// Renders `template` with this entry as context.
    pub fn render(
        &mut self,
        renderer: &dyn TemplateRenderer,
        template: &str,
        native: bool,
    ) -> Result<Rendered, RenderError> {
        trace!("rendering: {template}");
        renderer.render(template, self, native)
    }
}
