//! The entry record: field enforcement, lifecycle, snapshots and field maps.

/// Field population from source items and template rendering.
pub mod field_map;
/// Lifecycle state machine, traces and hooks.
pub mod lifecycle;
mod record;
mod snapshot;

pub use field_map::{lookup_path, FieldMapping, FieldSource, Rendered, TemplateRenderer};
pub use lifecycle::{HookArgs, Trace};
pub use record::Entry;
