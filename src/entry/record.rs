use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use hashbrown::HashMap;
use log::trace;

use crate::{
    core::store::{FieldStore, Slot},
    error::{EntryError, EntryResult},
    lazy::{attachment::PendingLazy, LazyRegistry},
    types::{EntryState, ORIGINAL_TITLE, ORIGINAL_URL, TITLE, URL},
    value::{Value, ValueMap},
};

use super::lifecycle::{HookTable, Trace};

/// One item flowing through a task pipeline.
///
/// An entry is an ordered field mapping that must eventually carry text
/// `title` and `url` fields. The first title and url ever assigned are kept
/// as `original_title` and `original_url`; equality and hashing use those,
/// so an entry stays the same logical item after plugins rewrite it.
///
/// Every assignment goes through [`Entry::set`], which refuses raw bytes and
/// non-text titles/urls and flattens rich strings to plain text.
#[derive(Clone)]
pub struct Entry {
    pub(crate) fields: FieldStore,
    pub(crate) lazy: PendingLazy,
    pub(crate) registry: Arc<LazyRegistry>,
    pub(crate) state: EntryState,
    pub(crate) traces: Vec<Trace>,
    pub(crate) snapshots: HashMap<String, ValueMap>,
    pub(crate) hooks: HookTable,
    pub(crate) plugin_context: Option<String>,
}

impl Default for Entry {
    fn default() -> Self {
        Self::with_registry(LazyRegistry::empty())
    }
}

impl Entry {
    /// Empty entry with no lazy functions available.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty entry resolving lazy fields through `registry`.
    pub fn with_registry(registry: Arc<LazyRegistry>) -> Self {
        Self {
            fields: FieldStore::new(),
            lazy: PendingLazy::default(),
            registry,
            state: EntryState::Undecided,
            traces: Vec::new(),
            snapshots: HashMap::new(),
            hooks: HookTable::default(),
            plugin_context: None,
        }
    }

    /// Entry seeded with a title and url.
    pub fn with_title_url(title: impl Into<String>, url: impl Into<String>) -> Self {
        let mut entry = Self::new();
        entry.assign(TITLE.to_string(), Value::Str(title.into()));
        entry.assign(URL.to_string(), Value::Str(url.into()));
        entry
    }

    /// Builds an entry from `(key, value)` pairs, enforcing [`Entry::set`]
    /// rules on each.
    pub fn from_fields<I, K, V>(fields: I) -> EntryResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut entry = Self::new();
        entry.update(fields)?;
        Ok(entry)
    }

    /// Registry used to resolve lazy fields.
    pub fn registry(&self) -> &Arc<LazyRegistry> {
        &self.registry
    }

    /// Switches the registry used by later `attach` and `get` calls.
    ///
    /// Pending attachments keep their function ids and are bound against the
    /// new registry when they resolve.
    pub fn set_registry(&mut self, registry: Arc<LazyRegistry>) {
        self.registry = registry;
    }

    /// Builder form of [`Entry::set_registry`].
    pub fn in_registry(mut self, registry: Arc<LazyRegistry>) -> Self {
        self.set_registry(registry);
        self
    }

    /// Assigns a field.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> EntryResult<()> {
        let key = key.into();
        let value = match value.into() {
            Value::Bytes(bytes) => {
                return Err(EntryError::InvalidValue {
                    key,
                    len: bytes.len(),
                });
            }
            Value::Rich(rich) => Value::Str(rich.text),
            other => other,
        };

        if (key == URL || key == TITLE) && !value.is_str() {
            return Err(EntryError::InvalidField {
                key,
                kind: value.kind(),
            });
        }

        self.assign(key, value);
        Ok(())
    }

    /// Assigns every pair through [`Entry::set`], stopping at the first error.
    pub fn update<I, K, V>(&mut self, fields: I) -> EntryResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in fields {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn assign(&mut self, key: String, value: Value) {
        let provenance = match key.as_str() {
            URL => Some(ORIGINAL_URL),
            TITLE => Some(ORIGINAL_TITLE),
            _ => None,
        };
        if let Some(original) = provenance {
            if !self.fields.has_slot(original) {
                self.fields.insert(original.to_string(), value.clone());
            }
        }

        trace!("ENTRY SET: {key} = {value:?}");
        self.fields.insert(key, value);
    }

    /// Resolved value of `key`. Never runs lazy lookups.
    pub fn peek(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Mutable access to a resolved value.
    ///
    /// Changes made through this reference skip the [`Entry::set`] checks, so
    /// it refuses `title` and `url`.
    pub fn peek_mut(&mut self, key: &str) -> Option<&mut Value> {
        if key == TITLE || key == URL {
            return None;
        }
        self.fields.get_mut(key)
    }

    /// True when `key` holds a resolved value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.is_resolved(key)
    }

    /// Removes a field, resolved or pending.
    ///
    /// Removing a pending field also drops lazy lookups left with nothing to
    /// fill.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.fields.remove(key);
        self.prune_attachments();
        match removed {
            Some(Slot::Resolved(value)) => Some(value),
            _ => None,
        }
    }

    /// Resolved keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.resolved().map(|(k, _)| k)
    }

    /// Resolved fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.resolved()
    }

    /// Number of resolved fields.
    pub fn len(&self) -> usize {
        self.fields.resolved_len()
    }

    /// True when no field is resolved.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolved text title.
    pub fn title(&self) -> Option<&str> {
        self.peek(TITLE).and_then(Value::as_str)
    }

    /// Resolved text url.
    pub fn url(&self) -> Option<&str> {
        self.peek(URL).and_then(Value::as_str)
    }

    /// True when both `title` and `url` are resolved text.
    pub fn is_valid(&self) -> bool {
        self.title().is_some() && self.url().is_some()
    }

    /// `"title | url"` for log lines.
    pub fn safe_str(&self) -> String {
        format!(
            "{} | {}",
            self.title().unwrap_or_default(),
            self.url().unwrap_or_default()
        )
    }

    pub(crate) fn display_title(&self) -> &str {
        self.title().unwrap_or("<untitled>")
    }

    fn provenance(&self, key: &str) -> &str {
        self.peek(key).and_then(Value::as_str).unwrap_or_default()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EntryState {
        self.state
    }

    /// True once accepted.
    pub fn is_accepted(&self) -> bool {
        self.state == EntryState::Accepted
    }

    /// True once rejected.
    pub fn is_rejected(&self) -> bool {
        self.state == EntryState::Rejected
    }

    /// True once failed.
    pub fn is_failed(&self) -> bool {
        self.state == EntryState::Failed
    }

    /// True until some plugin decides.
    pub fn is_undecided(&self) -> bool {
        self.state == EntryState::Undecided
    }

    /// Names the plugin currently working on the entry. Used as the default
    /// trace source.
    pub fn set_plugin_context(&mut self, plugin: Option<&str>) {
        self.plugin_context = plugin.map(str::to_string);
    }

    /// Plugin currently working on the entry.
    pub fn plugin_context(&self) -> Option<&str> {
        self.plugin_context.as_deref()
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.provenance(ORIGINAL_TITLE) == other.provenance(ORIGINAL_TITLE)
            && self.provenance(ORIGINAL_URL) == other.provenance(ORIGINAL_URL)
    }
}

impl Eq for Entry {}

impl Hash for Entry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut key = String::from(self.provenance(ORIGINAL_TITLE));
        key.push_str(self.provenance(ORIGINAL_URL));
        key.hash(state);
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Entry(title={},state={})>", self.display_title(), self.state)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("state", &self.state)
            .field("fields", &self.fields)
            .field("pending", &self.lazy.as_slice())
            .field("traces", &self.traces)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RichString;

    #[test]
    fn rich_strings_are_flattened() {
        let mut entry = Entry::new();
        entry.set("title", RichString::new("Show S01E01", "html")).unwrap();
        assert_eq!(entry.peek("title"), Some(&Value::from("Show S01E01")));
        assert_eq!(entry.peek("original_title"), Some(&Value::from("Show S01E01")));
    }

    #[test]
    fn peek_mut_refuses_guarded_fields() {
        let mut entry = Entry::with_title_url("a", "http://a");
        assert!(entry.peek_mut("title").is_none());
        entry.set("size", 10).unwrap();
        if let Some(Value::Int(size)) = entry.peek_mut("size") {
            *size += 1;
        }
        assert_eq!(entry.peek("size"), Some(&Value::Int(11)));
    }

    #[test]
    fn display_uses_title_and_state() {
        let entry = Entry::with_title_url("Show", "http://x/1");
        assert_eq!(entry.to_string(), "<Entry(title=Show,state=undecided)>");
        assert_eq!(entry.safe_str(), "Show | http://x/1");
    }
}
