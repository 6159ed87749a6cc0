use indexmap::{map::Entry as MapEntry, IndexMap};

use crate::value::Value;

/// Content of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Computed value.
    Resolved(Value),
    /// Placeholder waiting on a lazy lookup.
    Pending,
}

/// Insertion-ordered key/value storage with lazy placeholders.
///
/// The store knows nothing about entry rules; [`crate::entry::Entry`] wraps it
/// and funnels every assignment through its enforcement path.
#[derive(Debug, Clone, Default)]
pub struct FieldStore {
    slots: IndexMap<String, Slot>,
}

impl FieldStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a resolved value, replacing a placeholder in place. Returns the
    /// previous resolved value.
    pub fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        match self.slots.insert(key, Slot::Resolved(value)) {
            Some(Slot::Resolved(old)) => Some(old),
            _ => None,
        }
    }

    /// Marks `key` pending unless a slot already exists. Returns true when a
    /// placeholder was created.
    pub fn insert_pending(&mut self, key: &str) -> bool {
        match self.slots.entry(key.to_string()) {
            MapEntry::Occupied(_) => false,
            MapEntry::Vacant(v) => {
                v.insert(Slot::Pending);
                true
            }
        }
    }

    /// Resolved value of `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.slots.get(key) {
            Some(Slot::Resolved(v)) => Some(v),
            _ => None,
        }
    }

    /// Mutable resolved value of `key`.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self.slots.get_mut(key) {
            Some(Slot::Resolved(v)) => Some(v),
            _ => None,
        }
    }

    /// True when `key` is resolved or pending.
    pub fn has_slot(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// True when `key` holds a value.
    pub fn is_resolved(&self, key: &str) -> bool {
        matches!(self.slots.get(key), Some(Slot::Resolved(_)))
    }

    /// True when `key` is a placeholder.
    pub fn is_pending(&self, key: &str) -> bool {
        matches!(self.slots.get(key), Some(Slot::Pending))
    }

    /// Drops a placeholder. Resolved values are left alone.
    pub fn clear_pending(&mut self, key: &str) -> bool {
        if self.is_pending(key) {
            self.slots.shift_remove(key);
            return true;
        }
        false
    }

    /// Removes `key`, keeping the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<Slot> {
        self.slots.shift_remove(key)
    }

    /// Resolved fields in insertion order.
    pub fn resolved(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.slots.iter().filter_map(|(k, slot)| match slot {
            Slot::Resolved(v) => Some((k.as_str(), v)),
            Slot::Pending => None,
        })
    }

    /// Placeholder keys in insertion order.
    pub fn pending_keys(&self) -> impl Iterator<Item = &str> {
        self.slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Pending))
            .map(|(k, _)| k.as_str())
    }

    /// Number of resolved fields.
    pub fn resolved_len(&self) -> usize {
        self.resolved().count()
    }

    /// Number of placeholders.
    pub fn pending_len(&self) -> usize {
        self.pending_keys().count()
    }
}
