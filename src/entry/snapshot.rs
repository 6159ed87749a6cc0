use log::warn;

use crate::value::ValueMap;

use super::record::Entry;

impl Entry {
    /// Stores a deep copy of every resolved field under `name`.
    ///
    /// Fields that cannot be deep-copied are skipped with a warning. Nothing
    /// is stored if no field could be copied. Returns the number of fields
    /// captured.
    pub fn take_snapshot(&mut self, name: &str) -> usize {
        let mut snapshot = ValueMap::new();
        for (field, value) in self.fields.resolved() {
            match value.deep_copy() {
                Some(copy) => {
                    snapshot.insert(field.to_string(), copy);
                }
                None => warn!(
                    "Unable to take `{name}` snapshot for field `{field}` in `{}`",
                    self.display_title()
                ),
            }
        }

        if snapshot.is_empty() {
            return 0;
        }
        if self.snapshots.contains_key(name) {
            warn!(
                "Snapshot `{name}` is being overwritten for `{}`",
                self.display_title()
            );
        }
        let captured = snapshot.len();
        self.snapshots.insert(name.to_string(), snapshot);
        captured
    }

    /// Snapshot stored under `name`.
    pub fn snapshot(&self, name: &str) -> Option<&ValueMap> {
        self.snapshots.get(name)
    }

    /// Names of all stored snapshots, sorted.
    pub fn snapshot_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.snapshots.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
