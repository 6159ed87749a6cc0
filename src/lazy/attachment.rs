use crate::value::{Value, ValueMap};

/// Promise that calling `func_id` with `args`/`kwargs` fills `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct LazyAttachment {
    /// Registered lazy function id.
    pub func_id: String,
    /// Fields the function is expected to set, without duplicates.
    pub fields: Vec<String>,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Keyword arguments.
    pub kwargs: ValueMap,
}

impl LazyAttachment {
    /// Builds an attachment, dropping repeated field names.
    pub fn new<I, S>(func_id: impl Into<String>, fields: I, args: Vec<Value>, kwargs: ValueMap) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        Self {
            func_id: func_id.into(),
            fields: unique,
            args,
            kwargs,
        }
    }

    /// True when `key` is one of the promised fields.
    pub fn covers(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f == key)
    }
}

/// Attachments not yet invoked, in attach order.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingLazy {
    attachments: Vec<LazyAttachment>,
}

impl PendingLazy {
    pub(crate) fn push(&mut self, attachment: LazyAttachment) {
        self.attachments.push(attachment);
    }

    pub(crate) fn covers(&self, key: &str) -> bool {
        self.attachments.iter().any(|a| a.covers(key))
    }

    /// Removes the first attachment covering `key`.
    pub(crate) fn take_covering(&mut self, key: &str) -> Option<(usize, LazyAttachment)> {
        let idx = self.attachments.iter().position(|a| a.covers(key))?;
        Some((idx, self.attachments.remove(idx)))
    }

    /// Puts an attachment back where [`Self::take_covering`] found it.
    pub(crate) fn restore(&mut self, idx: usize, attachment: LazyAttachment) {
        let idx = idx.min(self.attachments.len());
        self.attachments.insert(idx, attachment);
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&LazyAttachment) -> bool) {
        self.attachments.retain(keep);
    }

    pub(crate) fn as_slice(&self) -> &[LazyAttachment] {
        &self.attachments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_deduplicated_in_order() {
        let a = LazyAttachment::new("f", ["b", "a", "b"], vec![], ValueMap::new());
        assert_eq!(a.fields, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn take_and_restore_keep_order() {
        let mut pending = PendingLazy::default();
        pending.push(LazyAttachment::new("one", ["x"], vec![], ValueMap::new()));
        pending.push(LazyAttachment::new("two", ["y"], vec![], ValueMap::new()));

        let (idx, taken) = pending.take_covering("x").unwrap();
        assert_eq!((idx, taken.func_id.as_str()), (0, "one"));
        assert!(!pending.covers("x"));

        pending.restore(idx, taken);
        let ids: Vec<_> = pending.as_slice().iter().map(|a| a.func_id.as_str()).collect();
        assert_eq!(ids, vec!["one", "two"]);
    }
}
