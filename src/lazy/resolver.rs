//! Attaching lazy fields to an entry and resolving them on first access.

use log::{debug, trace, warn};

use crate::{
    entry::Entry,
    error::{EntryResult, PluginError},
    value::{Value, ValueMap},
};

use super::{
    attachment::LazyAttachment,
    registry::{LazyCall, LazyFuncRef},
};

impl Entry {
    /// Attaches lazy `fields` backed by a registered function.
    ///
    /// Fields that already hold a value keep it. The function runs the first
    /// time one of the remaining fields is read through [`Entry::get`].
    pub fn attach<I, S>(
        &mut self,
        func: impl Into<LazyFuncRef>,
        fields: I,
        args: Vec<Value>,
        kwargs: ValueMap,
    ) -> EntryResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let func_id = self.registry.resolve_ref(&func.into())?;
        let attachment = LazyAttachment::new(func_id, fields, args, kwargs);

        for field in &attachment.fields {
            self.fields.insert_pending(field);
        }

        if attachment.fields.iter().any(|f| self.fields.is_pending(f)) {
            trace!(
                "lazy fields {:?} attached to `{}`",
                attachment.fields,
                attachment.func_id
            );
            self.lazy.push(attachment);
        } else {
            debug!(
                "lazy lookup `{}` skipped, all of {:?} already set",
                attachment.func_id, attachment.fields
            );
        }
        Ok(())
    }

    /// Reads `key`, running pending lazy lookups that cover it.
    ///
    /// Returns `Ok(None)` when the key is absent, including when the lookup
    /// ran without setting it or failed with [`PluginError::Failed`]. An entry
    /// rule broken inside the lookup is returned as the error.
    pub fn get(&mut self, key: &str) -> EntryResult<Option<&Value>> {
        self.resolve_key(key)?;
        Ok(self.fields.get(key))
    }

    /// Resolves every pending field.
    pub fn resolve_all(&mut self) -> EntryResult<()> {
        let pending: Vec<String> = self.fields.pending_keys().map(str::to_string).collect();
        for key in pending {
            self.resolve_key(&key)?;
        }
        Ok(())
    }

    /// True when `key` waits on a lazy lookup.
    pub fn is_lazy(&self, key: &str) -> bool {
        self.fields.is_pending(key)
    }

    /// Attachments that have not run yet.
    pub fn lazy_attachments(&self) -> &[LazyAttachment] {
        self.lazy.as_slice()
    }

    fn resolve_key(&mut self, key: &str) -> EntryResult<()> {
        while self.fields.is_pending(key) {
            let Some((idx, attachment)) = self.lazy.take_covering(key) else {
                break;
            };

            let bound = match self.registry.bind(&attachment.func_id) {
                Ok(bound) => bound,
                Err(err) => {
                    self.lazy.restore(idx, attachment);
                    return Err(err);
                }
            };

            trace!("resolving `{key}` through `{}`", attachment.func_id);
            let call = LazyCall {
                args: &attachment.args,
                kwargs: &attachment.kwargs,
            };
            let broken = match bound.call(self, &call) {
                Ok(()) => None,
                Err(PluginError::Entry(err)) => Some(*err),
                Err(err) => {
                    warn!(
                        "lazy lookup `{}` failed for {}: {err}",
                        attachment.func_id,
                        self.display_title()
                    );
                    None
                }
            };

            for field in &attachment.fields {
                if !self.lazy.covers(field) {
                    self.fields.clear_pending(field);
                }
            }
            self.prune_attachments();

            if let Some(err) = broken {
                return Err(err);
            }
        }

        // A placeholder nobody promises to fill reads as absent.
        self.fields.clear_pending(key);
        Ok(())
    }

    /// Drops attachments with no pending field left.
    pub(crate) fn prune_attachments(&mut self) {
        let fields = &self.fields;
        self.lazy
            .retain(|a| a.fields.iter().any(|f| fields.is_pending(f)));
    }
}
