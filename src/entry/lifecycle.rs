//! Accept / reject / fail state machine, trace log and lifecycle hooks.
//!
//! Hooks run synchronously, in registration order, after the state change
//! and its trace entry are committed. The first hook error stops the run and
//! is returned to the caller; hooks registered after it do not run for that
//! transition.

use std::{fmt, sync::Arc};

use log::{debug, error, info};

use crate::{
    error::{EntryError, EntryResult, PluginError},
    types::{EntryState, HookAction, Operation, Transition, IMMORTAL},
    value::{Value, ValueMap},
};

use super::record::Entry;

/// One trace line explaining what a plugin did (or declined to do).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    /// Plugin that produced the line.
    pub source: Option<String>,
    /// Decision attached to the line.
    pub operation: Option<Operation>,
    /// Free form message.
    pub message: Option<String>,
}

/// Arguments handed to a lifecycle hook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookArgs {
    /// Reason given to the transition.
    pub reason: Option<String>,
    /// Bound keyword arguments overlaid with the caller's extras.
    pub kwargs: ValueMap,
}

impl HookArgs {
    /// Keyword argument named `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }
}

type HookFn = dyn Fn(&mut Entry, &HookArgs) -> Result<(), PluginError> + Send + Sync;

#[derive(Clone)]
pub(crate) struct Hook {
    func: Arc<HookFn>,
    bound: ValueMap,
}

#[derive(Clone, Default)]
pub(crate) struct HookTable {
    hooks: [Vec<Hook>; 4],
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for action in HookAction::ALL {
            map.entry(&action.as_str(), &self.hooks[action.index()].len());
        }
        map.finish()
    }
}

impl Entry {
    /// Appends a trace line unless an identical one exists.
    ///
    /// `operation` must be `None` or one of `accept`, `reject`, `fail`.
    /// `source` defaults to the current plugin context.
    pub fn trace(
        &mut self,
        message: Option<&str>,
        operation: Option<&str>,
        source: Option<&str>,
    ) -> EntryResult<()> {
        let operation = operation.map(str::parse::<Operation>).transpose()?;
        self.trace_op(message, operation, source);
        Ok(())
    }

    /// Typed form of [`Entry::trace`].
    pub fn trace_op(&mut self, message: Option<&str>, operation: Option<Operation>, source: Option<&str>) {
        let item = Trace {
            source: source.map(str::to_string).or_else(|| self.plugin_context.clone()),
            operation,
            message: message.map(str::to_string),
        };
        if !self.traces.contains(&item) {
            self.traces.push(item);
        }
    }

    /// Trace log in insertion order.
    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Registers `hook` for `action`, with `bound` keyword arguments passed on
    /// every call.
    pub fn add_hook<F>(&mut self, action: HookAction, bound: ValueMap, hook: F)
    where
        F: Fn(&mut Entry, &HookArgs) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        self.hooks.hooks[action.index()].push(Hook {
            func: Arc::new(hook),
            bound,
        });
    }

    /// [`Entry::add_hook`] with the action given by name.
    pub fn add_hook_named<F>(&mut self, action: &str, bound: ValueMap, hook: F) -> EntryResult<()>
    where
        F: Fn(&mut Entry, &HookArgs) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        let action = action.parse::<HookAction>()?;
        self.add_hook(action, bound, hook);
        Ok(())
    }

    /// Runs `hook` when the entry is accepted.
    pub fn on_accept<F>(&mut self, hook: F)
    where
        F: Fn(&mut Entry, &HookArgs) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        self.add_hook(HookAction::Accept, ValueMap::new(), hook);
    }

    /// Runs `hook` when the entry is rejected.
    pub fn on_reject<F>(&mut self, hook: F)
    where
        F: Fn(&mut Entry, &HookArgs) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        self.add_hook(HookAction::Reject, ValueMap::new(), hook);
    }

    /// Runs `hook` when the entry is failed.
    pub fn on_fail<F>(&mut self, hook: F)
    where
        F: Fn(&mut Entry, &HookArgs) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        self.add_hook(HookAction::Fail, ValueMap::new(), hook);
    }

    /// Runs `hook` when the task finishes with the entry.
    pub fn on_complete<F>(&mut self, hook: F)
    where
        F: Fn(&mut Entry, &HookArgs) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        self.add_hook(HookAction::Complete, ValueMap::new(), hook);
    }

    /// Number of hooks registered for `action`.
    pub fn hook_count(&self, action: HookAction) -> usize {
        self.hooks.hooks[action.index()].len()
    }

    /// Runs the hooks of `action` in registration order.
    pub fn run_hooks(&mut self, action: HookAction, reason: Option<&str>, extra: &ValueMap) -> EntryResult<()> {
        let hooks = self.hooks.hooks[action.index()].clone();
        for hook in hooks {
            let mut kwargs = hook.bound.clone();
            for (k, v) in extra {
                kwargs.insert(k.clone(), v.clone());
            }
            let args = HookArgs {
                reason: reason.map(str::to_string),
                kwargs,
            };
            (hook.func)(self, &args).map_err(|source| EntryError::Hook {
                action: action.as_str(),
                source,
            })?;
        }
        Ok(())
    }

    /// Accepts the entry. A rejected entry stays rejected; a failed one may
    /// be accepted again.
    pub fn accept(&mut self, reason: Option<&str>) -> EntryResult<Transition> {
        self.accept_with(reason, &ValueMap::new())
    }

    /// Accepts the entry, passing `extra` to the accept hooks.
    pub fn accept_with(&mut self, reason: Option<&str>, extra: &ValueMap) -> EntryResult<Transition> {
        match self.state {
            EntryState::Accepted => Ok(Transition::AlreadyInState),
            EntryState::Rejected => {
                debug!("tried to accept rejected {}", self);
                Ok(Transition::Suppressed)
            }
            EntryState::Undecided | EntryState::Failed => {
                self.state = EntryState::Accepted;
                self.trace_op(reason, Some(Operation::Accept), None);
                self.run_hooks(HookAction::Accept, reason, extra)?;
                Ok(Transition::Applied)
            }
        }
    }

    /// Rejects the entry. Immortal entries only record the attempt and an
    /// accepted entry stays accepted.
    pub fn reject(&mut self, reason: Option<&str>) -> EntryResult<Transition> {
        self.reject_with(reason, &ValueMap::new())
    }

    /// Rejects the entry, passing `extra` to the reject hooks.
    pub fn reject_with(&mut self, reason: Option<&str>, extra: &ValueMap) -> EntryResult<Transition> {
        if self.get(IMMORTAL)?.is_some_and(Value::is_truthy) {
            let message = match reason {
                Some(r) => format!("Tried to reject immortal ({r})"),
                None => "Tried to reject immortal".to_string(),
            };
            info!("{message}: {}", self.display_title());
            self.trace_op(Some(message.as_str()), None, None);
            return Ok(Transition::Suppressed);
        }

        match self.state {
            EntryState::Rejected => Ok(Transition::AlreadyInState),
            EntryState::Accepted => {
                debug!("tried to reject accepted {}", self);
                Ok(Transition::Suppressed)
            }
            EntryState::Undecided | EntryState::Failed => {
                self.state = EntryState::Rejected;
                self.trace_op(reason, Some(Operation::Reject), None);
                self.run_hooks(HookAction::Reject, reason, extra)?;
                Ok(Transition::Applied)
            }
        }
    }

    /// Marks the entry failed, whatever the previous decision.
    pub fn fail(&mut self, reason: Option<&str>) -> EntryResult<Transition> {
        self.fail_with(reason, &ValueMap::new())
    }

    /// Fails the entry, passing `extra` to the fail hooks.
    pub fn fail_with(&mut self, reason: Option<&str>, extra: &ValueMap) -> EntryResult<Transition> {
        debug!("Marking entry '{}' as failed", self.display_title());
        if self.state == EntryState::Failed {
            return Ok(Transition::AlreadyInState);
        }
        self.state = EntryState::Failed;
        self.trace_op(reason, Some(Operation::Fail), None);
        error!("Failed {} ({})", self.display_title(), reason.unwrap_or_default());
        self.run_hooks(HookAction::Fail, reason, extra)?;
        Ok(Transition::Applied)
    }

    /// Runs the complete hooks. Call once, when the task is done with the entry.
    pub fn complete(&mut self, extra: &ValueMap) -> EntryResult<()> {
        self.run_hooks(HookAction::Complete, None, extra)
    }
}
