//! Shared enums and well-known field keys.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::EntryError;

/// Field holding the entry title.
pub const TITLE: &str = "title";
/// Field holding the entry url.
pub const URL: &str = "url";
/// First title ever assigned to the entry.
pub const ORIGINAL_TITLE: &str = "original_title";
/// First url ever assigned to the entry.
pub const ORIGINAL_URL: &str = "original_url";
/// Truthy marker that makes an entry ignore rejections.
pub const IMMORTAL: &str = "immortal";

/// Lifecycle state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// No plugin has decided yet.
    #[default]
    Undecided,
    /// Accepted by a filter.
    Accepted,
    /// Rejected by a filter.
    Rejected,
    /// Processing of the entry failed.
    Failed,
}

impl EntryState {
    /// Lowercase name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undecided => "undecided",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    /// Terminal color name used when a state is rendered in console output.
    pub fn color(self) -> &'static str {
        match self {
            Self::Accepted => "green",
            Self::Rejected => "red",
            Self::Failed => "RED",
            Self::Undecided => "dim",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision recorded alongside a trace message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// The entry was accepted.
    Accept,
    /// The entry was rejected.
    Reject,
    /// The entry was failed.
    Fail,
}

impl Operation {
    /// Lowercase name of the operation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Fail => "fail",
        }
    }
}

impl FromStr for Operation {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            "fail" => Ok(Self::Fail),
            other => Err(EntryError::InvalidOperation(other.to_string())),
        }
    }
}

/// Lifecycle action a hook can be registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookAction {
    /// Runs after the entry becomes accepted.
    Accept,
    /// Runs after the entry becomes rejected.
    Reject,
    /// Runs after the entry becomes failed.
    Fail,
    /// Runs when the pipeline is done with the entry.
    Complete,
}

impl HookAction {
    /// All actions in table order.
    pub const ALL: [HookAction; 4] = [Self::Accept, Self::Reject, Self::Fail, Self::Complete];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Accept => 0,
            Self::Reject => 1,
            Self::Fail => 2,
            Self::Complete => 3,
        }
    }

    /// Lowercase name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Fail => "fail",
            Self::Complete => "complete",
        }
    }
}

impl FromStr for HookAction {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| EntryError::InvalidAction(s.to_string()))
    }
}

/// Outcome of a lifecycle transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State changed and hooks ran.
    Applied,
    /// The entry was already in the requested state.
    AlreadyInState,
    /// The request was refused (immortal entry or conflicting decision).
    Suppressed,
}

impl Transition {
    /// True when the state actually changed.
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}
