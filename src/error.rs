//! Error types for entries, the lazy registry, rendering and the codec.

/// Error raised by a plugin callback (hook or lazy function).
///
/// `Failed` is a plugin level failure: a lazy lookup that returns it is
/// logged and its fields read as absent. `Entry` carries a broken entry
/// invariant hit inside the callback and always reaches the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PluginError {
    /// The plugin could not do its work.
    #[error("{0}")]
    Failed(String),

    /// The callback violated an entry rule, e.g. assigned raw bytes.
    #[error(transparent)]
    Entry(Box<EntryError>),
}

impl PluginError {
    /// Builds a plugin level failure from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// The entry error, when the callback broke an entry rule.
    pub fn entry_error(&self) -> Option<&EntryError> {
        match self {
            Self::Failed(_) => None,
            Self::Entry(err) => Some(err),
        }
    }
}

impl From<EntryError> for PluginError {
    fn from(value: EntryError) -> Self {
        Self::Entry(Box::new(value))
    }
}

/// Errors raised while populating the lazy function registry or attaching
/// lazy fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Two lazy functions share an id.
    #[error("the name {0} is already registered to another lazy function")]
    DuplicateRegistration(String),

    /// The function given to `attach` was never registered.
    #[error("lazy lookup function `{0}` is not registered")]
    UnregisteredLazyFunction(String),
}

/// Errors raised by entry operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntryError {
    /// Raw bytes were assigned to a field.
    #[error("entry strings must be unicode: {key} ({len} raw bytes)")]
    InvalidValue {
        /// Field being assigned.
        key: String,
        /// Length of the refused byte sequence.
        len: usize,
    },

    /// `title` or `url` was assigned something other than text.
    #[error("tried to set {key} to a {kind} value")]
    InvalidField {
        /// Field being assigned.
        key: String,
        /// Kind of the refused value.
        kind: &'static str,
    },

    /// Unknown trace operation.
    #[error("unknown operation {0}")]
    InvalidOperation(String),

    /// Unknown hook action.
    #[error("`{0}` is not a valid entry action")]
    InvalidAction(String),

    /// A bound lazy method has no live plugin instance to run on.
    #[error("lazy function `{func_id}` could not be bound to plugin class `{class}`")]
    UnboundLazyFunction {
        /// Registered id of the function.
        func_id: String,
        /// Owning plugin class name.
        class: String,
    },

    /// Lazy registration or attachment failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A lifecycle hook failed; later hooks for the same action were skipped.
    #[error("{action} hook failed: {source}")]
    Hook {
        /// Action whose hooks were running.
        action: &'static str,
        /// Error returned by the hook.
        source: PluginError,
    },
}

/// Errors raised by template rendering.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    /// The template itself is unusable.
    #[error("invalid template: {0}")]
    Template(String),

    /// The renderer failed while evaluating the template.
    #[error("render failed: {0}")]
    Render(String),

    /// Resolving a lazy field used by the template failed.
    #[error(transparent)]
    Entry(#[from] EntryError),
}

/// Errors raised by the serialization codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// No serializer knows the value.
    #[error("value of kind `{0}` is not serializable")]
    NotSerializable(String),

    /// The payload names a serializer that is not registered.
    #[error("unknown serializer `{0}`")]
    UnknownSerializer(String),

    /// The payload does not match what its serializer expects.
    #[error("malformed `{serializer}` payload: {reason}")]
    Malformed {
        /// Serializer that rejected the payload.
        serializer: String,
        /// What was wrong.
        reason: String,
    },

    /// Format version not understood by this build.
    #[error("unsupported entry format version: {0}")]
    UnsupportedVersion(u16),

    /// Rebuilding the entry failed.
    #[error(transparent)]
    Entry(#[from] EntryError),

    /// JSON encoding or decoding failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<RegistryError> for CodecError {
    fn from(value: RegistryError) -> Self {
        Self::Entry(EntryError::Registry(value))
    }
}

/// Result alias for entry operations.
pub type EntryResult<T> = Result<T, EntryError>;
/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
