//! Entry envelope: resolved fields plus still-pending lazy lookups.

use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::{
    entry::Entry,
    error::{CodecError, CodecResult},
    lazy::{LazyAttachment, LazyRegistry},
    value::ValueMap,
};

use super::value::SerializerRegistry;

/// Version of the [`EntryData`] layout written by this build.
pub const ENTRY_FORMAT_VERSION: u16 = 1;

/// Serialized lazy attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LazyLookupData {
    /// Registered lazy function id.
    pub func_id: String,
    /// Fields the function fills.
    pub fields: Vec<String>,
    /// Serialized positional arguments.
    #[serde(default)]
    pub args: Vec<Json>,
    /// Serialized keyword arguments.
    #[serde(default)]
    pub kwargs: IndexMap<String, Json>,
}

/// Serialized entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntryData {
    /// Resolved fields as serializer node trees.
    pub fields: IndexMap<String, Json>,
    /// Lazy lookups that had not run yet.
    #[serde(default)]
    pub lazy_lookups: Vec<LazyLookupData>,
}

/// Versioned wrapper used for byte encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryEnvelope {
    /// Layout version of `entry`.
    pub format_version: u16,
    /// The serialized entry.
    pub entry: EntryData,
}

impl EntryEnvelope {
    /// Wraps `entry` with [`ENTRY_FORMAT_VERSION`].
    pub fn new(entry: EntryData) -> Self {
        Self {
            format_version: ENTRY_FORMAT_VERSION,
            entry,
        }
    }
}

/// Codec settings.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Keys starting with this prefix are internal and never serialized.
    pub internal_prefix: String,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            internal_prefix: "_".to_string(),
        }
    }
}

/// Converts entries to and from [`EntryData`].
#[derive(Clone)]
pub struct EntryCodec {
    registry: Arc<LazyRegistry>,
    serializers: SerializerRegistry,
    config: CodecConfig,
}

impl EntryCodec {
    /// Codec with stock serializers and default config. Deserialized entries
    /// resolve lazy fields through `registry`.
    pub fn new(registry: Arc<LazyRegistry>) -> Self {
        Self {
            registry,
            serializers: SerializerRegistry::with_defaults(),
            config: CodecConfig::default(),
        }
    }

    /// Replaces the value serializers.
    pub fn with_serializers(mut self, serializers: SerializerRegistry) -> Self {
        self.serializers = serializers;
        self
    }

    /// Replaces the config.
    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    /// Value serializers in use.
    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    /// Serializes resolved, non-internal fields and pending lazy lookups.
    ///
    /// Fields without a serializer are dropped and logged; they never abort
    /// the entry. Pending fields are not computed.
    pub fn serialize(&self, entry: &Entry) -> EntryData {
        let prefix = self.config.internal_prefix.as_str();
        let mut fields = IndexMap::new();
        for (key, value) in entry.iter() {
            if !prefix.is_empty() && key.starts_with(prefix) {
                continue;
            }
            match self.serializers.serialize(value) {
                Ok(node) => {
                    fields.insert(key.to_string(), node);
                }
                Err(err) => debug!("field {key} was not serializable. {err}"),
            }
        }

        let lazy_lookups = entry
            .lazy_attachments()
            .iter()
            .filter_map(|attachment| match self.serialize_attachment(entry, attachment) {
                Ok(data) => Some(data),
                Err(err) => {
                    warn!(
                        "lazy lookup `{}` dropped from {}: {err}",
                        attachment.func_id,
                        entry.safe_str()
                    );
                    None
                }
            })
            .collect();

        EntryData {
            fields,
            lazy_lookups,
        }
    }

    fn serialize_attachment(&self, entry: &Entry, attachment: &LazyAttachment) -> CodecResult<LazyLookupData> {
        let args = attachment
            .args
            .iter()
            .map(|v| self.serializers.serialize(v))
            .collect::<CodecResult<Vec<_>>>()?;
        let mut kwargs = IndexMap::new();
        for (k, v) in &attachment.kwargs {
            kwargs.insert(k.clone(), self.serializers.serialize(v)?);
        }
        Ok(LazyLookupData {
            func_id: attachment.func_id.clone(),
            // Fields removed or set since attaching are not re-armed on load.
            fields: attachment
                .fields
                .iter()
                .filter(|f| entry.is_lazy(f.as_str()))
                .cloned()
                .collect(),
            args,
            kwargs,
        })
    }

    /// Rebuilds an entry written with layout `version`.
    ///
    /// Fields are replayed through [`Entry::set`], then lazy lookups are
    /// re-attached without running.
    pub fn deserialize(&self, data: &EntryData, version: u16) -> CodecResult<Entry> {
        if version != ENTRY_FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let mut entry = Entry::with_registry(self.registry.clone());
        for (key, node) in &data.fields {
            let value = self.serializers.deserialize(node)?;
            entry.set(key.as_str(), value)?;
        }

        for lookup in &data.lazy_lookups {
            let args = lookup
                .args
                .iter()
                .map(|node| self.serializers.deserialize(node))
                .collect::<CodecResult<Vec<_>>>()?;
            let mut kwargs = ValueMap::new();
            for (k, node) in &lookup.kwargs {
                kwargs.insert(k.clone(), self.serializers.deserialize(node)?);
            }
            entry.attach(lookup.func_id.as_str(), lookup.fields.iter().cloned(), args, kwargs)?;
        }
        Ok(entry)
    }

    /// Encodes `entry` as a versioned JSON envelope.
    pub fn to_json(&self, entry: &Entry) -> CodecResult<Vec<u8>> {
        Ok(serde_json::to_vec(&EntryEnvelope::new(self.serialize(entry)))?)
    }

    /// Decodes bytes written by [`EntryCodec::to_json`].
    pub fn from_json(&self, payload: &[u8]) -> CodecResult<Entry> {
        if let Ok(envelope) = serde_json::from_slice::<EntryEnvelope>(payload) {
            return self.deserialize(&envelope.entry, envelope.format_version);
        }

        // Bare entry data without the version wrapper reads as the current layout.
        let data: EntryData = serde_json::from_slice(payload)?;
        self.deserialize(&data, ENTRY_FORMAT_VERSION)
    }
}
