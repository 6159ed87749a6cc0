//! Serialization of entries and their field values.

/// Entry envelope encoding.
pub mod entry;
/// Recursive value serializer and extensions.
pub mod value;

pub use entry::{CodecConfig, EntryCodec, EntryData, EntryEnvelope, LazyLookupData, ENTRY_FORMAT_VERSION};
pub use value::{DateTimeSerializer, SerializerRegistry, ValueSerializer};
