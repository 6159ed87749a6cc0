//! Pipeline entries with lazy fields, an accept/reject/fail lifecycle,
//! snapshots and a stable serialized form.
//!
//! # Examples
//!
//! Lifecycle of an [`entry::Entry`]:
//! ```
//! use entryflow::{entry::Entry, types::{EntryState, Transition}};
//!
//! let mut entry = Entry::with_title_url("Show S01E01", "http://x/1");
//! assert_eq!(entry.accept(Some("matched")).expect("accept"), Transition::Applied);
//! assert_eq!(entry.reject(Some("dup")).expect("reject"), Transition::Suppressed);
//! assert_eq!(entry.state(), EntryState::Accepted);
//! ```
//!
//! Lazy fields and a serialization round trip:
//! ```
//! use entryflow::{
//!     codec::{EntryCodec, ENTRY_FORMAT_VERSION},
//!     entry::Entry,
//!     lazy::LazyRegistryBuilder,
//!     value::{Value, ValueMap},
//! };
//!
//! let mut builder = LazyRegistryBuilder::new();
//! builder
//!     .register_fn("probe_size", |entry, _| {
//!         entry.set("size", 700)?;
//!         Ok(())
//!     })
//!     .expect("register");
//! let registry = builder.build();
//!
//! let mut entry = Entry::with_registry(registry.clone());
//! entry.set("title", "Show S01E01").expect("title");
//! entry.set("url", "http://x/1").expect("url");
//! entry.attach("probe_size", ["size"], vec![], ValueMap::new()).expect("attach");
//! assert!(!entry.contains_key("size"));
//!
//! let codec = EntryCodec::new(registry);
//! let data = codec.serialize(&entry);
//! let mut restored = codec.deserialize(&data, ENTRY_FORMAT_VERSION).expect("deserialize");
//! assert_eq!(restored, entry);
//! assert_eq!(restored.get("size").expect("resolve"), Some(&Value::Int(700)));
//! ```
#![warn(missing_docs)]

/// Entry serialization.
pub mod codec;
/// Ordered field storage underneath entries.
pub mod core;
/// The entry record and its lifecycle.
pub mod entry;
/// Error types.
pub mod error;
/// Lazy field attachments and the lazy function registry.
pub mod lazy;
/// Shared enums and well-known keys.
pub mod types;
/// Field value model.
pub mod value;
