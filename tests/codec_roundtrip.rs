use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use chrono::{TimeZone, Utc};

use entryflow::{
    codec::{CodecConfig, EntryCodec, EntryData, ENTRY_FORMAT_VERSION},
    entry::Entry,
    error::{CodecError, EntryError, RegistryError},
    lazy::{LazyRegistry, LazyRegistryBuilder},
    value::{CustomValue, DateTimeValue, DomainValue, Value, ValueMap},
};

fn lookup_registry(calls: Arc<AtomicUsize>) -> Arc<LazyRegistry> {
    let mut builder = LazyRegistryBuilder::new();
    builder
        .register_fn("probe_size", move |entry, call| {
            calls.fetch_add(1, Ordering::SeqCst);
            let scale = call.kwarg("scale").and_then(Value::as_int).unwrap_or(1);
            entry.set("size", 700 * scale)?;
            Ok(())
        })
        .unwrap();
    builder.build()
}

#[derive(Debug)]
struct Socket;

impl DomainValue for Socket {
    fn type_name(&self) -> &'static str {
        "socket"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[test]
fn round_trip_keeps_fields_identity_and_pending_lookups() {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = lookup_registry(calls.clone());
    let codec = EntryCodec::new(registry.clone());

    let mut entry = Entry::with_registry(registry);
    entry.set("title", "Show S01E01").unwrap();
    entry.set("url", "http://x/1").unwrap();
    let mut kwargs = ValueMap::new();
    kwargs.insert("scale".into(), Value::Int(2));
    entry.attach("probe_size", ["size"], vec![], kwargs).unwrap();

    let data = codec.serialize(&entry);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!data.fields.contains_key("size"));
    assert_eq!(data.lazy_lookups.len(), 1);
    assert_eq!(data.lazy_lookups[0].func_id, "probe_size");

    let mut restored = codec.deserialize(&data, ENTRY_FORMAT_VERSION).unwrap();
    assert_eq!(restored, entry);
    assert_eq!(restored.title(), Some("Show S01E01"));
    assert!(restored.is_lazy("size"));

    assert_eq!(restored.get("size").unwrap(), Some(&Value::Int(1400)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn resolved_lookups_are_not_carried() {
    let registry = lookup_registry(Arc::default());
    let codec = EntryCodec::new(registry.clone());

    let mut entry = Entry::with_registry(registry);
    entry.attach("probe_size", ["size"], vec![], ValueMap::new()).unwrap();
    entry.get("size").unwrap();

    let data = codec.serialize(&entry);
    assert!(data.lazy_lookups.is_empty());
    let restored = codec.deserialize(&data, ENTRY_FORMAT_VERSION).unwrap();
    assert_eq!(restored.peek("size"), Some(&Value::Int(700)));
}

#[test]
fn removed_lazy_field_stays_gone_after_round_trip() {
    let registry = lookup_registry(Arc::default());
    let codec = EntryCodec::new(registry.clone());

    let mut entry = Entry::with_title_url("a", "http://a").in_registry(registry);
    entry.attach("probe_size", ["size"], vec![], ValueMap::new()).unwrap();
    assert_eq!(entry.remove("size"), None);
    assert!(!entry.is_lazy("size"));
    assert!(entry.lazy_attachments().is_empty());

    let data = codec.serialize(&entry);
    assert!(data.lazy_lookups.is_empty());
    let mut restored = codec.deserialize(&data, ENTRY_FORMAT_VERSION).unwrap();
    assert!(!restored.is_lazy("size"));
    assert_eq!(restored.get("size").unwrap(), None);
}

#[test]
fn removing_one_field_keeps_lookup_for_the_rest() {
    let mut builder = LazyRegistryBuilder::new();
    builder
        .register_fn("imdb_lookup", |entry, _| {
            entry.set("imdb_id", "tt0944947")?;
            entry.set("imdb_score", 9.2)?;
            Ok(())
        })
        .unwrap();
    let registry = builder.build();
    let codec = EntryCodec::new(registry.clone());

    let mut entry = Entry::with_title_url("a", "http://a").in_registry(registry);
    entry
        .attach("imdb_lookup", ["imdb_id", "imdb_score"], vec![], ValueMap::new())
        .unwrap();
    entry.remove("imdb_id");

    let mut restored = codec.deserialize(&codec.serialize(&entry), ENTRY_FORMAT_VERSION).unwrap();
    assert!(!restored.is_lazy("imdb_id"));
    assert!(restored.is_lazy("imdb_score"));
    assert_eq!(restored.get("imdb_score").unwrap(), Some(&Value::Float(9.2)));
}

#[test]
fn renamed_title_keeps_original_after_round_trip() {
    let codec = EntryCodec::new(LazyRegistry::empty());
    let mut entry = Entry::with_title_url("Show S01E01", "http://x/1");
    entry.set("title", "Show.S01E01.720p").unwrap();

    let restored = codec.deserialize(&codec.serialize(&entry), ENTRY_FORMAT_VERSION).unwrap();
    assert_eq!(restored.title(), Some("Show.S01E01.720p"));
    assert_eq!(restored.peek("original_title"), Some(&Value::from("Show S01E01")));
    assert_eq!(restored, entry);
}

#[test]
fn internal_and_unserializable_fields_are_dropped() {
    let codec = EntryCodec::new(LazyRegistry::empty());
    let mut entry = Entry::with_title_url("a", "http://a");
    entry.set("_backlog_id", 4).unwrap();
    entry.set("socket", Value::Custom(CustomValue::new(Socket))).unwrap();
    entry.set("tags", Value::List(vec!["hd".into(), "x264".into()])).unwrap();

    let data = codec.serialize(&entry);
    assert!(!data.fields.contains_key("_backlog_id"));
    assert!(!data.fields.contains_key("socket"));

    let restored = codec.deserialize(&data, ENTRY_FORMAT_VERSION).unwrap();
    assert_eq!(
        restored.peek("tags"),
        Some(&Value::List(vec!["hd".into(), "x264".into()]))
    );

    let keep_all = EntryCodec::new(LazyRegistry::empty()).with_config(CodecConfig {
        internal_prefix: String::new(),
    });
    assert!(keep_all.serialize(&entry).fields.contains_key("_backlog_id"));
}

#[test]
fn datetime_fields_use_extension_serializer() {
    let codec = EntryCodec::new(LazyRegistry::empty());
    let aired = Utc.with_ymd_and_hms(2011, 4, 17, 21, 0, 0).unwrap();
    let mut entry = Entry::with_title_url("a", "http://a");
    entry.set("aired", aired).unwrap();

    let data = codec.serialize(&entry);
    assert_eq!(data.fields["aired"]["serializer"], "datetime");

    let restored = codec.deserialize(&data, ENTRY_FORMAT_VERSION).unwrap();
    let value = restored.peek("aired").unwrap();
    assert_eq!(value.downcast_ref::<DateTimeValue>(), Some(&DateTimeValue(aired)));
}

#[test]
fn unknown_version_is_refused() {
    let codec = EntryCodec::new(LazyRegistry::empty());
    let data = codec.serialize(&Entry::with_title_url("a", "http://a"));
    assert!(matches!(
        codec.deserialize(&data, ENTRY_FORMAT_VERSION + 1),
        Err(CodecError::UnsupportedVersion(v)) if v == ENTRY_FORMAT_VERSION + 1
    ));
}

#[test]
fn lookup_needs_registration_in_target_process() {
    let registry = lookup_registry(Arc::default());
    let writer = EntryCodec::new(registry.clone());
    let mut entry = Entry::with_registry(registry);
    entry.attach("probe_size", ["size"], vec![], ValueMap::new()).unwrap();
    let data = writer.serialize(&entry);

    let reader = EntryCodec::new(LazyRegistry::empty());
    assert!(matches!(
        reader.deserialize(&data, ENTRY_FORMAT_VERSION),
        Err(CodecError::Entry(EntryError::Registry(
            RegistryError::UnregisteredLazyFunction(_)
        )))
    ));
}

#[test]
fn json_envelope_and_bare_data_both_decode() {
    let codec = EntryCodec::new(LazyRegistry::empty());
    let mut entry = Entry::with_title_url("Show", "http://x/1");
    entry.set("quality", "720p").unwrap();

    let bytes = codec.to_json(&entry).unwrap();
    let envelope: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(envelope["format_version"], ENTRY_FORMAT_VERSION);

    let restored = codec.from_json(&bytes).unwrap();
    assert_eq!(restored.peek("quality"), Some(&Value::from("720p")));

    let bare = serde_json::to_vec(&codec.serialize(&entry)).unwrap();
    assert_eq!(codec.from_json(&bare).unwrap(), entry);

    assert!(matches!(codec.from_json(b"not json"), Err(CodecError::Json(_))));
}

#[test]
fn bad_title_in_stored_data_is_refused() {
    let codec = EntryCodec::new(LazyRegistry::empty());
    let mut data = EntryData::default();
    data.fields.insert(
        "title".to_string(),
        serde_json::json!({"serializer": "builtin", "version": 1, "value": 5}),
    );
    assert!(matches!(
        codec.deserialize(&data, ENTRY_FORMAT_VERSION),
        Err(CodecError::Entry(EntryError::InvalidField { .. }))
    ));
}
