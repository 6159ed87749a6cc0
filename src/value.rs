//! Heterogeneous field values stored on an entry.

use std::{any::Any, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// Ordered keyword map used for nested values and call arguments.
pub type ValueMap = IndexMap<String, Value>;

/// A field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit absence of a value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Plain text.
    Str(String),
    /// Text produced by a parser that attached its own metadata.
    Rich(RichString),
    /// Raw bytes. Entries refuse these.
    Bytes(Vec<u8>),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Ordered mapping.
    Map(ValueMap),
    /// Domain value provided by an extension.
    Custom(CustomValue),
}

impl Value {
    /// Returns the text of a plain string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Downcasts a custom value to a concrete domain type.
    pub fn downcast_ref<T: DomainValue>(&self) -> Option<&T> {
        match self {
            Self::Custom(custom) => custom.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// True for plain strings only; rich strings do not count.
    pub fn is_str(&self) -> bool {
        matches!(self, Self::Str(_))
    }

    /// Truthiness: null, false, zero and empty containers are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Rich(r) => !r.text.is_empty(),
            Self::Bytes(b) => !b.is_empty(),
            Self::List(l) => !l.is_empty(),
            Self::Map(m) => !m.is_empty(),
            Self::Custom(_) => true,
        }
    }

    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Rich(_) => "rich_str",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Custom(_) => "custom",
        }
    }

    /// Converts plain JSON into a value. Integers that do not fit `i64`
    /// become floats.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Structural deep copy. Returns `None` when some nested custom value
    /// cannot be copied.
    pub fn deep_copy(&self) -> Option<Value> {
        match self {
            Self::List(items) => items
                .iter()
                .map(Value::deep_copy)
                .collect::<Option<Vec<_>>>()
                .map(Self::List),
            Self::Map(map) => map
                .iter()
                .map(|(k, v)| v.deep_copy().map(|v| (k.clone(), v)))
                .collect::<Option<ValueMap>>()
                .map(Self::Map),
            Self::Custom(custom) => custom.0.deep_copy().map(|inner| Self::Custom(CustomValue(inner))),
            other => Some(other.clone()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<ValueMap> for Value {
    fn from(value: ValueMap) -> Self {
        Self::Map(value)
    }
}

impl From<RichString> for Value {
    fn from(value: RichString) -> Self {
        Self::Rich(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Custom(CustomValue::new(DateTimeValue(value)))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Rich(r) => f.write_str(&r.text),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (idx, (k, v)) in map.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Custom(custom) => write!(f, "{:?}", custom.0),
        }
    }
}

/// Text carrying the name of the parser that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichString {
    /// The text itself.
    pub text: String,
    /// Producer of the text, e.g. an html parser.
    pub origin: String,
}

impl RichString {
    /// Builds a rich string.
    pub fn new(text: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: origin.into(),
        }
    }
}

/// Extension point for domain types stored in an entry.
///
/// The `type_name` doubles as the codec key for the serializer that knows how
/// to persist the value.
pub trait DomainValue: fmt::Debug + Send + Sync + 'static {
    /// Stable name of the type.
    fn type_name(&self) -> &'static str;

    /// Access to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Independent copy, or `None` if the value cannot be copied.
    fn deep_copy(&self) -> Option<Arc<dyn DomainValue>> {
        None
    }

    /// Attribute lookup used by dotted-path field mapping.
    fn attr(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Equality against another domain value.
    fn dyn_eq(&self, _other: &dyn DomainValue) -> bool {
        false
    }
}

/// Shared handle to a [`DomainValue`].
#[derive(Debug, Clone)]
pub struct CustomValue(pub Arc<dyn DomainValue>);

impl CustomValue {
    /// Wraps a domain value.
    pub fn new<T: DomainValue>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Name of the wrapped type.
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Downcasts to the concrete type.
    pub fn downcast_ref<T: DomainValue>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.dyn_eq(other.0.as_ref())
    }
}

/// UTC timestamp stored as a domain value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeValue(pub DateTime<Utc>);

impl DomainValue for DateTimeValue {
    fn type_name(&self) -> &'static str {
        "datetime"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn deep_copy(&self) -> Option<Arc<dyn DomainValue>> {
        Some(Arc::new(*self))
    }

    fn attr(&self, name: &str) -> Option<Value> {
        use chrono::Datelike;
        match name {
            "year" => Some(Value::Int(i64::from(self.0.year()))),
            "month" => Some(Value::Int(i64::from(self.0.month()))),
            "day" => Some(Value::Int(i64::from(self.0.day()))),
            "timestamp" => Some(Value::Int(self.0.timestamp())),
            _ => None,
        }
    }

    fn dyn_eq(&self, other: &dyn DomainValue) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| other == self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Socket;

    impl DomainValue for Socket {
        fn type_name(&self) -> &'static str {
            "socket"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn deep_copy_fails_through_nested_uncopyable_value() {
        let value = Value::List(vec![Value::Int(1), Value::Custom(CustomValue::new(Socket))]);
        assert!(value.deep_copy().is_none());

        let ok = Value::List(vec![Value::Int(1), Value::from("a")]);
        assert_eq!(ok.deep_copy(), Some(ok.clone()));
    }

    #[test]
    fn truthiness_follows_emptiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::from("yes").is_truthy());
    }
}
