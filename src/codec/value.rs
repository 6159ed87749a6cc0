//! Recursive value serializer.
//!
//! Every value becomes a self-describing node
//! `{"serializer": name, "version": n, "value": payload}`. Lists and maps
//! nest nodes in their payload. Domain values are handled by
//! [`ValueSerializer`] extensions keyed by [`DomainValue::type_name`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as Json};

use crate::{
    error::{CodecError, CodecResult},
    value::{DomainValue, Value, ValueMap},
};

const BUILTIN: &str = "builtin";
const LIST: &str = "list";
const DICT: &str = "dict";
const CONTAINER_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Node {
    serializer: String,
    version: u16,
    value: Json,
}

/// Converter for one domain value type.
pub trait ValueSerializer: Send + Sync {
    /// Matches [`DomainValue::type_name`] of the values it handles.
    fn name(&self) -> &'static str;

    /// Payload version written by [`ValueSerializer::serialize`].
    fn version(&self) -> u16 {
        1
    }

    /// Encodes the domain value.
    fn serialize(&self, value: &dyn DomainValue) -> CodecResult<Json>;

    /// Decodes a payload written with `version`.
    fn deserialize(&self, payload: &Json, version: u16) -> CodecResult<Value>;
}

/// RFC 3339 timestamps for [`crate::value::DateTimeValue`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeSerializer;

impl ValueSerializer for DateTimeSerializer {
    fn name(&self) -> &'static str {
        "datetime"
    }

    fn serialize(&self, value: &dyn DomainValue) -> CodecResult<Json> {
        let dt = value
            .as_any()
            .downcast_ref::<crate::value::DateTimeValue>()
            .ok_or_else(|| CodecError::NotSerializable(value.type_name().to_string()))?;
        Ok(Json::String(dt.0.to_rfc3339()))
    }

    fn deserialize(&self, payload: &Json, _version: u16) -> CodecResult<Value> {
        let text = payload.as_str().ok_or_else(|| malformed(self.name(), "expected a string"))?;
        let dt = DateTime::parse_from_rfc3339(text)
            .map_err(|e| malformed(self.name(), &e.to_string()))?
            .with_timezone(&Utc);
        Ok(Value::from(dt))
    }
}

/// Extension serializers by name.
#[derive(Clone, Default)]
pub struct SerializerRegistry {
    extensions: HashMap<&'static str, Arc<dyn ValueSerializer>>,
}

impl SerializerRegistry {
    /// Registry without extensions; only builtins, lists and maps serialize.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the stock extensions.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(DateTimeSerializer);
        registry
    }

    /// Adds or replaces the extension named `serializer.name()`.
    pub fn register<S: ValueSerializer + 'static>(&mut self, serializer: S) {
        self.extensions.insert(serializer.name(), Arc::new(serializer));
    }

    /// True when an extension named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    /// Encodes `value` into a node tree.
    pub fn serialize(&self, value: &Value) -> CodecResult<Json> {
        let node = match value {
            Value::Null => builtin(Json::Null),
            Value::Bool(b) => builtin(Json::Bool(*b)),
            Value::Int(i) => builtin(Json::Number(Number::from(*i))),
            Value::Float(f) => builtin(Json::Number(
                Number::from_f64(*f).ok_or_else(|| CodecError::NotSerializable(format!("float {f}")))?,
            )),
            Value::Str(s) => builtin(Json::String(s.clone())),
            Value::Rich(r) => builtin(Json::String(r.text.clone())),
            Value::Bytes(_) => return Err(CodecError::NotSerializable("bytes".to_string())),
            Value::List(items) => Node {
                serializer: LIST.to_string(),
                version: CONTAINER_VERSION,
                value: Json::Array(items.iter().map(|v| self.serialize(v)).collect::<CodecResult<_>>()?),
            },
            Value::Map(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.serialize(v)?);
                }
                Node {
                    serializer: DICT.to_string(),
                    version: CONTAINER_VERSION,
                    value: Json::Object(out),
                }
            }
            Value::Custom(custom) => {
                let name = custom.type_name();
                let ext = self
                    .extensions
                    .get(name)
                    .ok_or_else(|| CodecError::NotSerializable(name.to_string()))?;
                Node {
                    serializer: name.to_string(),
                    version: ext.version(),
                    value: ext.serialize(custom.0.as_ref())?,
                }
            }
        };
        Ok(serde_json::to_value(node)?)
    }

    /// Decodes a node tree produced by [`SerializerRegistry::serialize`].
    pub fn deserialize(&self, data: &Json) -> CodecResult<Value> {
        let node: Node = serde_json::from_value(data.clone())?;
        match node.serializer.as_str() {
            BUILTIN => match node.value {
                Json::Null => Ok(Value::Null),
                Json::Bool(b) => Ok(Value::Bool(b)),
                Json::String(s) => Ok(Value::Str(s)),
                Json::Number(n) => match n.as_i64() {
                    Some(i) => Ok(Value::Int(i)),
                    None => n
                        .as_f64()
                        .map(Value::Float)
                        .ok_or_else(|| malformed(BUILTIN, "number out of range")),
                },
                Json::Array(_) | Json::Object(_) => Err(malformed(BUILTIN, "expected a scalar")),
            },
            LIST => match &node.value {
                Json::Array(items) => Ok(Value::List(
                    items.iter().map(|v| self.deserialize(v)).collect::<CodecResult<_>>()?,
                )),
                _ => Err(malformed(LIST, "expected an array")),
            },
            DICT => match &node.value {
                Json::Object(map) => {
                    let mut out = ValueMap::new();
                    for (k, v) in map {
                        out.insert(k.clone(), self.deserialize(v)?);
                    }
                    Ok(Value::Map(out))
                }
                _ => Err(malformed(DICT, "expected an object")),
            },
            name => {
                let ext = self
                    .extensions
                    .get(name)
                    .ok_or_else(|| CodecError::UnknownSerializer(name.to_string()))?;
                ext.deserialize(&node.value, node.version)
            }
        }
    }
}

fn builtin(value: Json) -> Node {
    Node {
        serializer: BUILTIN.to_string(),
        version: CONTAINER_VERSION,
        value,
    }
}

fn malformed(serializer: &str, reason: &str) -> CodecError {
    CodecError::Malformed {
        serializer: serializer.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use chrono::TimeZone;

    use super::*;
    use crate::value::{CustomValue, RichString};

    #[derive(Debug)]
    struct Unknown;

    impl DomainValue for Unknown {
        fn type_name(&self) -> &'static str {
            "unknown"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn nested_values_carry_their_serializer() {
        let registry = SerializerRegistry::with_defaults();
        let mut map = ValueMap::new();
        map.insert("n".into(), Value::Int(3));
        let value = Value::List(vec![Value::from("a"), Value::Map(map)]);

        let json = registry.serialize(&value).unwrap();
        assert_eq!(json["serializer"], "list");
        assert_eq!(json["value"][1]["serializer"], "dict");
        assert_eq!(json["value"][1]["value"]["n"]["value"], 3);
        assert_eq!(registry.deserialize(&json).unwrap(), value);
    }

    #[test]
    fn datetime_goes_through_extension() {
        let registry = SerializerRegistry::with_defaults();
        let dt = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let json = registry.serialize(&Value::from(dt)).unwrap();
        assert_eq!(json["serializer"], "datetime");

        let back = registry.deserialize(&json).unwrap();
        assert_eq!(back, Value::from(dt));
    }

    #[test]
    fn unsupported_values_are_refused() {
        let registry = SerializerRegistry::empty();
        assert!(matches!(
            registry.serialize(&Value::Custom(CustomValue::new(Unknown))),
            Err(CodecError::NotSerializable(name)) if name == "unknown"
        ));
        assert!(matches!(
            registry.serialize(&Value::Bytes(vec![1])),
            Err(CodecError::NotSerializable(_))
        ));
        assert!(matches!(
            registry.serialize(&Value::Float(f64::NAN)),
            Err(CodecError::NotSerializable(_))
        ));
    }

    #[test]
    fn rich_strings_serialize_as_plain_text() {
        let registry = SerializerRegistry::empty();
        let json = registry
            .serialize(&Value::List(vec![RichString::new("x", "html").into()]))
            .unwrap();
        assert_eq!(
            registry.deserialize(&json).unwrap(),
            Value::List(vec![Value::from("x")])
        );
    }
}
