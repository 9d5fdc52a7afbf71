//! Dynamic values exchanged with Terraform core
//!
//! Terraform encodes values as cty-flavoured msgpack: objects and maps are
//! msgpack maps, lists are arrays, null is nil and a not-yet-known value is
//! the extension type 0. Decoding is always directed by the expected type,
//! since msgpack alone cannot tell an object from a map.

use rmpv::Value as Msgpack;
use std::collections::BTreeMap;

use crate::error::{PluginError, PluginResult};
use crate::schema::AttributeType;

/// Extension type cty uses for unknown values
const UNKNOWN_EXT: i8 = 0;

/// A cty value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Unknown,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    /// True when neither this value nor anything nested in it is unknown
    pub fn is_wholly_known(&self) -> bool {
        match self {
            Value::Unknown => false,
            Value::List(items) => items.iter().all(Value::is_wholly_known),
            Value::Map(entries) | Value::Object(entries) => {
                entries.values().all(Value::is_wholly_known)
            }
            _ => true,
        }
    }

    /// True for the zero value of the type, mirroring the SDK's `GetOk` notion of "set"
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null | Value::Unknown => true,
            Value::Bool(b) => !b,
            Value::Number(n) => *n == 0.0,
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(entries) | Value::Object(entries) => entries.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64().map(|n| n as i64)
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Entries of a map or object value
    pub fn as_entries(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) | Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Attribute of an object value, `Null` when missing
    pub fn attr(&self, name: &str) -> &Value {
        static NULL: Value = Value::Null;
        match self {
            Value::Object(attrs) => attrs.get(name).unwrap_or(&NULL),
            _ => &NULL,
        }
    }

    /// Known string elements of a map value; null and unknown elements are skipped
    pub fn to_string_map(&self) -> BTreeMap<String, String> {
        self.as_entries()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Known string elements of a list value
    pub fn to_string_list(&self) -> Vec<String> {
        self.as_list()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace every unknown, at any depth, with null
    pub fn unknowns_to_null(self) -> Value {
        match self {
            Value::Unknown => Value::Null,
            Value::List(items) => {
                Value::List(items.into_iter().map(Value::unknowns_to_null).collect())
            }
            Value::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.unknowns_to_null()))
                    .collect(),
            ),
            Value::Object(attrs) => Value::Object(
                attrs
                    .into_iter()
                    .map(|(k, v)| (k, v.unknowns_to_null()))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Decode a msgpack payload as a value of the given type
    pub fn from_msgpack(bytes: &[u8], ty: &AttributeType) -> PluginResult<Value> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        let raw = rmpv::decode::read_value(&mut &bytes[..])?;
        from_msgpack_value(raw, ty)
    }

    /// Encode this value as msgpack following the given type
    pub fn to_msgpack(&self, ty: &AttributeType) -> PluginResult<Vec<u8>> {
        let raw = to_msgpack_value(self, ty)?;
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &raw)?;
        Ok(buf)
    }

    /// Decode a JSON payload (used for stored state) as a value of the given type
    pub fn from_json(bytes: &[u8], ty: &AttributeType) -> PluginResult<Value> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        let raw: serde_json::Value = serde_json::from_slice(bytes)?;
        from_json_value(raw, ty)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items.into_iter().map(Value::String).collect())
    }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        )
    }
}

fn mismatch(ty: &AttributeType, detail: impl Into<String>) -> PluginError {
    PluginError::TypeMismatch {
        expected: ty.to_string(),
        detail: detail.into(),
    }
}

fn from_msgpack_value(raw: Msgpack, ty: &AttributeType) -> PluginResult<Value> {
    match raw {
        Msgpack::Nil => return Ok(Value::Null),
        Msgpack::Ext(UNKNOWN_EXT, _) => return Ok(Value::Unknown),
        _ => {}
    }

    match ty {
        AttributeType::String => match raw {
            Msgpack::String(s) => s
                .into_str()
                .map(Value::String)
                .ok_or_else(|| mismatch(ty, "invalid UTF-8 in string")),
            // cty converts primitives to strings freely
            Msgpack::Boolean(b) => Ok(Value::String(b.to_string())),
            Msgpack::Integer(i) => Ok(Value::String(i.to_string())),
            Msgpack::F64(f) => Ok(Value::String(f.to_string())),
            other => Err(mismatch(ty, format!("got {other}"))),
        },
        AttributeType::Bool => match raw {
            Msgpack::Boolean(b) => Ok(Value::Bool(b)),
            Msgpack::String(s) => match s.as_str() {
                Some("true") | Some("1") => Ok(Value::Bool(true)),
                Some("false") | Some("0") => Ok(Value::Bool(false)),
                _ => Err(mismatch(ty, "string is not a boolean")),
            },
            other => Err(mismatch(ty, format!("got {other}"))),
        },
        AttributeType::Number => match raw {
            Msgpack::Integer(i) => i
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| mismatch(ty, "integer out of range")),
            Msgpack::F32(f) => Ok(Value::Number(f as f64)),
            Msgpack::F64(f) => Ok(Value::Number(f)),
            // Numbers too large for msgpack travel as strings
            Msgpack::String(s) => s
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .map(Value::Number)
                .ok_or_else(|| mismatch(ty, "string is not a number")),
            other => Err(mismatch(ty, format!("got {other}"))),
        },
        AttributeType::List(elem) => match raw {
            Msgpack::Array(items) => items
                .into_iter()
                .map(|item| from_msgpack_value(item, elem))
                .collect::<PluginResult<Vec<_>>>()
                .map(Value::List),
            other => Err(mismatch(ty, format!("got {other}"))),
        },
        AttributeType::Map(elem) => match raw {
            Msgpack::Map(entries) => {
                let mut out = BTreeMap::new();
                for (key, value) in entries {
                    let key = msgpack_key(key, ty)?;
                    out.insert(key, from_msgpack_value(value, elem)?);
                }
                Ok(Value::Map(out))
            }
            other => Err(mismatch(ty, format!("got {other}"))),
        },
        AttributeType::Object(attrs) => match raw {
            Msgpack::Map(entries) => {
                let mut out: BTreeMap<String, Value> =
                    attrs.keys().map(|k| (k.clone(), Value::Null)).collect();
                for (key, value) in entries {
                    let key = msgpack_key(key, ty)?;
                    // Attributes outside the schema are dropped
                    if let Some(attr_ty) = attrs.get(&key) {
                        out.insert(key, from_msgpack_value(value, attr_ty)?);
                    }
                }
                Ok(Value::Object(out))
            }
            other => Err(mismatch(ty, format!("got {other}"))),
        },
    }
}

fn msgpack_key(key: Msgpack, ty: &AttributeType) -> PluginResult<String> {
    match key {
        Msgpack::String(s) => s
            .into_str()
            .ok_or_else(|| mismatch(ty, "invalid UTF-8 in key")),
        other => Err(mismatch(ty, format!("non-string key {other}"))),
    }
}

fn to_msgpack_value(value: &Value, ty: &AttributeType) -> PluginResult<Msgpack> {
    match (value, ty) {
        (Value::Null, _) => Ok(Msgpack::Nil),
        (Value::Unknown, _) => Ok(Msgpack::Ext(UNKNOWN_EXT, vec![0])),
        (Value::String(s), AttributeType::String) => Ok(Msgpack::from(s.as_str())),
        (Value::Bool(b), AttributeType::String) => Ok(Msgpack::from(b.to_string())),
        (Value::Number(n), AttributeType::String) => Ok(Msgpack::from(format_number(*n))),
        (Value::Bool(b), AttributeType::Bool) => Ok(Msgpack::Boolean(*b)),
        (Value::Number(n), AttributeType::Number) => {
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                Ok(Msgpack::from(*n as i64))
            } else {
                Ok(Msgpack::F64(*n))
            }
        }
        (Value::List(items), AttributeType::List(elem)) => items
            .iter()
            .map(|item| to_msgpack_value(item, elem))
            .collect::<PluginResult<Vec<_>>>()
            .map(Msgpack::Array),
        (Value::Map(entries), AttributeType::Map(elem))
        | (Value::Object(entries), AttributeType::Map(elem)) => entries
            .iter()
            .map(|(k, v)| Ok((Msgpack::from(k.as_str()), to_msgpack_value(v, elem)?)))
            .collect::<PluginResult<Vec<_>>>()
            .map(Msgpack::Map),
        (Value::Object(entries), AttributeType::Object(attrs))
        | (Value::Map(entries), AttributeType::Object(attrs)) => attrs
            .iter()
            .map(|(name, attr_ty)| {
                let v = entries.get(name).unwrap_or(&Value::Null);
                Ok((Msgpack::from(name.as_str()), to_msgpack_value(v, attr_ty)?))
            })
            .collect::<PluginResult<Vec<_>>>()
            .map(Msgpack::Map),
        (other, ty) => Err(mismatch(ty, format!("cannot encode {other:?}"))),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn from_json_value(raw: serde_json::Value, ty: &AttributeType) -> PluginResult<Value> {
    use serde_json::Value as Json;

    if raw.is_null() {
        return Ok(Value::Null);
    }

    match ty {
        AttributeType::String => match raw {
            Json::String(s) => Ok(Value::String(s)),
            Json::Bool(b) => Ok(Value::String(b.to_string())),
            Json::Number(n) => Ok(Value::String(n.to_string())),
            other => Err(mismatch(ty, format!("got {other}"))),
        },
        AttributeType::Bool => match raw {
            Json::Bool(b) => Ok(Value::Bool(b)),
            Json::String(s) if s == "true" => Ok(Value::Bool(true)),
            Json::String(s) if s == "false" => Ok(Value::Bool(false)),
            other => Err(mismatch(ty, format!("got {other}"))),
        },
        AttributeType::Number => match raw {
            Json::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| mismatch(ty, "number out of range")),
            Json::String(s) => s
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| mismatch(ty, "string is not a number")),
            other => Err(mismatch(ty, format!("got {other}"))),
        },
        AttributeType::List(elem) => match raw {
            Json::Array(items) => items
                .into_iter()
                .map(|item| from_json_value(item, elem))
                .collect::<PluginResult<Vec<_>>>()
                .map(Value::List),
            other => Err(mismatch(ty, format!("got {other}"))),
        },
        AttributeType::Map(elem) => match raw {
            Json::Object(entries) => entries
                .into_iter()
                .map(|(k, v)| Ok((k, from_json_value(v, elem)?)))
                .collect::<PluginResult<BTreeMap<_, _>>>()
                .map(Value::Map),
            other => Err(mismatch(ty, format!("got {other}"))),
        },
        AttributeType::Object(attrs) => match raw {
            Json::Object(mut entries) => attrs
                .iter()
                .map(|(name, attr_ty)| {
                    let v = entries.remove(name).unwrap_or(Json::Null);
                    Ok((name.clone(), from_json_value(v, attr_ty)?))
                })
                .collect::<PluginResult<BTreeMap<_, _>>>()
                .map(Value::Object),
            other => Err(mismatch(ty, format!("got {other}"))),
        },
    }
}
