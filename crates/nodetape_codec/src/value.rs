//! Canonical value tree.
//!
//! Every node state, output, and recorded snapshot passes through [`Value`].
//! Maps are ordered by key, so any textual rendering of a `Value` is
//! deterministic.
//!
//! Human-readable serializers (JSON) see the natural shape: `null`, numbers,
//! strings, arrays, objects. Binary serializers (postcard) see a tagged enum
//! so integers and floats keep their identity on the way back.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::de::{self, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A node state: field name → value
pub type State = BTreeMap<String, Value>;

/// Canonical value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Finite float
    Float(f64),
    /// Text, including enum names, timestamps, and base64 blobs
    Text(String),
    /// Ordered list
    List(Vec<Value>),
    /// Key-ordered map
    Map(BTreeMap<String, Value>),
}

/// Structural kind of a value, used for type-mismatch reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `Value::Null`
    Null,
    /// `Value::Bool`
    Bool,
    /// `Value::Int`
    Int,
    /// `Value::Float`
    Float,
    /// `Value::Text`
    Text,
    /// `Value::List`
    List,
    /// `Value::Map`
    Map,
}

impl ValueKind {
    /// Kind name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::List => "list",
            Self::Map => "map",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    /// Structural kind
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
        }
    }

    /// Float, or `Null` when not finite
    #[must_use]
    pub fn float(f: f64) -> Self {
        if f.is_finite() {
            Self::Float(f)
        } else {
            Self::Null
        }
    }

    /// Binary blob as base64 text
    #[must_use]
    pub fn bytes(data: &[u8]) -> Self {
        Self::Text(STANDARD.encode(data))
    }

    /// Timestamp as RFC 3339 text
    #[must_use]
    pub fn timestamp(ts: &DateTime<Utc>) -> Self {
        Self::Text(nodetape_core::time::to_rfc3339(ts))
    }

    /// Set-like collection as a sorted, de-duplicated list
    pub fn set<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let mut items: Vec<Value> = items.into_iter().collect();
        items.sort_by_cached_key(|v| v.to_string());
        items.dedup();
        Self::List(items)
    }

    /// Map from key/value pairs
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Check for null
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow as text
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as map
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Take as map
    #[must_use]
    pub fn into_map(self) -> Option<BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Field of a map value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Compact JSON text
    #[must_use]
    pub fn to_compact(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("null"))
    }

    /// Convert to a `serde_json::Value`
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Convert from a `serde_json::Value`
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Null, Self::float),
            },
            serde_json::Value::String(s) => Self::Text(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(fields) => Self::Map(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Map(map)
    }
}

const VARIANTS: &[&str] = &["Null", "Bool", "Int", "Float", "Text", "List", "Map"];

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            match self {
                Self::Null => s.serialize_unit(),
                Self::Bool(b) => s.serialize_bool(*b),
                Self::Int(i) => s.serialize_i64(*i),
                Self::Float(f) if f.is_finite() => s.serialize_f64(*f),
                Self::Float(_) => s.serialize_unit(),
                Self::Text(t) => s.serialize_str(t),
                Self::List(items) => s.collect_seq(items),
                Self::Map(fields) => s.collect_map(fields),
            }
        } else {
            match self {
                Self::Null => s.serialize_unit_variant("Value", 0, "Null"),
                Self::Bool(b) => s.serialize_newtype_variant("Value", 1, "Bool", b),
                Self::Int(i) => s.serialize_newtype_variant("Value", 2, "Int", i),
                Self::Float(f) => s.serialize_newtype_variant("Value", 3, "Float", f),
                Self::Text(t) => s.serialize_newtype_variant("Value", 4, "Text", t),
                Self::List(items) => s.serialize_newtype_variant("Value", 5, "List", items),
                Self::Map(fields) => s.serialize_newtype_variant("Value", 6, "Map", fields),
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        if d.is_human_readable() {
            d.deserialize_any(NaturalVisitor)
        } else {
            d.deserialize_enum("Value", VARIANTS, TaggedVisitor)
        }
    }
}

struct NaturalVisitor;

impl<'de> Visitor<'de> for NaturalVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
        Value::deserialize(d)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, i: i64) -> Result<Value, E> {
        Ok(Value::Int(i))
    }

    fn visit_u64<E: de::Error>(self, u: u64) -> Result<Value, E> {
        Ok(i64::try_from(u).map_or_else(|_| Value::float(u as f64), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> Result<Value, E> {
        Ok(Value::float(f))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
        Ok(Value::Text(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Value, E> {
        Ok(Value::Text(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut fields = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            fields.insert(key, value);
        }
        Ok(Value::Map(fields))
    }
}

struct TaggedVisitor;

impl<'de> Visitor<'de> for TaggedVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a tagged canonical value")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Value, A::Error> {
        let (tag, variant): (u32, _) = data.variant()?;
        match tag {
            0 => variant.unit_variant().map(|()| Value::Null),
            1 => variant.newtype_variant().map(Value::Bool),
            2 => variant.newtype_variant().map(Value::Int),
            3 => variant.newtype_variant().map(Value::Float),
            4 => variant.newtype_variant().map(Value::Text),
            5 => variant.newtype_variant().map(Value::List),
            6 => variant.newtype_variant().map(Value::Map),
            other => Err(de::Error::invalid_value(
                de::Unexpected::Unsigned(u64::from(other)),
                &"a variant index below 7",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Value {
        Value::map([
            ("status", Value::from("ANALYZING")),
            ("count", Value::Int(3)),
            ("ratio", Value::Float(0.5)),
            ("files", Value::List(vec!["b.py".into(), "a.py".into()])),
            ("extra", Value::Null),
        ])
    }

    #[test]
    fn test_json_keys_are_ordered() {
        let text = sample().to_compact();
        assert_eq!(
            text,
            r#"{"count":3,"extra":null,"files":["b.py","a.py"],"ratio":0.5,"status":"ANALYZING"}"#
        );
    }

    #[test]
    fn test_json_roundtrip_keeps_int_and_float_apart() {
        let value = Value::map([("i", Value::Int(1)), ("f", Value::Float(1.0))]);
        let text = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_postcard_roundtrip() {
        let value = sample();
        let bytes = postcard::to_allocvec(&value).unwrap();
        let back: Value = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_non_finite_float_is_null() {
        assert_eq!(Value::float(f64::NAN), Value::Null);
        assert_eq!(Value::from(f64::INFINITY), Value::Null);
        assert_eq!(Value::Float(f64::NAN).to_compact(), "null");
    }

    #[test]
    fn test_set_is_sorted_and_deduplicated() {
        let set = Value::set(vec!["b".into(), "a".into(), "b".into()]);
        assert_eq!(set, Value::List(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_helpers() {
        assert_eq!(Value::bytes(b"hi"), Value::Text("aGk=".to_string()));
        let ts = Utc.with_ymd_and_hms(2025, 7, 8, 17, 0, 0).unwrap();
        assert_eq!(
            Value::timestamp(&ts),
            Value::Text("2025-07-08T17:00:00.000000Z".to_string())
        );
        assert_eq!(sample().get("count"), Some(&Value::Int(3)));
        assert_eq!(sample().kind(), ValueKind::Map);
        assert_eq!(Value::Null.kind().to_string(), "null");
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"a": [1, 2.5, "x"], "b": {"c": true}, "d": null});
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
        assert_eq!(value.get("a").unwrap().kind(), ValueKind::List);
    }

    #[test]
    fn test_large_unsigned_becomes_float() {
        let back: Value = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(back.kind(), ValueKind::Float);
    }
}
