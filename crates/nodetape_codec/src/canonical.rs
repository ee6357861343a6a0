//! Explicit canonical-form contract.
//!
//! A type enters the serializer only through [`ToCanonical`] and leaves it
//! only through [`FromCanonical`]. There is no reflective fallback: a type
//! without an implementation cannot be serialized.

use crate::value::{Value, ValueKind};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use nodetape_core::{DecodeStage, TapeError};
use std::collections::{BTreeMap, BTreeSet};

/// Canonical conversion error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Value had the wrong structural kind
    #[error("Expected {expected}, found {found}")]
    Expected {
        /// Kind the target type accepts
        expected: ValueKind,
        /// Kind that was present
        found: ValueKind,
    },

    /// Required map field absent
    #[error("Missing field: {field}")]
    MissingField {
        /// Field name
        field: String,
    },

    /// Text that names no variant of an enumeration
    #[error("Invalid {type_name} variant: {value}")]
    InvalidVariant {
        /// Enumeration name
        type_name: &'static str,
        /// Offending text
        value: String,
    },

    /// Right kind, unusable content
    #[error("Invalid value: {reason}")]
    InvalidValue {
        /// What was wrong
        reason: String,
    },
}

impl CodecError {
    /// Build an invalid-value error
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }

    fn expected(expected: ValueKind, found: &Value) -> Self {
        Self::Expected {
            expected,
            found: found.kind(),
        }
    }
}

impl From<CodecError> for TapeError {
    fn from(err: CodecError) -> Self {
        TapeError::decode(DecodeStage::Parse, err)
    }
}

/// Conversion into the canonical value tree
pub trait ToCanonical {
    /// Canonical form of `self`
    fn to_canonical(&self) -> Value;
}

/// Conversion out of the canonical value tree
pub trait FromCanonical: Sized {
    /// Rebuild from canonical form
    ///
    /// # Errors
    ///
    /// Returns error if the value does not have the shape this type expects
    fn from_canonical(value: &Value) -> Result<Self, CodecError>;
}

/// Canonical form of any convertible value
pub fn canonicalize<T: ToCanonical + ?Sized>(value: &T) -> Value {
    value.to_canonical()
}

/// Enumerations rendered as their declared string value
///
/// Implement this and invoke [`impl_canonical_enum!`](crate::impl_canonical_enum)
/// to get `ToCanonical`/`FromCanonical`.
pub trait CanonicalEnum: Sized {
    /// Type name used in error messages
    const TYPE_NAME: &'static str;

    /// Declared string value
    fn as_canonical_str(&self) -> &'static str;

    /// Variant for a declared string value
    fn from_canonical_str(s: &str) -> Option<Self>;
}

/// Derive `ToCanonical` and `FromCanonical` for a [`CanonicalEnum`]
#[macro_export]
macro_rules! impl_canonical_enum {
    ($ty:ty) => {
        impl $crate::ToCanonical for $ty {
            fn to_canonical(&self) -> $crate::Value {
                $crate::Value::Text(
                    <$ty as $crate::CanonicalEnum>::as_canonical_str(self).to_string(),
                )
            }
        }

        impl $crate::FromCanonical for $ty {
            fn from_canonical(value: &$crate::Value) -> Result<Self, $crate::CodecError> {
                let text = <String as $crate::FromCanonical>::from_canonical(value)?;
                <$ty as $crate::CanonicalEnum>::from_canonical_str(&text).ok_or_else(|| {
                    $crate::CodecError::InvalidVariant {
                        type_name: <$ty as $crate::CanonicalEnum>::TYPE_NAME,
                        value: text,
                    }
                })
            }
        }
    };
}

/// Binary payload carried as base64 text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blob(pub Vec<u8>);

impl ToCanonical for Blob {
    fn to_canonical(&self) -> Value {
        Value::bytes(&self.0)
    }
}

impl FromCanonical for Blob {
    fn from_canonical(value: &Value) -> Result<Self, CodecError> {
        let text = value
            .as_str()
            .ok_or_else(|| CodecError::expected(ValueKind::Text, value))?;
        STANDARD
            .decode(text)
            .map(Blob)
            .map_err(|e| CodecError::invalid(format!("blob is not base64: {}", e)))
    }
}

/// Borrow a value as a map
///
/// # Errors
///
/// Returns error if the value is not a map
pub fn require_map(value: &Value) -> Result<&BTreeMap<String, Value>, CodecError> {
    value
        .as_map()
        .ok_or_else(|| CodecError::expected(ValueKind::Map, value))
}

/// Required field of a map
///
/// # Errors
///
/// Returns error if the field is absent or has the wrong shape
pub fn field<T: FromCanonical>(map: &BTreeMap<String, Value>, name: &str) -> Result<T, CodecError> {
    let value = map.get(name).ok_or_else(|| CodecError::MissingField {
        field: name.to_string(),
    })?;
    T::from_canonical(value)
}

/// Optional field of a map; absent and null both read as `None`
///
/// # Errors
///
/// Returns error if the field is present with the wrong shape
pub fn opt_field<T: FromCanonical>(
    map: &BTreeMap<String, Value>,
    name: &str,
) -> Result<Option<T>, CodecError> {
    match map.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::from_canonical(value).map(Some),
    }
}

impl ToCanonical for Value {
    fn to_canonical(&self) -> Value {
        match self {
            Value::Float(f) => Value::float(*f),
            Value::List(items) => Value::List(items.iter().map(ToCanonical::to_canonical).collect()),
            Value::Map(fields) => Value::Map(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_canonical()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

impl FromCanonical for Value {
    fn from_canonical(value: &Value) -> Result<Self, CodecError> {
        Ok(value.clone())
    }
}

impl ToCanonical for bool {
    fn to_canonical(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromCanonical for bool {
    fn from_canonical(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(CodecError::expected(ValueKind::Bool, other)),
        }
    }
}

macro_rules! canonical_int {
    ($($ty:ty),*) => {$(
        impl ToCanonical for $ty {
            fn to_canonical(&self) -> Value {
                Value::Int(i64::from(*self))
            }
        }

        impl FromCanonical for $ty {
            fn from_canonical(value: &Value) -> Result<Self, CodecError> {
                match value {
                    Value::Int(i) => <$ty>::try_from(*i).map_err(|_| {
                        CodecError::invalid(format!("{} out of range for {}", i, stringify!($ty)))
                    }),
                    other => Err(CodecError::expected(ValueKind::Int, other)),
                }
            }
        }
    )*};
}

canonical_int!(i8, i16, i32, i64, u8, u16, u32);

impl ToCanonical for u64 {
    fn to_canonical(&self) -> Value {
        i64::try_from(*self).map_or_else(|_| Value::float(*self as f64), Value::Int)
    }
}

impl FromCanonical for u64 {
    fn from_canonical(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::Int(i) => u64::try_from(*i)
                .map_err(|_| CodecError::invalid(format!("{} out of range for u64", i))),
            other => Err(CodecError::expected(ValueKind::Int, other)),
        }
    }
}

impl ToCanonical for usize {
    fn to_canonical(&self) -> Value {
        (*self as u64).to_canonical()
    }
}

impl FromCanonical for usize {
    fn from_canonical(value: &Value) -> Result<Self, CodecError> {
        let n = u64::from_canonical(value)?;
        usize::try_from(n).map_err(|_| CodecError::invalid(format!("{} out of range for usize", n)))
    }
}

impl ToCanonical for f64 {
    fn to_canonical(&self) -> Value {
        Value::float(*self)
    }
}

impl FromCanonical for f64 {
    fn from_canonical(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(CodecError::expected(ValueKind::Float, other)),
        }
    }
}

impl ToCanonical for str {
    fn to_canonical(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl ToCanonical for String {
    fn to_canonical(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FromCanonical for String {
    fn from_canonical(value: &Value) -> Result<Self, CodecError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CodecError::expected(ValueKind::Text, value))
    }
}

impl<T: ToCanonical + ?Sized> ToCanonical for &T {
    fn to_canonical(&self) -> Value {
        (**self).to_canonical()
    }
}

impl<T: ToCanonical> ToCanonical for Option<T> {
    fn to_canonical(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToCanonical::to_canonical)
    }
}

impl<T: FromCanonical> FromCanonical for Option<T> {
    fn from_canonical(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_canonical(other).map(Some),
        }
    }
}

impl<T: ToCanonical> ToCanonical for [T] {
    fn to_canonical(&self) -> Value {
        Value::List(self.iter().map(ToCanonical::to_canonical).collect())
    }
}

impl<T: ToCanonical> ToCanonical for Vec<T> {
    fn to_canonical(&self) -> Value {
        self.as_slice().to_canonical()
    }
}

impl<T: FromCanonical> FromCanonical for Vec<T> {
    fn from_canonical(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::List(items) => items.iter().map(T::from_canonical).collect(),
            other => Err(CodecError::expected(ValueKind::List, other)),
        }
    }
}

impl<T: ToCanonical> ToCanonical for BTreeSet<T> {
    fn to_canonical(&self) -> Value {
        Value::set(self.iter().map(ToCanonical::to_canonical))
    }
}

impl<T: FromCanonical + Ord> FromCanonical for BTreeSet<T> {
    fn from_canonical(value: &Value) -> Result<Self, CodecError> {
        Vec::<T>::from_canonical(value).map(|items| items.into_iter().collect())
    }
}

impl<T: ToCanonical> ToCanonical for BTreeMap<String, T> {
    fn to_canonical(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_canonical()))
                .collect(),
        )
    }
}

impl<T: FromCanonical> FromCanonical for BTreeMap<String, T> {
    fn from_canonical(value: &Value) -> Result<Self, CodecError> {
        require_map(value)?
            .iter()
            .map(|(k, v)| T::from_canonical(v).map(|v| (k.clone(), v)))
            .collect()
    }
}

impl ToCanonical for DateTime<Utc> {
    fn to_canonical(&self) -> Value {
        Value::timestamp(self)
    }
}

impl FromCanonical for DateTime<Utc> {
    fn from_canonical(value: &Value) -> Result<Self, CodecError> {
        let text = String::from_canonical(value)?;
        nodetape_core::time::parse_rfc3339(&text)
            .map_err(|e| CodecError::invalid(format!("timestamp {:?}: {}", text, e)))
    }
}
