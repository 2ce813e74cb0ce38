//! SQL values exchanged with the engine, in both directions.
//!
//! [`Value`] is what assignments bind as parameters and what raw rows carry
//! back. [`FromValue`] and [`RowValues`] turn them into Rust types for
//! entity constructors.

use miniserde::json::{self, Array, Number, Object};

use crate::error::{Error, Result};

/// SQL parameter and result values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean (stored as 0/1 on `SQLite`).
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// Double precision float.
    Float(f64),
    /// Text.
    String(String),
    /// Binary blob.
    Bytes(Vec<u8>),
    /// List of values, only meaningful as an `IN` operand.
    Array(Vec<Value>),
}

impl Value {
    /// Name of the variant, used in decode errors.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Array(_) => "array",
        }
    }

    /// Whether this is SQL `NULL`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer payload, if any.
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert into a miniserde JSON value.
    ///
    /// Bytes become an array of numbers; non-finite floats become `null`.
    pub fn to_json(&self) -> json::Value {
        match self {
            Self::Null => json::Value::Null,
            Self::Bool(b) => json::Value::Bool(*b),
            Self::Int(i) => json::Value::Number(Number::I64(*i)),
            Self::Float(f) if f.is_finite() => json::Value::Number(Number::F64(*f)),
            Self::Float(_) => json::Value::Null,
            Self::String(s) => json::Value::String(s.clone()),
            Self::Bytes(bytes) => {
                let mut array = Array::new();
                array.extend(
                    bytes
                        .iter()
                        .map(|b| json::Value::Number(Number::U64(u64::from(*b)))),
                );
                json::Value::Array(array)
            },
            Self::Array(values) => {
                let mut array = Array::new();
                array.extend(values.iter().map(Self::to_json));
                json::Value::Array(array)
            },
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "'{s}'"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Array(values) => write!(f, "<{} values>", values.len()),
        }
    }
}

/// Build a JSON object from ordered name/value pairs.
pub(crate) fn json_object<'a, I>(entries: I) -> json::Value
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    let mut object = Object::new();
    for (name, value) in entries {
        object.insert(name.to_string(), value.to_json());
    }
    json::Value::Object(object)
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Conversion from a returned [`Value`] into a Rust type.
pub trait FromValue: Sized {
    /// Convert, failing with [`Error::Decode`] on a type mismatch.
    fn from_value(value: Value) -> Result<Self>;
}

const fn decode_error(expected: &'static str, found: &Value) -> Error {
    Error::Decode {
        expected,
        found: found.type_name(),
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(decode_error("i64", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => Self::try_from(i).map_err(|_| decode_error("i32", &value)),
            other => Err(decode_error("i32", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(i) => Ok(i as Self),
            other => Err(decode_error("f64", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            // SQLite has no boolean storage class
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => Err(decode_error("bool", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(decode_error("string", &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(decode_error("bytes", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Positional reader over one row's values, in catalog order.
///
/// Entity constructors pull their fields off in declaration order:
///
/// ```
/// use update_returning::{RowValues, Value};
///
/// let mut row = RowValues::new(vec![Value::Int(7), Value::String("ada".into())]);
/// let id: i64 = row.next_value().unwrap();
/// let name: String = row.next_value().unwrap();
/// assert_eq!((id, name.as_str()), (7, "ada"));
/// ```
#[derive(Debug)]
pub struct RowValues {
    inner: std::vec::IntoIter<Value>,
}

impl RowValues {
    /// Wrap an ordered value list.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            inner: values.into_iter(),
        }
    }

    /// Values not yet consumed.
    pub fn remaining(&self) -> usize {
        self.inner.len()
    }

    /// Decode the next value.
    pub fn next_value<T: FromValue>(&mut self) -> Result<T> {
        let value = self.inner.next().ok_or(Error::Decode {
            expected: std::any::type_name::<T>(),
            found: "end of row",
        })?;
        T::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_conversions() {
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(5i64)), Value::Int(5));
    }

    #[test]
    fn test_bool_decodes_from_sqlite_integers() {
        assert!(bool::from_value(Value::Int(1)).unwrap());
        assert!(!bool::from_value(Value::Int(0)).unwrap());
        assert!(bool::from_value(Value::Int(2)).is_err());
    }

    #[test]
    fn test_decode_mismatch_reports_types() {
        let err = i64::from_value(Value::String("x".into())).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                expected: "i64",
                found: "string"
            }
        ));
    }

    #[test]
    fn test_i32_overflow_is_decode_error() {
        assert!(i32::from_value(Value::Int(i64::MAX)).is_err());
    }

    #[test]
    fn test_option_decodes_null() {
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i64>::from_value(Value::Int(3)).unwrap(), Some(3));
    }

    #[test]
    fn test_row_values_runs_out() {
        let mut row = RowValues::new(vec![Value::Int(1)]);
        assert_eq!(row.next_value::<i64>().unwrap(), 1);
        assert_eq!(row.remaining(), 0);
        assert!(row.next_value::<i64>().is_err());
    }

    #[test]
    fn test_to_json() {
        let rendered = json::to_string(&Value::Int(5).to_json());
        assert_eq!(rendered, "5");
        let rendered = json::to_string(&Value::String("a".into()).to_json());
        assert_eq!(rendered, "\"a\"");
        assert_eq!(json::to_string(&Value::Float(f64::NAN).to_json()), "null");
    }
}
