//! Field values and field types
//!
//! `Value` is the dynamic representation of one record field. `FieldType`
//! is the type tag a schema declares for a field. Scalar values convert to
//! tuple elements for keys; message values (nested records) do not.

use crate::record::Record;
use crate::tuple::TupleElement;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Declared type of a record field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Signed 64-bit integer
    Int,
    /// Unsigned 64-bit integer
    Uint,
    /// 64-bit float
    Double,
    /// Boolean
    Bool,
    /// UTF-8 string
    String,
    /// Raw bytes
    Bytes,
    /// Nested message of the named message type
    Message(String),
}

impl FieldType {
    /// True for every type except nested messages
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldType::Message(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "int"),
            FieldType::Uint => write!(f, "uint"),
            FieldType::Double => write!(f, "double"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::String => write!(f, "string"),
            FieldType::Bytes => write!(f, "bytes"),
            FieldType::Message(name) => write!(f, "message {}", name),
        }
    }
}

/// Dynamic value of one record field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Explicitly absent
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    Uint(u64),
    /// Float
    Double(f64),
    /// String
    String(String),
    /// Bytes
    Bytes(Vec<u8>),
    /// Nested message
    Message(Record),
}

impl Value {
    /// Short name of the value's kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Message(_) => "message",
        }
    }

    /// True for [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Nested record, if this is a message value
    pub fn as_message(&self) -> Option<&Record> {
        match self {
            Value::Message(record) => Some(record),
            _ => None,
        }
    }

    /// True if the value can be stored in a field of type `ty` without conversion
    pub fn matches_type(&self, ty: &FieldType) -> bool {
        match (self, ty) {
            (Value::Null, _) => true,
            (Value::Bool(_), FieldType::Bool)
            | (Value::Int(_), FieldType::Int)
            | (Value::Uint(_), FieldType::Uint)
            | (Value::Double(_), FieldType::Double)
            | (Value::String(_), FieldType::String)
            | (Value::Bytes(_), FieldType::Bytes) => true,
            (Value::Message(record), FieldType::Message(name)) => record.type_name() == name,
            _ => false,
        }
    }

    /// Convert to `ty` when that is lossless
    ///
    /// Integer literals are accepted for `uint` fields when non-negative and
    /// for `double` fields when exactly representable.
    pub fn coerce_to(&self, ty: &FieldType) -> Option<Value> {
        if self.matches_type(ty) {
            return Some(self.clone());
        }
        match (self, ty) {
            (Value::Int(v), FieldType::Uint) => u64::try_from(*v).ok().map(Value::Uint),
            (Value::Uint(v), FieldType::Int) => i64::try_from(*v).ok().map(Value::Int),
            (Value::Int(v), FieldType::Double) => {
                let d = *v as f64;
                (d as i64 == *v).then_some(Value::Double(d))
            }
            (Value::Uint(v), FieldType::Double) => {
                let d = *v as f64;
                (d as u64 == *v).then_some(Value::Double(d))
            }
            _ => None,
        }
    }

    /// Key-codec element for a scalar value; `None` for messages
    pub fn to_tuple_element(&self) -> Option<TupleElement> {
        match self {
            Value::Null => Some(TupleElement::Null),
            Value::Bool(v) => Some(TupleElement::Bool(*v)),
            Value::Int(v) => Some(TupleElement::Int(*v)),
            Value::Uint(v) => Some(TupleElement::Uint(*v)),
            Value::Double(v) => Some(TupleElement::Double(*v)),
            Value::String(v) => Some(TupleElement::String(v.clone())),
            Value::Bytes(v) => Some(TupleElement::Bytes(v.clone())),
            Value::Message(_) => None,
        }
    }

    /// Inverse of [`Value::to_tuple_element`]
    pub fn from_tuple_element(element: &TupleElement) -> Value {
        match element {
            TupleElement::Null => Value::Null,
            TupleElement::Bool(v) => Value::Bool(*v),
            TupleElement::Int(v) => Value::Int(*v),
            TupleElement::Uint(v) => Value::Uint(*v),
            TupleElement::Double(v) => Value::Double(*v),
            TupleElement::String(v) => Value::String(v.clone()),
            TupleElement::Bytes(v) => Value::Bytes(v.clone()),
        }
    }

    /// Compare two non-null scalar values of compatible kinds
    ///
    /// Returns `None` for nulls, messages, and incompatible kinds. Integers
    /// and doubles compare numerically across kinds. Two doubles use IEEE
    /// total order, the same order their key encoding sorts in.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Uint(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Value::Uint(a), Value::Int(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Value::Double(a), Value::Double(b)) => Some(a.total_cmp(b)),
            (Value::Double(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Int(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
            (Value::Double(a), Value::Uint(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Uint(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Uint(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{:?}", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Message(record) => write!(f, "{}", record),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Message(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_int_literal_to_uint() {
        assert_eq!(Value::Int(5).coerce_to(&FieldType::Uint), Some(Value::Uint(5)));
        assert_eq!(Value::Int(-1).coerce_to(&FieldType::Uint), None);
        assert_eq!(Value::Uint(u64::MAX).coerce_to(&FieldType::Int), None);
    }

    #[test]
    fn test_coerce_rejects_cross_kind() {
        assert_eq!(Value::from("50").coerce_to(&FieldType::Int), None);
        assert_eq!(Value::Bool(true).coerce_to(&FieldType::String), None);
    }

    #[test]
    fn test_null_matches_any_type() {
        assert!(Value::Null.matches_type(&FieldType::Int));
        assert!(Value::Null.matches_type(&FieldType::Message("Flower".into())));
    }

    #[test]
    fn test_message_matches_by_type_name() {
        let flower = Value::from(Record::new("Flower").with("type", "ROSE"));
        assert!(flower.matches_type(&FieldType::Message("Flower".into())));
        assert!(!flower.matches_type(&FieldType::Message("Order".into())));
        assert!(flower.to_tuple_element().is_none());
    }

    #[test]
    fn test_compare_numeric_across_kinds() {
        assert_eq!(Value::Int(-1).compare(&Value::Uint(0)), Some(Ordering::Less));
        assert_eq!(Value::Double(2.5).compare(&Value::Int(2)), Some(Ordering::Greater));
        assert_eq!(Value::Int(3).compare(&Value::from("3")), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn test_tuple_element_conversion() {
        for v in [Value::Int(-9), Value::Uint(9), Value::from("x"), Value::Bool(true), Value::Null] {
            let element = v.to_tuple_element().unwrap();
            assert_eq!(Value::from_tuple_element(&element), v);
        }
    }

    #[test]
    fn test_value_msgpack_roundtrip_nested() {
        let v = Value::from(Record::new("Flower").with("type", "ROSE"));
        let bytes = rmp_serde::to_vec_named(&v).unwrap();
        let back: Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, v);
    }
}
