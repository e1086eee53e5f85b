//! Scalar values for colstore
//!
//! Columns live in Arrow arrays; this module defines the owned scalar used
//! for statistics (min/max), distinct counting and query literals.

use crate::error::{Error, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType as ArrowType, Date32Type, Float32Type, Float64Type, Int32Type, Int64Type, TimeUnit,
    TimestampMillisecondType,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single cell value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value (32-bit)
    Integer(i32),
    /// Big integer value (64-bit)
    BigInt(i64),
    /// Float value (64-bit)
    Float(f64),
    /// String value
    String(String),
    /// Date value (days since epoch)
    Date(i32),
    /// Timestamp value (milliseconds since epoch)
    Timestamp(i64),
}

// Floats compare bitwise so values can live in hash sets
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(v) => v.hash(state),
            Value::Integer(v) => v.hash(state),
            Value::BigInt(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::Timestamp(v) => v.hash(state),
        }
    }
}

impl Value {
    /// Read row `row` of an Arrow array
    pub fn from_array(array: &dyn Array, row: usize) -> Result<Value> {
        if array.is_null(row) {
            return Ok(Value::Null);
        }

        let value = match array.data_type() {
            ArrowType::Boolean => Value::Boolean(array.as_boolean().value(row)),
            ArrowType::Int32 => Value::Integer(array.as_primitive::<Int32Type>().value(row)),
            ArrowType::Int64 => Value::BigInt(array.as_primitive::<Int64Type>().value(row)),
            ArrowType::Float32 => {
                Value::Float(array.as_primitive::<Float32Type>().value(row) as f64)
            }
            ArrowType::Float64 => Value::Float(array.as_primitive::<Float64Type>().value(row)),
            ArrowType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
            ArrowType::Date32 => Value::Date(array.as_primitive::<Date32Type>().value(row)),
            ArrowType::Timestamp(TimeUnit::Millisecond, _) => {
                Value::Timestamp(array.as_primitive::<TimestampMillisecondType>().value(row))
            }
            other => return Err(Error::UnsupportedType(other.to_string())),
        };
        Ok(value)
    }

    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to convert to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::BigInt(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to convert to string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Boolean(_) => "BOOLEAN",
            Value::Integer(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Float(_) => "FLOAT",
            Value::String(_) => "STRING",
            Value::Date(_) => "DATE",
            Value::Timestamp(_) => "TIMESTAMP",
        }
    }

    /// Compare two values (used for min/max tracking)
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less), // NULL is less than everything
            (_, Value::Null) => Some(Ordering::Greater),

            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),

            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::BigInt(b)) => Some((*a as i64).cmp(b)),
            (Value::BigInt(a), Value::Integer(b)) => Some(a.cmp(&(*b as i64))),
            (Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(b)),

            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::BigInt(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::BigInt(b)) => a.partial_cmp(&(*b as f64)),

            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),

            _ => None, // Incompatible types
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Integer(i) => write!(f, "{}", i),
            Value::BigInt(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "DATE({})", d),
            Value::Timestamp(t) => write!(f, "TIMESTAMP({})", t),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int32Array, StringArray};

    #[test]
    fn test_value_comparison() {
        assert_eq!(
            Value::Integer(5).compare(&Value::BigInt(3)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::String("abc".to_string()).compare(&Value::String("def".to_string())),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Null.compare(&Value::Integer(1)), Some(Ordering::Less));
        assert_eq!(Value::Boolean(true).compare(&Value::Integer(1)), None);
    }

    #[test]
    fn test_from_array() {
        let ints = Int32Array::from(vec![Some(7), None]);
        assert_eq!(Value::from_array(&ints, 0).unwrap(), Value::Integer(7));
        assert!(Value::from_array(&ints, 1).unwrap().is_null());

        let names = StringArray::from(vec!["ada"]);
        assert_eq!(Value::from_array(&names, 0).unwrap(), Value::from("ada"));

        let floats = Float64Array::from(vec![2.5]);
        assert_eq!(Value::from_array(&floats, 0).unwrap().as_f64(), Some(2.5));
    }

    #[test]
    fn test_float_hashing() {
        use std::collections::HashSet;
        let set: HashSet<Value> = [Value::Float(1.0), Value::Float(1.0), Value::Float(2.0)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }
}
