//! Data types for colstore
//!
//! This module defines the logical column types accepted in a schema
//! descriptor and how they map onto Arrow's physical types.

use arrow::datatypes::{DataType as ArrowType, TimeUnit};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Boolean type
    Boolean,
    /// Integer (32-bit)
    Integer,
    /// Big integer (64-bit)
    BigInt,
    /// Single-precision floating point
    Float,
    /// Double-precision floating point
    Double,
    /// UTF-8 text
    Text,
    /// Date (days since epoch)
    Date,
    /// Timestamp (milliseconds since epoch)
    Timestamp,
}

impl DataType {
    /// Get the size in bytes for this type (for fixed-size types)
    pub fn size(&self) -> Option<usize> {
        match self {
            DataType::Boolean => Some(1),
            DataType::Integer => Some(4),
            DataType::BigInt => Some(8),
            DataType::Float => Some(4),
            DataType::Double => Some(8),
            DataType::Date => Some(4),
            DataType::Timestamp => Some(8),
            DataType::Text => None,
        }
    }

    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Integer | DataType::BigInt | DataType::Float | DataType::Double
        )
    }

    /// Check if this type is a string type
    pub fn is_string(&self) -> bool {
        matches!(self, DataType::Text)
    }

    /// Check if this type is a date/time type
    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::Timestamp)
    }

    /// The Arrow type a column of this logical type is stored as
    pub fn to_arrow(&self) -> ArrowType {
        match self {
            DataType::Boolean => ArrowType::Boolean,
            DataType::Integer => ArrowType::Int32,
            DataType::BigInt => ArrowType::Int64,
            DataType::Float => ArrowType::Float32,
            DataType::Double => ArrowType::Float64,
            DataType::Text => ArrowType::Utf8,
            DataType::Date => ArrowType::Date32,
            DataType::Timestamp => ArrowType::Timestamp(TimeUnit::Millisecond, None),
        }
    }

    /// Map an Arrow type back to a logical type, if supported
    pub fn from_arrow(arrow_type: &ArrowType) -> Option<Self> {
        match arrow_type {
            ArrowType::Boolean => Some(DataType::Boolean),
            ArrowType::Int32 => Some(DataType::Integer),
            ArrowType::Int64 => Some(DataType::BigInt),
            ArrowType::Float32 => Some(DataType::Float),
            ArrowType::Float64 => Some(DataType::Double),
            ArrowType::Utf8 => Some(DataType::Text),
            ArrowType::Date32 => Some(DataType::Date),
            ArrowType::Timestamp(TimeUnit::Millisecond, _) => Some(DataType::Timestamp),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}
