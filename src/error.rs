//! Error types for colstore
//!
//! This module defines all error types used throughout the engine.

use thiserror::Error;

/// The main error type for colstore
#[derive(Error, Debug)]
pub enum Error {
    // ========== Lexer Errors ==========
    #[error("Lexer error: unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),

    #[error("Lexer error: unterminated string literal starting at position {0}")]
    UnterminatedString(usize),

    #[error("Lexer error: invalid number format at position {0}")]
    InvalidNumber(usize),

    // ========== Query Errors ==========
    #[error("Parse error: unexpected token '{found}', expected {expected}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Parse error: unexpected end of input, expected {0}")]
    UnexpectedEof(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    // ========== Catalog Errors ==========
    #[error("Catalog error: table '{0}' not found")]
    TableNotFound(String),

    #[error("Catalog error: column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Catalog error: invalid table name '{0}'")]
    InvalidTableName(String),

    #[error("Catalog error: schema mismatch - {0}")]
    SchemaMismatch(String),

    // ========== Type Errors ==========
    #[error("Type error: cannot compare {from} with {to}")]
    TypeMismatch { from: String, to: String },

    #[error("Type error: unsupported column type {0}")]
    UnsupportedType(String),

    // ========== Cache Errors ==========
    #[error("Cache error: entry of {requested} bytes exceeds capacity of {capacity} bytes")]
    CapacityExceeded { requested: u64, capacity: u64 },

    // ========== Persistence Errors ==========
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ========== Execution Errors ==========
    #[error("Execution error: query on table '{table}' timed out after {timeout_ms} ms")]
    QueryTimeout { table: String, timeout_ms: u64 },

    #[error("Execution error: query on table '{0}' was cancelled")]
    Cancelled(String),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for the "unknown table" family of errors
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::TableNotFound(_))
    }

    /// True for failures while reading or writing table files
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Error::Persistence(_)
                | Error::Io(_)
                | Error::Arrow(_)
                | Error::Parquet(_)
                | Error::Serialization(_)
        )
    }
}

/// Result type alias for colstore operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TableNotFound("ghost".to_string());
        assert_eq!(err.to_string(), "Catalog error: table 'ghost' not found");
        assert!(err.is_not_found());

        let err = Error::UnexpectedCharacter('@', 5);
        assert_eq!(
            err.to_string(),
            "Lexer error: unexpected character '@' at position 5"
        );
    }

    #[test]
    fn test_error_families() {
        let io = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(io.is_persistence());
        assert!(!io.is_not_found());

        let cap = Error::CapacityExceeded {
            requested: 10,
            capacity: 5,
        };
        assert!(!cap.is_persistence());
        assert_eq!(
            cap.to_string(),
            "Cache error: entry of 10 bytes exceeds capacity of 5 bytes"
        );
    }
}
