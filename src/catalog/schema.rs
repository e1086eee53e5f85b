//! Schema definitions for colstore
//!
//! This module defines the schema descriptor handed in by ingestion code and
//! the table/column metadata the catalog keeps for every table.

use super::types::DataType;
use crate::error::{Error, Result};
use crate::storage::{CompressionCodec, EncodingStrategy, Value};
use arrow::datatypes::{Field, Schema as ArrowSchema, SchemaRef};
use arrow::record_batch::RecordBatch;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Size estimate factor used for the static compression ratio
const COMPRESSED_SIZE_FACTOR: f64 = 1.2;

/// One column of a schema descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name
    pub name: String,
    /// Logical type
    pub data_type: DataType,
    /// Is this column nullable?
    pub nullable: bool,
}

impl ColumnSchema {
    /// Create a nullable column
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Set nullable flag
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Build the Arrow schema for a descriptor
pub fn arrow_schema(columns: &[ColumnSchema]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|c| Field::new(&c.name, c.data_type.to_arrow(), c.nullable))
        .collect();
    Arc::new(ArrowSchema::new(fields))
}

/// Check that a batch carries exactly the described columns, in order
pub fn validate_batch(columns: &[ColumnSchema], batch: &RecordBatch) -> Result<()> {
    let schema = batch.schema();
    if schema.fields().len() != columns.len() {
        return Err(Error::SchemaMismatch(format!(
            "descriptor has {} columns, batch has {}",
            columns.len(),
            schema.fields().len()
        )));
    }

    for (column, field) in columns.iter().zip(schema.fields().iter()) {
        if column.name != *field.name() {
            return Err(Error::SchemaMismatch(format!(
                "expected column '{}', batch has '{}'",
                column.name,
                field.name()
            )));
        }
        if column.data_type.to_arrow() != *field.data_type() {
            return Err(Error::SchemaMismatch(format!(
                "column '{}' declared {} but batch holds {}",
                column.name,
                column.data_type,
                field.data_type()
            )));
        }
        if !column.nullable && batch.column(schema.index_of(&column.name)?).null_count() > 0 {
            return Err(Error::SchemaMismatch(format!(
                "column '{}' is NOT NULL but contains nulls",
                column.name
            )));
        }
    }

    Ok(())
}

/// Per-column metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: DataType,
    /// Codec the table file is written with
    pub compression: CompressionCodec,
    /// Advisory encoding strategy
    pub encoding: EncodingStrategy,
    pub null_count: usize,
    pub distinct_count: usize,
    pub min_value: Option<Value>,
    pub max_value: Option<Value>,
    pub avg_value: Option<f64>,
    pub size_bytes: usize,
    /// Static estimate computed at creation, never re-derived
    pub compression_ratio: f64,
}

impl ColumnMetadata {
    /// Estimated compression ratio for a column of `size_bytes`
    pub fn estimate_compression_ratio(size_bytes: usize) -> f64 {
        if size_bytes == 0 {
            1.0
        } else {
            size_bytes as f64 / (size_bytes as f64 * COMPRESSED_SIZE_FACTOR)
        }
    }
}

/// Table metadata - everything the catalog knows about a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub total_size_bytes: usize,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
    /// Milliseconds since the Unix epoch
    pub last_updated: u64,
    /// Column metadata in schema order
    pub columns: IndexMap<String, ColumnMetadata>,
    /// Unused, reserved for partitioned layouts
    pub partitions: Vec<String>,
    /// Unused, reserved for secondary indexes
    pub indexes: HashMap<String, Vec<String>>,
    /// Location of the persisted table file
    pub data_file: PathBuf,
    /// Bumped on every re-create; part of the data file name
    #[serde(default)]
    pub version: u64,
}

impl TableMetadata {
    /// Assemble table metadata; counts and sizes are derived from `columns`
    pub fn new(
        name: impl Into<String>,
        row_count: usize,
        columns: IndexMap<String, ColumnMetadata>,
        data_file: PathBuf,
        timestamp_ms: u64,
    ) -> Self {
        let total_size_bytes = columns.values().map(|c| c.size_bytes).sum();
        Self {
            name: name.into(),
            row_count,
            column_count: columns.len(),
            total_size_bytes,
            created_at: timestamp_ms,
            last_updated: timestamp_ms,
            columns,
            partitions: Vec::new(),
            indexes: HashMap::new(),
            data_file,
            version: 1,
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Get the table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get column by name
    pub fn get_column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.get(name)
    }

    /// Check if column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Get column names in schema order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    /// Check the structural invariants of the metadata
    pub fn is_consistent(&self) -> bool {
        self.column_count == self.columns.len()
            && self.total_size_bytes == self.columns.values().map(|c| c.size_bytes).sum::<usize>()
            && self
                .columns
                .values()
                .all(|c| c.compression_ratio > 0.0 && c.compression_ratio <= 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array, StringArray};

    fn column(name: &str, size_bytes: usize) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_string(),
            data_type: DataType::BigInt,
            compression: CompressionCodec::Snappy,
            encoding: EncodingStrategy::Delta,
            null_count: 0,
            distinct_count: 0,
            min_value: None,
            max_value: None,
            avg_value: None,
            size_bytes,
            compression_ratio: ColumnMetadata::estimate_compression_ratio(size_bytes),
        }
    }

    #[test]
    fn test_table_metadata_totals() {
        let mut columns = IndexMap::new();
        columns.insert("id".to_string(), column("id", 64));
        columns.insert("age".to_string(), column("age", 128));

        let meta = TableMetadata::new("t", 3, columns, PathBuf::from("t.parquet"), 1);

        assert_eq!(meta.column_count, 2);
        assert_eq!(meta.total_size_bytes, 192);
        assert_eq!(meta.column_names(), vec!["id", "age"]);
        assert!(meta.is_consistent());
    }

    #[test]
    fn test_compression_ratio_bounds() {
        let ratio = ColumnMetadata::estimate_compression_ratio(1000);
        assert!((ratio - 1.0 / 1.2).abs() < 1e-12);
        assert_eq!(ColumnMetadata::estimate_compression_ratio(0), 1.0);
    }

    #[test]
    fn test_validate_batch() {
        let schema = vec![
            ColumnSchema::new("id", DataType::BigInt).nullable(false),
            ColumnSchema::new("name", DataType::Text),
        ];
        let batch = RecordBatch::try_new(
            arrow_schema(&schema),
            vec![
                Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
                Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef,
            ],
        )
        .unwrap();
        assert!(validate_batch(&schema, &batch).is_ok());

        let wrong = vec![
            ColumnSchema::new("id", DataType::Integer),
            ColumnSchema::new("name", DataType::Text),
        ];
        assert!(matches!(
            validate_batch(&wrong, &batch),
            Err(Error::SchemaMismatch(_))
        ));
        assert!(matches!(
            validate_batch(&schema[..1], &batch),
            Err(Error::SchemaMismatch(_))
        ));
    }
}
