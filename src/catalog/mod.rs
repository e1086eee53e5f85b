//! Catalog module
//!
//! This module contains the metadata catalog, schema descriptors and data types.

pub mod catalog;
pub mod schema;
pub mod types;

pub use catalog::MetadataCatalog;
pub use schema::{
    arrow_schema, validate_batch, ColumnMetadata, ColumnSchema, TableMetadata,
};
pub use types::DataType;

/// The in-memory batch handed to the engine by ingestion code
pub type ColumnBatch = arrow::record_batch::RecordBatch;
