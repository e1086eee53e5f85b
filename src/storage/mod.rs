//! Storage module
//!
//! This module contains the storage components:
//! - Scalar values and single-pass column profiling
//! - The compression advisor
//! - Parquet table files
//! - Encoded query results

pub mod compression;
pub mod disk;
pub mod profile;
pub mod result;
pub mod value;

pub use compression::{CompressionAdvice, CompressionAdvisor, CompressionCodec, EncodingStrategy};
pub use disk::{DiskManager, WriteOptions, DEFAULT_ROW_GROUP_SIZE};
pub use profile::ColumnProfile;
pub use result::ResultSet;
pub use value::Value;
