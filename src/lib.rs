//! colstore - A columnar data engine written in Rust
//!
//! This library provides the components of an analytical storage engine:
//! - Metadata catalog with per-column statistics
//! - Compression advisor (codec and encoding per column)
//! - Query front end (lexer, structural parser)
//! - Rule-based query planner and predicate executor
//! - Two-tier result cache with access prediction
//! - Storage engine tying them together over Parquet table files

pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod sql;
pub mod storage;

pub use cache::{CacheConfig, CacheStats, TieredCache};
pub use catalog::{ColumnBatch, ColumnSchema, DataType, MetadataCatalog, TableMetadata};
pub use config::EngineConfig;
pub use engine::{PerformanceStats, StorageEngine, TableState};
pub use error::{Error, Result};
pub use executor::{OptimizationResult, OptimizationRule, QueryPlanner};
pub use storage::{CompressionAdvisor, CompressionCodec, ResultSet};
