//! Engine configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use crate::cache::CacheConfig;
use crate::error::{Error, Result};
use crate::executor::planner::DEFAULT_MAX_PARALLEL_DEGREE;
use crate::executor::PredicatePolicy;
use crate::storage::{CompressionCodec, WriteOptions, DEFAULT_ROW_GROUP_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a [`crate::engine::StorageEngine`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory for table files and the catalog
    pub data_dir: PathBuf,
    pub cache: CacheConfig,
    /// Codec for table files
    pub compression: CompressionCodec,
    /// Rows per Parquet row group
    pub row_group_size: usize,
    /// Deadline for loading and filtering a table; `None` waits forever
    pub query_timeout_ms: Option<u64>,
    /// Reject unsupported WHERE clauses instead of ignoring them
    pub strict_predicates: bool,
    pub max_parallel_degree: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            cache: CacheConfig::default(),
            compression: CompressionCodec::default(),
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            query_timeout_ms: None,
            strict_predicates: false,
            max_parallel_degree: DEFAULT_MAX_PARALLEL_DEGREE,
        }
    }
}

impl EngineConfig {
    /// Default configuration rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Persistence(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn with_cache_capacity(mut self, l1_bytes: u64, l2_bytes: u64) -> Self {
        self.cache = CacheConfig::new(l1_bytes, l2_bytes);
        self
    }

    pub fn with_compression(mut self, codec: CompressionCodec) -> Self {
        self.compression = codec;
        self
    }

    pub fn with_row_group_size(mut self, rows: usize) -> Self {
        self.row_group_size = rows;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_strict_predicates(mut self, strict: bool) -> Self {
        self.strict_predicates = strict;
        self
    }

    pub fn with_max_parallel_degree(mut self, degree: usize) -> Self {
        self.max_parallel_degree = degree;
        self
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }

    pub fn predicate_policy(&self) -> PredicatePolicy {
        PredicatePolicy::from_strict(self.strict_predicates)
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            row_group_size: self.row_group_size,
            codec: self.compression,
        }
    }

    /// Location of the persisted catalog
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache.l1_capacity_bytes, 8 * 1024 * 1024 * 1024);
        assert_eq!(config.cache.l2_capacity_bytes, 16 * 1024 * 1024 * 1024);
        assert_eq!(config.row_group_size, 100_000);
        assert_eq!(config.compression, CompressionCodec::Snappy);
        assert_eq!(config.max_parallel_degree, 8);
        assert!(config.query_timeout().is_none());
        assert_eq!(config.predicate_policy(), PredicatePolicy::Lenient);
    }

    #[test]
    fn test_partial_json() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"data_dir": "/tmp/cs", "compression": "zstd", "cache": {"l1_capacity_bytes": 1024}}"#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/cs"));
        assert_eq!(config.compression, CompressionCodec::Zstd);
        assert_eq!(config.cache.l1_capacity_bytes, 1024);
        assert_eq!(config.cache.l2_capacity_bytes, 16 * 1024 * 1024 * 1024);
        assert!(!config.strict_predicates);
    }

    #[test]
    fn test_from_file_and_builders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let config = EngineConfig::new(dir.path())
            .with_query_timeout(Duration::from_millis(250))
            .with_strict_predicates(true)
            .with_row_group_size(10);
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.query_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(loaded.write_options().row_group_size, 10);
        assert_eq!(loaded.catalog_path(), dir.path().join("catalog.json"));

        assert!(EngineConfig::from_file(dir.path().join("missing.json")).is_err());
    }
}
