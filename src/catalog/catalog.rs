//! Metadata catalog for colstore
//!
//! This module owns table and column metadata. Statistics are computed once,
//! when a table is created, and entries are published as immutable
//! `Arc<TableMetadata>` snapshots so readers never see a half-built entry.

use super::schema::{validate_batch, ColumnMetadata, ColumnSchema, TableMetadata};
use crate::error::{Error, Result};
use crate::storage::{ColumnProfile, CompressionAdvisor, CompressionCodec};
use arrow::record_batch::RecordBatch;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Metadata catalog - registry of all tables
#[derive(Debug, Default)]
pub struct MetadataCatalog {
    /// Table metadata by name
    tables: RwLock<HashMap<String, Arc<TableMetadata>>>,
    /// Serializes writers of the catalog file
    persist_lock: Mutex<()>,
}

impl MetadataCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute metadata for a batch without registering it
    pub fn build_metadata(
        name: &str,
        schema: &[ColumnSchema],
        batch: &RecordBatch,
        advisor: &CompressionAdvisor,
        codec: CompressionCodec,
        data_file: PathBuf,
    ) -> Result<TableMetadata> {
        validate_batch(schema, batch)?;

        let mut columns = IndexMap::with_capacity(schema.len());
        for (column, array) in schema.iter().zip(batch.columns()) {
            let profile = ColumnProfile::scan(array.as_ref())?;
            let encoding = advisor.strategy_for(&profile);

            columns.insert(
                column.name.clone(),
                ColumnMetadata {
                    name: column.name.clone(),
                    data_type: column.data_type,
                    compression: codec,
                    encoding,
                    null_count: profile.null_count,
                    distinct_count: profile.distinct_count,
                    min_value: profile.min,
                    max_value: profile.max,
                    avg_value: profile.mean,
                    size_bytes: profile.size_bytes,
                    compression_ratio: ColumnMetadata::estimate_compression_ratio(
                        profile.size_bytes,
                    ),
                },
            );
        }

        Ok(TableMetadata::new(
            name,
            batch.num_rows(),
            columns,
            data_file,
            current_millis(),
        ))
    }

    /// Publish metadata, replacing any previous entry of the same name
    pub fn register(&self, metadata: TableMetadata) -> Arc<TableMetadata> {
        let metadata = Arc::new(metadata);
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.insert(metadata.name.clone(), metadata.clone());
        metadata
    }

    /// Compute statistics for a batch and register the result
    pub fn create_table(
        &self,
        name: &str,
        schema: &[ColumnSchema],
        batch: &RecordBatch,
        advisor: &CompressionAdvisor,
        codec: CompressionCodec,
        data_file: PathBuf,
    ) -> Result<Arc<TableMetadata>> {
        let metadata = Self::build_metadata(name, schema, batch, advisor, codec, data_file)?;
        Ok(self.register(metadata))
    }

    /// Get a table by name
    pub fn get(&self, name: &str) -> Result<Arc<TableMetadata>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Check if a table exists
    pub fn contains(&self, name: &str) -> bool {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.contains_key(name)
    }

    /// List all table names, sorted
    pub fn list_tables(&self) -> Vec<String> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tables
    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Durably write the catalog with `metadata` in place, then publish it.
    ///
    /// Memory changes only after the file is synced and renamed, so a failed
    /// write leaves both the file and any previous entry untouched.
    pub fn commit(
        &self,
        path: impl AsRef<Path>,
        metadata: TableMetadata,
    ) -> Result<Arc<TableMetadata>> {
        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let metadata = Arc::new(metadata);
        let mut entries = self.snapshot();
        entries.retain(|t| t.name != metadata.name);
        entries.push(metadata.clone());
        write_catalog(path.as_ref(), entries)?;

        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(metadata.name.clone(), metadata.clone());
        Ok(metadata)
    }

    /// Save catalog to disk (temp file, fsync, rename)
    pub fn save_to_disk(&self, path: impl AsRef<Path>) -> Result<()> {
        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        write_catalog(path.as_ref(), self.snapshot())
    }

    /// Every registered entry
    pub fn snapshot(&self) -> Vec<Arc<TableMetadata>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Load catalog from disk
    pub fn load_from_disk(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let data: CatalogData = serde_json::from_str(&json)?;

        let tables = data
            .tables
            .into_iter()
            .map(|t| (t.name.clone(), Arc::new(t)))
            .collect();

        Ok(Self {
            tables: RwLock::new(tables),
            persist_lock: Mutex::new(()),
        })
    }

    /// Drop entries whose table file no longer exists; returns their names
    pub fn retain_existing_files(&self) -> Vec<String> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let missing: Vec<String> = tables
            .values()
            .filter(|t| !t.data_file.exists())
            .map(|t| t.name.clone())
            .collect();
        for name in &missing {
            tables.remove(name);
        }
        missing
    }
}

/// On-disk form of the catalog
#[derive(serde::Deserialize)]
struct CatalogData {
    tables: Vec<TableMetadata>,
}

#[derive(serde::Serialize)]
struct CatalogSnapshot<'a> {
    tables: Vec<&'a TableMetadata>,
}

fn write_catalog(path: &Path, mut tables: Vec<Arc<TableMetadata>>) -> Result<()> {
    tables.sort_by(|a, b| a.name.cmp(&b.name));
    let json = serde_json::to_vec_pretty(&CatalogSnapshot {
        tables: tables.iter().map(|t| t.as_ref()).collect(),
    })?;

    let tmp = path.with_extension("json.tmp");
    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(&json)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, path));

    written.map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::Persistence(format!("cannot write catalog {}: {}", path.display(), e))
    })
}

/// Milliseconds since the Unix epoch
pub(crate) fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
