//! Storage engine
//!
//! Coordinates the catalog, the compression advisor, the planner, the
//! result cache and the table files.
//!
//! `create_table`: advise and profile, write a new versioned file, commit
//! the catalog file, publish metadata.
//! `query`: cache, then catalog lookup, plan, load and filter, cache again.
//!
//! One engine is opened per data directory and shared by handle
//! (`Arc<StorageEngine>`); there is no global instance.

mod locks;
mod metrics;

pub use locks::TableState;
pub use metrics::PerformanceStats;

use crate::cache::{CacheKey, TieredCache};
use crate::catalog::{ColumnBatch, ColumnSchema, MetadataCatalog, TableMetadata};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::executor::{filter_batch, resolve_predicate, OptimizationResult, QueryPlanner};
use crate::sql::Predicate;
use crate::storage::{CompressionAdvisor, DiskManager, ResultSet};
use arrow::record_batch::RecordBatch;
use locks::TableLocks;
use metrics::QueryMetrics;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Cache priority of query results
pub const RESULT_PRIORITY: u32 = 2;

const MAX_TABLE_NAME_LEN: usize = 128;

/// The columnar storage engine
#[derive(Debug)]
pub struct StorageEngine {
    config: EngineConfig,
    catalog: Arc<MetadataCatalog>,
    planner: QueryPlanner,
    advisor: CompressionAdvisor,
    cache: TieredCache,
    disk: DiskManager,
    locks: TableLocks,
    metrics: QueryMetrics,
}

impl StorageEngine {
    /// Open the engine, reloading the catalog of a previous run
    pub fn open(config: EngineConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            Error::Persistence(format!(
                "cannot create data directory {}: {}",
                config.data_dir.display(),
                e
            ))
        })?;
        let disk = DiskManager::open(&config.data_dir, config.write_options())?;

        let catalog_path = config.catalog_path();
        let catalog = if catalog_path.exists() {
            let catalog = MetadataCatalog::load_from_disk(&catalog_path)?;
            let missing = catalog.retain_existing_files();
            if !missing.is_empty() {
                warn!(tables = ?missing, "dropping catalog entries without a table file");
            }
            catalog
        } else {
            MetadataCatalog::new()
        };

        let referenced: HashSet<_> = catalog
            .snapshot()
            .iter()
            .map(|t| t.data_file.clone())
            .collect();
        let removed = disk.remove_unreferenced(&referenced)?;
        if removed > 0 {
            warn!(files = removed, "removed table files left by interrupted writes");
        }

        let planner =
            QueryPlanner::default().with_max_parallel_degree(config.max_parallel_degree);

        info!(
            data_dir = %config.data_dir.display(),
            tables = catalog.len(),
            cpus = planner.cpu_count(),
            "storage engine opened"
        );

        Ok(Self {
            cache: TieredCache::new(config.cache),
            catalog: Arc::new(catalog),
            planner,
            advisor: CompressionAdvisor::new(),
            disk,
            locks: TableLocks::default(),
            metrics: QueryMetrics::default(),
            config,
        })
    }

    /// Create (or re-create) a table from a batch.
    ///
    /// Each version gets its own file. The catalog file naming it is synced
    /// before the entry is published, so on any error the table is left
    /// exactly as it was: absent, or still serving the previous version.
    #[instrument(skip(self, schema, batch), fields(rows = batch.num_rows()))]
    pub async fn create_table(
        &self,
        name: &str,
        schema: &[ColumnSchema],
        batch: &ColumnBatch,
    ) -> Result<Arc<TableMetadata>> {
        validate_table_name(name)?;

        let _write = self.locks.write(name).await;
        let _creating = self.locks.begin_creating(name);

        let previous = self.catalog.get(name).ok();
        let version = previous.as_ref().map_or(1, |t| t.version + 1);
        let path = self.disk.table_path(name, version);

        let catalog = self.catalog.clone();
        let catalog_path = self.config.catalog_path();
        let disk = self.disk.clone();
        let advisor = self.advisor.clone();
        let codec = self.config.compression;
        let table = name.to_string();
        let schema = schema.to_vec();
        let batch = batch.clone();

        let metadata = tokio::task::spawn_blocking(move || -> Result<Arc<TableMetadata>> {
            let metadata = MetadataCatalog::build_metadata(
                &table,
                &schema,
                &batch,
                &advisor,
                codec,
                path.clone(),
            )?
            .with_version(version);
            disk.write_table(&path, &batch)?;

            let metadata = catalog.commit(&catalog_path, metadata).map_err(|err| {
                if let Err(cleanup) = disk.remove_table(&path) {
                    warn!(error = %cleanup, "uncommitted table file not removed");
                }
                err
            })?;

            if let Some(old) = previous.filter(|t| t.data_file != path) {
                if let Err(err) = disk.remove_table(&old.data_file) {
                    warn!(error = %err, "superseded table file not removed");
                }
            }
            Ok(metadata)
        })
        .await
        .map_err(|e| Error::Internal(format!("table writer task failed: {}", e)))??;

        let invalidated = self.cache.invalidate_table(name);

        info!(
            table = name,
            version,
            rows = metadata.row_count,
            columns = metadata.column_count,
            bytes = metadata.total_size_bytes,
            invalidated,
            "table created"
        );
        Ok(metadata)
    }

    /// Answer `query` against `table`.
    ///
    /// Cache hits return without planning and are not latency samples.
    #[instrument(skip(self))]
    pub async fn query(&self, query: &str, table: &str) -> Result<ResultSet> {
        let started = Instant::now();
        let key = CacheKey::new(query, table);

        if let Some(bytes) = self.cache.get(&key) {
            return ResultSet::from_bytes(bytes);
        }
        debug!(key = key.fingerprint(), "cache miss");

        if !self.catalog.contains(table) {
            return Err(Error::TableNotFound(table.to_string()));
        }
        let _read = self.locks.read(table).await;

        let metadata = self.catalog.get(table)?;
        let structure = self.planner.parse(query)?;
        let plan = self.planner.optimize_parsed(&structure, query, &metadata);
        debug!(
            rules = plan.optimizations.len(),
            estimated_improvement = plan.estimated_improvement,
            parallel_degree = plan.execution_plan.parallel_degree,
            "query planned"
        );
        let predicate = resolve_predicate(&structure, &metadata, self.config.predicate_policy())?;

        let batch = self.load_and_filter(&metadata, predicate).await?;
        let result = ResultSet::from_batch(batch)?;

        if let Err(err) = self
            .cache
            .set(key, result.as_bytes().clone(), RESULT_PRIORITY)
        {
            warn!(error = %err, "query result not cached");
        }

        let elapsed = started.elapsed();
        self.metrics.record(elapsed, result.num_rows());
        debug!(
            rows = result.num_rows(),
            latency_ms = elapsed.as_secs_f64() * 1000.0,
            "query answered"
        );
        Ok(result)
    }

    /// Plan a query without running it
    pub fn explain(&self, query: &str, table: &str) -> Result<OptimizationResult> {
        self.planner.plan(query, table, &self.catalog)
    }

    /// Read the table file and apply the predicate off the async runtime
    async fn load_and_filter(
        &self,
        metadata: &TableMetadata,
        predicate: Option<Predicate>,
    ) -> Result<RecordBatch> {
        let disk = self.disk.clone();
        let path = metadata.data_file.clone();
        let cancel = CancelOnDrop::default();
        let flag = cancel.0.clone();

        let task = tokio::task::spawn_blocking(move || {
            let batch = disk.read_table(&path, &flag)?;
            match predicate {
                Some(predicate) => filter_batch(&batch, &predicate),
                None => Ok(batch),
            }
        });

        let joined = match self.config.query_timeout() {
            Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
                Error::QueryTimeout {
                    table: metadata.name.clone(),
                    timeout_ms: limit.as_millis() as u64,
                }
            })?,
            None => task.await,
        };
        joined.map_err(|e| Error::Internal(format!("query task failed: {}", e)))?
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        self.metrics.snapshot(self.cache.stats())
    }

    pub fn table_state(&self, name: &str) -> TableState {
        if self.locks.is_creating(name) {
            TableState::Creating
        } else if self.catalog.contains(name) {
            TableState::Available
        } else {
            TableState::Uncreated
        }
    }

    /// Cache keys worth pre-loading
    pub fn predict_next_accesses(&self) -> Vec<CacheKey> {
        self.cache.predict_next_accesses()
    }

    pub fn get_table(&self, name: &str) -> Result<Arc<TableMetadata>> {
        self.catalog.get(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.catalog.list_tables()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &MetadataCatalog {
        &self.catalog
    }

    /// Number of table locks currently registered
    pub fn active_table_locks(&self) -> usize {
        self.locks.len()
    }

    pub fn planner(&self) -> &QueryPlanner {
        &self.planner
    }

    pub fn cache(&self) -> &TieredCache {
        &self.cache
    }

    /// Persist the catalog and empty the cache
    pub fn shutdown(&self) -> Result<()> {
        self.catalog.save_to_disk(self.config.catalog_path())?;
        self.cache.clear();
        info!(tables = self.catalog.len(), "storage engine shut down");
        Ok(())
    }
}

/// Table names become file names
fn validate_table_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_TABLE_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTableName(name.to_string()))
    }
}

/// Raises the cancel flag when the waiting query goes away
#[derive(Debug, Default)]
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("employees").is_ok());
        assert!(validate_table_name("sales_2024-q1").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("../etc").is_err());
        assert!(validate_table_name("a b").is_err());
        assert!(validate_table_name(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_cancel_on_drop() {
        let cancel = CancelOnDrop::default();
        let flag = cancel.0.clone();
        assert!(!flag.load(Ordering::Relaxed));
        drop(cancel);
        assert!(flag.load(Ordering::Relaxed));
    }
}
