//! Disk manager for colstore
//!
//! This module handles the per-table Parquet files under `<data_dir>/tables`.
//! Files are written to a temporary path, synced and renamed into place, so
//! a reader only ever opens a complete file.

use super::compression::CompressionCodec;
use crate::error::{Error, Result};
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use std::fs::{self, File};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Rows per Parquet row group
pub const DEFAULT_ROW_GROUP_SIZE: usize = 100_000;

const TABLE_DIR: &str = "tables";
const TABLE_FILE_EXTENSION: &str = "parquet";

/// How table files are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub row_group_size: usize,
    pub codec: CompressionCodec,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            codec: CompressionCodec::default(),
        }
    }
}

/// Disk manager
#[derive(Debug, Clone)]
pub struct DiskManager {
    /// Directory where table files are stored
    table_dir: PathBuf,
    options: WriteOptions,
}

impl DiskManager {
    /// Create a manager rooted at `data_dir`, creating the table directory
    pub fn open(data_dir: impl AsRef<Path>, options: WriteOptions) -> Result<Self> {
        let table_dir = data_dir.as_ref().join(TABLE_DIR);
        fs::create_dir_all(&table_dir).map_err(|e| {
            Error::Persistence(format!("cannot create {}: {}", table_dir.display(), e))
        })?;

        Ok(Self { table_dir, options })
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Path of the file backing `version` of `table`
    pub fn table_path(&self, table: &str, version: u64) -> PathBuf {
        self.table_dir
            .join(format!("{}.v{}.{}", table, version, TABLE_FILE_EXTENSION))
    }

    /// Delete a table file that is no longer referenced
    pub fn remove_table(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Persistence(format!(
                "cannot remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Delete table files (and leftover temp files) not in `referenced`;
    /// returns how many were removed
    pub fn remove_unreferenced(&self, referenced: &HashSet<PathBuf>) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.table_dir)? {
            let path = entry?.path();
            if path.is_file() && !referenced.contains(&path) {
                self.remove_table(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Write `batch` as the file at `path`; returns the file size
    pub fn write_table(&self, path: &Path, batch: &RecordBatch) -> Result<u64> {
        let span = tracing::info_span!(
            "parquet.write",
            path = %path.display(),
            row_count = batch.num_rows(),
            column_count = batch.num_columns()
        );
        let _span_guard = span.entered();

        let tmp = path.with_extension(format!("{}.tmp", TABLE_FILE_EXTENSION));
        let result = self.write_file(&tmp, batch).and_then(|size| {
            fs::rename(&tmp, path)?;
            Ok(size)
        });

        match result {
            Ok(size) => {
                tracing::debug!(size_bytes = size, "table file written");
                Ok(size)
            }
            Err(err) => {
                let _ = fs::remove_file(&tmp);
                Err(Error::Persistence(format!(
                    "failed to write {}: {}",
                    path.display(),
                    err
                )))
            }
        }
    }

    fn write_file(&self, path: &Path, batch: &RecordBatch) -> Result<u64> {
        let props = WriterProperties::builder()
            .set_max_row_group_size(self.options.row_group_size.max(1))
            .set_dictionary_enabled(true)
            .set_statistics_enabled(EnabledStatistics::Chunk)
            .set_compression(self.options.codec.to_parquet())
            .build();

        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(batch)?;
        let file = writer.into_inner()?;
        file.sync_all()?;

        Ok(file.metadata()?.len())
    }

    /// Read the whole file at `path` into one batch.
    ///
    /// `cancel` is checked between decoded batches; once set the read stops
    /// with `Cancelled`.
    pub fn read_table(&self, path: &Path, cancel: &AtomicBool) -> Result<RecordBatch> {
        let file = File::open(path).map_err(|e| {
            Error::Persistence(format!("cannot open {}: {}", path.display(), e))
        })?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let row_groups = builder.metadata().num_row_groups();
        let reader = builder.build()?;

        let mut batches = Vec::with_capacity(row_groups);
        for batch in reader {
            if cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled(path.display().to_string()));
            }
            batches.push(batch?);
        }

        Ok(concat_batches(&schema, &batches)?)
    }
}
