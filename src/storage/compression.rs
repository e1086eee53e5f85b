//! Compression advisor
//!
//! Picks an encoding strategy per column from its data characteristics.
//! The advice is recorded in column metadata only; table files are written
//! with the engine-wide codec and parquet's own encodings.

use super::profile::ColumnProfile;
use crate::error::Result;
use arrow::record_batch::RecordBatch;
use indexmap::IndexMap;
use parquet::basic::{Compression, ZstdLevel};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Advisory per-column encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingStrategy {
    /// Low-cardinality strings
    Dictionary,
    /// Numeric columns where most values repeat
    RunLength,
    /// Numeric columns with mostly distinct values
    Delta,
    /// Everything else
    Default,
}

impl fmt::Display for EncodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingStrategy::Dictionary => write!(f, "dictionary"),
            EncodingStrategy::RunLength => write!(f, "rle"),
            EncodingStrategy::Delta => write!(f, "delta"),
            EncodingStrategy::Default => write!(f, "default"),
        }
    }
}

/// Codec used for whole table files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    Uncompressed,
    #[default]
    Snappy,
    Zstd,
}

impl CompressionCodec {
    pub fn to_parquet(self) -> Compression {
        match self {
            CompressionCodec::Uncompressed => Compression::UNCOMPRESSED,
            CompressionCodec::Snappy => Compression::SNAPPY,
            CompressionCodec::Zstd => Compression::ZSTD(ZstdLevel::default()),
        }
    }
}

impl fmt::Display for CompressionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionCodec::Uncompressed => write!(f, "uncompressed"),
            CompressionCodec::Snappy => write!(f, "snappy"),
            CompressionCodec::Zstd => write!(f, "zstd"),
        }
    }
}

/// Column name -> advised strategy, in batch column order
pub type CompressionAdvice = IndexMap<String, EncodingStrategy>;

/// Chooses encoding strategies from column profiles
#[derive(Debug, Clone)]
pub struct CompressionAdvisor {
    /// Unique ratio below which a numeric column counts as repetitive
    repeat_threshold: f64,
}

impl CompressionAdvisor {
    pub fn new() -> Self {
        Self {
            repeat_threshold: 0.5,
        }
    }

    /// Advise a strategy for every column of the batch
    pub fn advise(&self, batch: &RecordBatch) -> Result<CompressionAdvice> {
        let schema = batch.schema();
        let mut advice = CompressionAdvice::with_capacity(batch.num_columns());

        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            let profile = ColumnProfile::scan(column.as_ref())?;
            advice.insert(field.name().clone(), self.strategy_for(&profile));
        }

        Ok(advice)
    }

    /// Strategy for an already profiled column
    pub fn strategy_for(&self, profile: &ColumnProfile) -> EncodingStrategy {
        if profile.data_type.is_string() {
            EncodingStrategy::Dictionary
        } else if profile.data_type.is_numeric() {
            if profile.unique_ratio() < self.repeat_threshold {
                EncodingStrategy::RunLength
            } else {
                EncodingStrategy::Delta
            }
        } else {
            EncodingStrategy::Default
        }
    }
}

impl Default for CompressionAdvisor {
    fn default() -> Self {
        Self::new()
    }
}
