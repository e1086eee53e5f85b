//! Single-pass column profiling
//!
//! Walks an Arrow array once and collects everything the catalog and the
//! compression advisor need: null count, exact distinct count, numeric
//! min/max/mean and the in-memory footprint.
//!
//! Distinct counting is exact and O(n) in memory. Large tables would want a
//! cardinality sketch here instead.

use super::value::Value;
use crate::catalog::DataType;
use crate::error::{Error, Result};
use arrow::array::Array;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Statistics for one column of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    /// Logical type of the column
    pub data_type: DataType,
    /// Number of rows scanned
    pub row_count: usize,
    /// Number of NULL cells
    pub null_count: usize,
    /// Number of distinct non-NULL values
    pub distinct_count: usize,
    /// Smallest value (numeric columns only)
    pub min: Option<Value>,
    /// Largest value (numeric columns only)
    pub max: Option<Value>,
    /// Arithmetic mean (numeric columns only)
    pub mean: Option<f64>,
    /// In-memory size of the column's buffers
    pub size_bytes: usize,
}

impl ColumnProfile {
    /// Profile an Arrow array
    pub fn scan(array: &dyn Array) -> Result<Self> {
        let data_type = DataType::from_arrow(array.data_type())
            .ok_or_else(|| Error::UnsupportedType(array.data_type().to_string()))?;
        let numeric = data_type.is_numeric();

        let mut distinct = HashSet::new();
        let mut min: Option<Value> = None;
        let mut max: Option<Value> = None;
        let mut sum = 0.0;
        let mut counted = 0usize;

        for row in 0..array.len() {
            let value = Value::from_array(array, row)?;
            if value.is_null() {
                continue;
            }

            if numeric {
                if let Some(v) = value.as_f64() {
                    sum += v;
                    counted += 1;
                }
                if min
                    .as_ref()
                    .map_or(true, |m| value.compare(m) == Some(Ordering::Less))
                {
                    min = Some(value.clone());
                }
                if max
                    .as_ref()
                    .map_or(true, |m| value.compare(m) == Some(Ordering::Greater))
                {
                    max = Some(value.clone());
                }
            }

            distinct.insert(value);
        }

        let mean = (numeric && counted > 0).then(|| sum / counted as f64);

        Ok(Self {
            data_type,
            row_count: array.len(),
            null_count: array.null_count(),
            distinct_count: distinct.len(),
            min,
            max,
            mean,
            size_bytes: array.get_array_memory_size(),
        })
    }

    /// Fraction of rows holding a distinct value; 1.0 for an empty column
    pub fn unique_ratio(&self) -> f64 {
        if self.row_count == 0 {
            1.0
        } else {
            self.distinct_count as f64 / self.row_count as f64
        }
    }
}
