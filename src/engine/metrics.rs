//! Query latency and volume metrics

use crate::cache::CacheStats;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    queries: u64,
    rows: u64,
    latency_sum_ms: f64,
    latency_min_ms: Option<f64>,
    latency_max_ms: Option<f64>,
}

/// Running totals over queries answered from table files; cache hits are
/// counted by the cache stats instead
#[derive(Debug, Default)]
pub(crate) struct QueryMetrics {
    totals: Mutex<Totals>,
}

impl QueryMetrics {
    pub fn record(&self, latency: Duration, rows: usize) {
        let ms = latency.as_secs_f64() * 1000.0;
        let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        totals.queries += 1;
        totals.rows += rows as u64;
        totals.latency_sum_ms += ms;
        totals.latency_min_ms = Some(totals.latency_min_ms.map_or(ms, |m| m.min(ms)));
        totals.latency_max_ms = Some(totals.latency_max_ms.map_or(ms, |m| m.max(ms)));
    }

    pub fn snapshot(&self, cache_stats: CacheStats) -> PerformanceStats {
        let totals = *self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        PerformanceStats {
            avg_latency_ms: if totals.queries == 0 {
                0.0
            } else {
                totals.latency_sum_ms / totals.queries as f64
            },
            min_latency_ms: totals.latency_min_ms.unwrap_or(0.0),
            max_latency_ms: totals.latency_max_ms.unwrap_or(0.0),
            total_queries: totals.queries,
            total_rows_returned: totals.rows,
            cache_stats,
        }
    }
}

/// Engine performance report.
///
/// Latency, `total_queries` and `total_rows_returned` cover cache misses
/// only. Hits show up in `cache_stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub avg_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub total_queries: u64,
    pub total_rows_returned: u64,
    pub cache_stats: CacheStats,
}
