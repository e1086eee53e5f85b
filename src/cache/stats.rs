//! Cache statistics for monitoring and debugging.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated without taking the tier lock.
#[derive(Debug, Default)]
pub struct CacheCounters {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
    /// Entries dropped from L2 for good
    evictions: AtomicU64,
    promotions: AtomicU64,
    demotions: AtomicU64,
}

impl CacheCounters {
    #[inline]
    pub fn record_l1_hit(&self) {
        self.l1_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_l2_hit(&self) {
        self.l2_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_demotion(&self) {
        self.demotions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.l1_hits.load(Ordering::Relaxed) + self.l2_hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Fill the counter fields of a snapshot
    pub(crate) fn snapshot(&self, l1: TierUsage, l2: TierUsage, capacity_bytes: u64) -> CacheStats {
        let l1_hits = self.l1_hits.load(Ordering::Relaxed);
        let l2_hits = self.l2_hits.load(Ordering::Relaxed);
        let hits = l1_hits + l2_hits;
        let misses = self.misses();

        CacheStats {
            l1_size: l1.entries,
            l2_size: l2.entries,
            hits,
            misses,
            hit_rate: hit_rate(hits, misses),
            memory_usage_bytes: l1.bytes,
            memory_usage_percent: if capacity_bytes == 0 {
                0.0
            } else {
                l1.bytes as f64 / capacity_bytes as f64 * 100.0
            },
            l2_memory_usage_bytes: l2.bytes,
            l1_hits,
            l2_hits,
            evictions: self.evictions.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            demotions: self.demotions.load(Ordering::Relaxed),
        }
    }
}

/// Entry count and byte usage of one tier
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TierUsage {
    pub entries: usize,
    pub bytes: u64,
}

/// `hits / (hits + misses)`, or 0 before any request
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let requests = hits + misses;
    if requests == 0 {
        0.0
    } else {
        hits as f64 / requests as f64
    }
}

/// Point-in-time view of the cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub l1_size: usize,
    pub l2_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    /// Bytes held in L1
    pub memory_usage_bytes: u64,
    /// L1 usage as a percentage of the L1 cap
    pub memory_usage_percent: f64,
    pub l2_memory_usage_bytes: u64,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub evictions: u64,
    pub promotions: u64,
    pub demotions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        assert_eq!(hit_rate(0, 0), 0.0);
        assert_eq!(hit_rate(3, 1), 0.75);
        assert_eq!(hit_rate(0, 5), 0.0);
    }

    #[test]
    fn test_snapshot() {
        let counters = CacheCounters::default();
        counters.record_l1_hit();
        counters.record_l2_hit();
        counters.record_miss();
        counters.record_demotion();

        let stats = counters.snapshot(
            TierUsage {
                entries: 2,
                bytes: 50,
            },
            TierUsage {
                entries: 1,
                bytes: 10,
            },
            200,
        );

        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats.memory_usage_percent, 25.0);
        assert_eq!(stats.l2_memory_usage_bytes, 10);
        assert_eq!(stats.demotions, 1);
    }
}
