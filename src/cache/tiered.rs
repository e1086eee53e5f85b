//! Two-tier result cache
//!
//! L1 holds hot entries under a hard byte cap. When L1 passes 90% of its cap
//! the least important tenth of its entries is demoted to L2, round after
//! round, until the incoming entry fits below the threshold. L2 entries stay
//! retrievable and are promoted back on their next hit. Only when L2 itself
//! overflows are entries dropped for good.
//!
//! Both tiers sit behind one mutex so a key can never be promoted and
//! demoted at the same time.

use super::history::AccessHistory;
use super::stats::{CacheCounters, CacheStats, TierUsage};
use super::CacheKey;
use crate::error::{Error, Result};
use bytes::Bytes;
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use tracing::debug;

const GIB: u64 = 1024 * 1024 * 1024;

/// Fraction of the L1 cap above which `set` starts demoting
pub const EVICTION_THRESHOLD: f64 = 0.9;

const PRIORITY_WEIGHT: f64 = 0.4;
const FREQUENCY_WEIGHT: f64 = 0.3;
const RECENCY_PENALTY_PER_SEC: f64 = 0.0001;

/// Tier capacities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub l1_capacity_bytes: u64,
    pub l2_capacity_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_capacity_bytes: 8 * GIB,
            l2_capacity_bytes: 16 * GIB,
        }
    }
}

impl CacheConfig {
    pub fn new(l1_capacity_bytes: u64, l2_capacity_bytes: u64) -> Self {
        Self {
            l1_capacity_bytes,
            l2_capacity_bytes,
        }
    }
}

/// Which tier served a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CacheTier {
    L1,
    L2,
}

/// A cached, encoded result
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: Bytes,
    pub priority: u32,
    pub access_count: u64,
    pub last_access: Instant,
    pub size_bytes: u64,
}

impl CacheEntry {
    pub fn new(key: CacheKey, value: Bytes, priority: u32, now: Instant) -> Self {
        let size_bytes = value.len() as u64;
        Self {
            key,
            value,
            priority,
            access_count: 0,
            last_access: now,
            size_bytes,
        }
    }

    /// Table the result was computed from
    pub fn table(&self) -> &str {
        self.key.table()
    }

    /// Higher means more worth keeping in L1
    pub fn importance(&self, now: Instant) -> f64 {
        let idle = now.saturating_duration_since(self.last_access).as_secs_f64();
        self.priority as f64 * PRIORITY_WEIGHT + self.access_count as f64 * FREQUENCY_WEIGHT
            - idle * RECENCY_PENALTY_PER_SEC
    }

    fn touch(&mut self, now: Instant) {
        self.access_count += 1;
        self.last_access = now;
    }
}

#[derive(Debug, Default)]
struct Tiers {
    l1: FxHashMap<CacheKey, CacheEntry>,
    l2: FxHashMap<CacheKey, CacheEntry>,
    l1_bytes: u64,
    l2_bytes: u64,
}

impl Tiers {
    fn take(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        if let Some(entry) = self.l1.remove(key) {
            self.l1_bytes -= entry.size_bytes;
            return Some(entry);
        }
        let entry = self.l2.remove(key)?;
        self.l2_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn insert_l1(&mut self, entry: CacheEntry) {
        self.l1_bytes += entry.size_bytes;
        self.l1.insert(entry.key.clone(), entry);
    }

    fn insert_l2(&mut self, entry: CacheEntry) {
        self.l2_bytes += entry.size_bytes;
        self.l2.insert(entry.key.clone(), entry);
    }

    fn usage(&self) -> (TierUsage, TierUsage) {
        (
            TierUsage {
                entries: self.l1.len(),
                bytes: self.l1_bytes,
            },
            TierUsage {
                entries: self.l2.len(),
                bytes: self.l2_bytes,
            },
        )
    }
}

/// The `count` least important keys, ties broken by ascending key
fn least_important(
    entries: &FxHashMap<CacheKey, CacheEntry>,
    count: usize,
    now: Instant,
) -> Vec<CacheKey> {
    let mut scored: Vec<(f64, &CacheKey)> = entries
        .values()
        .map(|e| (e.importance(now), &e.key))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(count)
        .map(|(_, key)| key.clone())
        .collect()
}

/// Two-tier result cache
#[derive(Debug)]
pub struct TieredCache {
    config: CacheConfig,
    tiers: Mutex<Tiers>,
    history: Mutex<AccessHistory>,
    counters: CacheCounters,
}

impl TieredCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            tiers: Mutex::new(Tiers::default()),
            history: Mutex::new(AccessHistory::new()),
            counters: CacheCounters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up `key`; an L2 hit moves the entry back to L1
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        self.get_with_tier(key).map(|(value, _)| value)
    }

    /// Like [`TieredCache::get`], also reporting the tier that served the hit
    pub fn get_with_tier(&self, key: &CacheKey) -> Option<(Bytes, CacheTier)> {
        let now = Instant::now();
        let mut dropped = Vec::new();
        let hit = {
            let mut tiers = self.lock_tiers();
            if let Some(entry) = tiers.l1.get_mut(key) {
                entry.touch(now);
                self.counters.record_l1_hit();
                Some((entry.value.clone(), CacheTier::L1))
            } else if let Some(mut entry) = tiers.l2.remove(key) {
                tiers.l2_bytes -= entry.size_bytes;
                entry.touch(now);
                let value = entry.value.clone();
                self.counters.record_l2_hit();
                self.counters.record_promotion();
                dropped = self.admit(&mut tiers, entry, now);
                Some((value, CacheTier::L2))
            } else {
                None
            }
        };

        match hit {
            Some(hit) => {
                let mut history = self.lock_history();
                history.record(key.clone(), now);
                for key in &dropped {
                    history.forget(key);
                }
                debug!(key = key.fingerprint(), tier = ?hit.1, "cache hit");
                Some(hit)
            }
            None => {
                self.counters.record_miss();
                None
            }
        }
    }

    /// Insert or replace an entry in L1.
    ///
    /// Fails with `CapacityExceeded` when the value alone is larger than L1.
    pub fn set(&self, key: CacheKey, value: Bytes, priority: u32) -> Result<()> {
        let size = value.len() as u64;
        if size > self.config.l1_capacity_bytes {
            return Err(Error::CapacityExceeded {
                requested: size,
                capacity: self.config.l1_capacity_bytes,
            });
        }

        let now = Instant::now();
        let dropped = {
            let mut tiers = self.lock_tiers();
            tiers.take(&key);
            self.admit(&mut tiers, CacheEntry::new(key, value, priority, now), now)
        };
        if !dropped.is_empty() {
            let mut history = self.lock_history();
            for key in &dropped {
                history.forget(key);
            }
        }
        Ok(())
    }

    /// Which tier holds `key`, without counting an access
    pub fn tier_of(&self, key: &CacheKey) -> Option<CacheTier> {
        let tiers = self.lock_tiers();
        if tiers.l1.contains_key(key) {
            Some(CacheTier::L1)
        } else if tiers.l2.contains_key(key) {
            Some(CacheTier::L2)
        } else {
            None
        }
    }

    /// Drop every entry computed from `table`; returns how many were dropped
    pub fn invalidate_table(&self, table: &str) -> usize {
        let removed: Vec<CacheKey> = {
            let mut tiers = self.lock_tiers();
            let keys: Vec<CacheKey> = tiers
                .l1
                .keys()
                .chain(tiers.l2.keys())
                .filter(|k| k.table() == table)
                .cloned()
                .collect();
            for key in &keys {
                tiers.take(key);
            }
            keys
        };

        if !removed.is_empty() {
            let mut history = self.lock_history();
            for key in &removed {
                history.forget(key);
            }
            debug!(table, entries = removed.len(), "invalidated cached results");
        }
        removed.len()
    }

    /// Empty both tiers and the access history; counters are kept
    pub fn clear(&self) {
        *self.lock_tiers() = Tiers::default();
        self.lock_history().clear();
    }

    /// Keys worth pre-loading, most promising first
    pub fn predict_next_accesses(&self) -> Vec<CacheKey> {
        self.lock_history().predict(Instant::now())
    }

    /// Number of keys the access history remembers
    pub fn tracked_keys(&self) -> usize {
        self.lock_history().len()
    }

    pub fn stats(&self) -> CacheStats {
        let (l1, l2) = self.lock_tiers().usage();
        self.counters
            .snapshot(l1, l2, self.config.l1_capacity_bytes)
    }

    /// Make room for `entry` in L1 and insert it; returns keys dropped for good
    fn admit(&self, tiers: &mut Tiers, entry: CacheEntry, now: Instant) -> Vec<CacheKey> {
        let cap = self.config.l1_capacity_bytes;
        let threshold = cap as f64 * EVICTION_THRESHOLD;

        if tiers.l1_bytes as f64 > threshold {
            while (tiers.l1_bytes + entry.size_bytes) as f64 >= threshold && !tiers.l1.is_empty() {
                self.demote_round(tiers, now);
            }
        }
        while tiers.l1_bytes + entry.size_bytes > cap && !tiers.l1.is_empty() {
            self.demote(tiers, 1, now);
        }

        tiers.insert_l1(entry);
        self.enforce_l2_cap(tiers, now)
    }

    /// Demote the least important tenth of L1 (at least one entry)
    fn demote_round(&self, tiers: &mut Tiers, now: Instant) {
        let count = (tiers.l1.len() / 10).max(1);
        self.demote(tiers, count, now);
        debug!(
            demoted = count,
            l1_bytes = tiers.l1_bytes,
            l2_bytes = tiers.l2_bytes,
            "eviction round"
        );
    }

    fn demote(&self, tiers: &mut Tiers, count: usize, now: Instant) {
        for key in least_important(&tiers.l1, count, now) {
            if let Some(entry) = tiers.l1.remove(&key) {
                tiers.l1_bytes -= entry.size_bytes;
                tiers.insert_l2(entry);
                self.counters.record_demotion();
            }
        }
    }

    fn enforce_l2_cap(&self, tiers: &mut Tiers, now: Instant) -> Vec<CacheKey> {
        let mut dropped = Vec::new();
        while tiers.l2_bytes > self.config.l2_capacity_bytes && !tiers.l2.is_empty() {
            for key in least_important(&tiers.l2, 1, now) {
                if let Some(entry) = tiers.l2.remove(&key) {
                    tiers.l2_bytes -= entry.size_bytes;
                    self.counters.record_eviction();
                    debug!(
                        key = key.fingerprint(),
                        size_bytes = entry.size_bytes,
                        "dropped from L2"
                    );
                    dropped.push(key);
                }
            }
        }
        dropped
    }

    fn lock_tiers(&self) -> std::sync::MutexGuard<'_, Tiers> {
        self.tiers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, AccessHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TieredCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
