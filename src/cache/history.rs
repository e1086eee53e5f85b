//! Access-pattern tracking
//!
//! Keeps a 24 hour sliding window of access times per key and derives
//! pre-load hints from it. This is a frequency heuristic; nothing here
//! affects what the cache returns.

use super::CacheKey;
use fxhash::FxHashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// How long an access is remembered
pub const HISTORY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
/// What counts as a recent access
pub const RECENT_WINDOW: Duration = Duration::from_secs(60 * 60);

const MIN_TOTAL_ACCESSES: usize = 3;
const MIN_RECENT_ACCESSES: usize = 2;
const MAX_PREDICTIONS: usize = 10;
/// Records between sweeps of expired keys
const SWEEP_INTERVAL: u64 = 256;

#[derive(Debug, Default)]
pub struct AccessHistory {
    accesses: FxHashMap<CacheKey, VecDeque<Instant>>,
    records: u64,
}

impl AccessHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an access to `key` at `now`
    pub fn record(&mut self, key: CacheKey, now: Instant) {
        let times = self.accesses.entry(key).or_default();
        times.push_back(now);
        prune(times, now);

        self.records += 1;
        if self.records % SWEEP_INTERVAL == 0 {
            self.sweep(now);
        }
    }

    pub fn forget(&mut self, key: &CacheKey) {
        self.accesses.remove(key);
    }

    /// Drop keys whose every access has left the window
    pub fn sweep(&mut self, now: Instant) {
        self.accesses.retain(|_, times| {
            prune(times, now);
            !times.is_empty()
        });
    }

    pub fn clear(&mut self) {
        self.accesses.clear();
    }

    /// Number of keys with at least one remembered access
    pub fn len(&self) -> usize {
        self.accesses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accesses.is_empty()
    }

    /// Keys likely to be requested again soon.
    ///
    /// A key qualifies with at least three accesses in the window, two of
    /// them within the last hour. Results are ordered by recent accesses,
    /// then total accesses, then key, and capped at ten.
    pub fn predict(&mut self, now: Instant) -> Vec<CacheKey> {
        self.sweep(now);

        let mut candidates: Vec<(usize, usize, CacheKey)> = self
            .accesses
            .iter()
            .filter_map(|(key, times)| {
                let recent = times
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) <= RECENT_WINDOW)
                    .count();
                (times.len() >= MIN_TOTAL_ACCESSES && recent >= MIN_RECENT_ACCESSES)
                    .then_some((recent, times.len(), key.clone()))
            })
            .collect();

        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
        candidates
            .into_iter()
            .take(MAX_PREDICTIONS)
            .map(|(_, _, key)| key)
            .collect()
    }
}

/// Drop accesses older than the history window
fn prune(times: &mut VecDeque<Instant>, now: Instant) {
    while let Some(oldest) = times.front() {
        if now.saturating_duration_since(*oldest) > HISTORY_WINDOW {
            times.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn key(n: u64) -> CacheKey {
        CacheKey::new(&format!("SELECT * FROM t WHERE id = {:02}", n), "t")
    }

    #[test]
    fn test_prediction_thresholds() {
        let base = Instant::now();
        let mut history = AccessHistory::new();

        // Three accesses, all recent
        for _ in 0..3 {
            history.record(key(1), base);
        }
        // Three accesses, only one recent
        history.record(key(2), base);
        history.record(key(2), base);
        history.record(key(2), base + 2 * HOUR);
        // Two accesses only
        history.record(key(3), base + 2 * HOUR);
        history.record(key(3), base + 2 * HOUR);

        let now = base + 2 * HOUR;
        history.record(key(1), now);
        history.record(key(1), now);

        assert_eq!(history.predict(now), vec![key(1)]);
    }

    #[test]
    fn test_window_expiry() {
        let base = Instant::now();
        let mut history = AccessHistory::new();
        for _ in 0..5 {
            history.record(key(7), base);
        }
        assert_eq!(history.predict(base), vec![key(7)]);

        let later = base + 25 * HOUR;
        assert!(history.predict(later).is_empty());
        assert!(history.is_empty());
    }

    #[test]
    fn test_ordering_and_cap() {
        let now = Instant::now();
        let mut history = AccessHistory::new();
        for n in 0..15u64 {
            let count = if n == 14 { 6 } else { 3 };
            for _ in 0..count {
                history.record(key(n), now);
            }
        }

        let predicted = history.predict(now);
        assert_eq!(predicted.len(), 10);
        assert_eq!(predicted[0], key(14));
        let rest: Vec<CacheKey> = (0..9).map(key).collect();
        assert_eq!(&predicted[1..], &rest[..]);
    }

    #[test]
    fn test_recording_sweeps_expired_keys() {
        let base = Instant::now();
        let mut history = AccessHistory::new();
        for n in 0..50 {
            history.record(key(n), base);
        }
        assert_eq!(history.len(), 50);

        // One live key recorded a day later; the expired ones go without a predict
        let later = base + 25 * HOUR;
        for _ in 0..SWEEP_INTERVAL {
            history.record(key(99), later);
        }
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_forget() {
        let now = Instant::now();
        let mut history = AccessHistory::new();
        history.record(key(1), now);
        history.record(key(2), now);

        history.forget(&key(1));
        history.forget(&key(5));
        assert_eq!(history.len(), 1);
    }
}
