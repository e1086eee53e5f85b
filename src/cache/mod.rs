//! Result cache
//!
//! A two-tier (hot/warm) cache of encoded query results keyed by the query
//! text and table name.

pub mod history;
pub mod stats;
pub mod tiered;

use fxhash::FxHasher64;
use serde::Serialize;
use std::hash::{Hash, Hasher};

pub use history::AccessHistory;
pub use stats::{CacheCounters, CacheStats};
pub use tiered::{CacheConfig, CacheEntry, CacheTier, TieredCache};

/// Identity of a cached result.
///
/// Hashes as its fingerprint but compares the full query text and table
/// name, so two queries with colliding fingerprints stay separate entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CacheKey {
    query: String,
    table: String,
    #[serde(skip)]
    fingerprint: u64,
}

impl CacheKey {
    pub fn new(query: &str, table: &str) -> Self {
        Self {
            query: query.to_string(),
            table: table.to_string(),
            fingerprint: fingerprint(query, table),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    #[cfg(test)]
    pub(crate) fn with_fingerprint(query: &str, table: &str, fingerprint: u64) -> Self {
        Self {
            query: query.to_string(),
            table: table.to_string(),
            fingerprint,
        }
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint);
    }
}

/// Stable fingerprint of `(query, table)`
pub fn fingerprint(query: &str, table: &str) -> u64 {
    let mut hasher = FxHasher64::default();
    query.hash(&mut hasher);
    table.hash(&mut hasher);
    hasher.finish()
}
