//! Per-table locking
//!
//! Re-creating a table takes its write lock; queries that miss the cache
//! take its read lock. Different tables never contend. The registry also
//! tracks which tables are being created, for lifecycle introspection.
//!
//! An entry lives only while a guard for it is held, so the registry never
//! outgrows the number of tables in use.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Lifecycle state of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TableState {
    /// Never created
    Uncreated,
    /// Statistics and file being written; any previous version stays queryable
    Creating,
    /// Registered and readable
    Available,
}

/// Lock registry: table name -> lock
#[derive(Debug, Default)]
pub(crate) struct TableLocks {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
    creating: Mutex<HashSet<String>>,
}

impl TableLocks {
    /// Shared access to `table`
    pub async fn read(&self, table: &str) -> TableGuard<'_> {
        let lock = self.lock_for(table);
        let guard = lock.clone().read_owned().await;
        TableGuard::new(self, table, lock, Held::Read(guard))
    }

    /// Exclusive access to `table`
    pub async fn write(&self, table: &str) -> TableGuard<'_> {
        let lock = self.lock_for(table);
        let guard = lock.clone().write_owned().await;
        TableGuard::new(self, table, lock, Held::Write(guard))
    }

    /// Mark `table` as being created until the guard is dropped
    pub fn begin_creating(&self, table: &str) -> CreatingGuard<'_> {
        self.creating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.to_string());
        CreatingGuard {
            locks: self,
            table: table.to_string(),
        }
    }

    pub fn is_creating(&self, table: &str) -> bool {
        self.creating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(table)
    }

    /// Number of registered locks
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    fn lock_for(&self, table: &str) -> Arc<RwLock<()>> {
        self.registry()
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Drop the entry for `table` once nobody else holds or awaits it
    fn release(&self, table: &str, lock: Arc<RwLock<()>>) {
        let mut locks = self.registry();
        // One reference in the registry, one passed in
        let idle = locks.get(table).is_some_and(|registered| {
            Arc::ptr_eq(registered, &lock) && Arc::strong_count(&lock) == 2
        });
        if idle {
            locks.remove(table);
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<RwLock<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
enum Held {
    Read(OwnedRwLockReadGuard<()>),
    Write(OwnedRwLockWriteGuard<()>),
}

/// A held table lock; releasing it prunes the registry entry when idle
#[derive(Debug)]
pub(crate) struct TableGuard<'a> {
    locks: &'a TableLocks,
    table: String,
    lock: Option<Arc<RwLock<()>>>,
    held: Option<Held>,
}

impl<'a> TableGuard<'a> {
    fn new(locks: &'a TableLocks, table: &str, lock: Arc<RwLock<()>>, held: Held) -> Self {
        Self {
            locks,
            table: table.to_string(),
            lock: Some(lock),
            held: Some(held),
        }
    }
}

impl Drop for TableGuard<'_> {
    fn drop(&mut self) {
        // Unlock first; the owned guard holds its own reference to the lock
        drop(self.held.take());
        if let Some(lock) = self.lock.take() {
            self.locks.release(&self.table, lock);
        }
    }
}

pub(crate) struct CreatingGuard<'a> {
    locks: &'a TableLocks,
    table: String,
}

impl Drop for CreatingGuard<'_> {
    fn drop(&mut self) {
        self.locks
            .creating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.table);
    }
}
