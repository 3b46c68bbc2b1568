//! Page-granularity shared/exclusive locks.
//!
//! The lock manager only decides whether a request is grantable; it never
//! blocks inside `acquire`. Waiting, deadlock checks and retries belong to the
//! buffer pool, which parks on [`LockManager::wait_for_release`] between
//! attempts.

use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use log::trace;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Lock modes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock for read operations.
    Shared,
    /// Exclusive lock for write operations.
    Exclusive,
}

impl LockMode {
    /// Checks if this lock mode is compatible with another.
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }
}

/// Holders of one page's lock.
///
/// Either all holders are shared, or there is exactly one exclusive holder.
#[derive(Debug, Default)]
struct LockEntry {
    holders: HashMap<TransactionId, LockMode>,
}

impl LockEntry {
    fn is_compatible(&self, mode: LockMode) -> bool {
        self.holders
            .values()
            .all(|held| held.is_compatible_with(&mode))
    }
}

#[derive(Debug, Default)]
struct LockTable {
    entries: HashMap<PageId, LockEntry>,
    /// Reverse index: pages each transaction holds a lock on.
    held: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    fn grant(&mut self, txn: TransactionId, page_id: PageId, mode: LockMode) {
        self.entries
            .entry(page_id)
            .or_default()
            .holders
            .insert(txn, mode);
        self.held.entry(txn).or_default().insert(page_id);
    }

    fn release(&mut self, txn: TransactionId, page_id: PageId) -> bool {
        let Some(entry) = self.entries.get_mut(&page_id) else {
            return false;
        };
        if entry.holders.remove(&txn).is_none() {
            return false;
        }
        if entry.holders.is_empty() {
            self.entries.remove(&page_id);
        }

        if let Some(pages) = self.held.get_mut(&txn) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.held.remove(&txn);
            }
        }
        true
    }
}

/// Lock manager for page locks.
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<LockTable>,
    /// Signalled whenever a lock is released.
    released: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tries to grant `mode` on `page_id` to `txn`. Returns whether the lock
    /// is now held; a denial leaves the table untouched.
    pub fn acquire(&self, txn: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        let mut table = self.table.lock();

        let Some(entry) = table.entries.get_mut(&page_id) else {
            table.grant(txn, page_id, mode);
            trace!("{} granted {:?} on {} (no holders)", txn, mode, page_id);
            return true;
        };

        if let Some(&held) = entry.holders.get(&txn) {
            return match (held, mode) {
                (_, LockMode::Shared) | (LockMode::Exclusive, LockMode::Exclusive) => true,
                (LockMode::Shared, LockMode::Exclusive) if entry.holders.len() == 1 => {
                    entry.holders.insert(txn, LockMode::Exclusive);
                    trace!("{} upgraded to Exclusive on {}", txn, page_id);
                    true
                }
                (LockMode::Shared, LockMode::Exclusive) => {
                    trace!("{} denied upgrade on {} (co-holders)", txn, page_id);
                    false
                }
            };
        }

        if entry.is_compatible(mode) {
            table.grant(txn, page_id, mode);
            trace!("{} granted {:?} on {}", txn, mode, page_id);
            true
        } else {
            trace!("{} denied {:?} on {}", txn, mode, page_id);
            false
        }
    }

    /// Releases `txn`'s lock on `page_id`. Releasing a lock that is not held
    /// is a no-op.
    pub fn release(&self, txn: TransactionId, page_id: PageId) {
        let released = self.table.lock().release(txn, page_id);
        if released {
            trace!("{} released {}", txn, page_id);
            self.released.notify_all();
        }
    }

    /// Releases every lock `txn` holds.
    pub fn release_all(&self, txn: TransactionId) {
        let released = {
            let mut table = self.table.lock();
            let pages: Vec<PageId> = table
                .held
                .get(&txn)
                .map(|pages| pages.iter().copied().collect())
                .unwrap_or_default();
            pages
                .into_iter()
                .filter(|&page_id| table.release(txn, page_id))
                .count()
        };
        if released > 0 {
            self.released.notify_all();
        }
    }

    /// Snapshot of the transactions currently holding a lock on `page_id`.
    pub fn holders_of(&self, page_id: PageId) -> Vec<TransactionId> {
        self.table
            .lock()
            .entries
            .get(&page_id)
            .map(|entry| entry.holders.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn holds(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_mode(txn, page_id).is_some()
    }

    pub fn lock_mode(&self, txn: TransactionId, page_id: PageId) -> Option<LockMode> {
        self.table
            .lock()
            .entries
            .get(&page_id)
            .and_then(|entry| entry.holders.get(&txn).copied())
    }

    pub fn pages_held_by(&self, txn: TransactionId) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self
            .table
            .lock()
            .held
            .get(&txn)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }

    /// Parks the caller until some lock is released or `timeout` elapses.
    ///
    /// A release that lands between a denied `acquire` and this call is not
    /// seen, so callers must pass a bounded timeout and re-check.
    pub fn wait_for_release(&self, timeout: Duration) {
        let mut table = self.table.lock();
        self.released.wait_for(&mut table, timeout);
    }
}
