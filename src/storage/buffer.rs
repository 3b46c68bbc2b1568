//! Transactional buffer pool.
//!
//! The pool is the only way the rest of the system reaches pages. It couples
//! three components, each behind its own mutex and never nested inside one
//! another:
//!
//! - the [`LockManager`] (page locks, plus the condvar blocked fetches park on)
//! - the [`DeadlockDetector`] (wait-for graph)
//! - the [`PageCache`] (cached pages and eviction order)
//!
//! Page latches (`PageRef` read/write locks) are innermost: the pool may latch
//! a page while holding the cache mutex, so callers must never touch the pool
//! while holding a page latch.
//!
//! Buffer policy is no-steal (dirty pages are never evicted) and force (a
//! commit writes every dirty page before releasing any lock).

pub mod cache;
pub mod error;

use crate::access::{Mutation, TableFile};
use crate::catalog::Catalog;
use crate::concurrency::{DeadlockDetector, LockManager, LockMode};
use crate::config::BufferPoolConfig;
use crate::storage::error::StorageError;
use crate::storage::page::{Page, PageId, PageRef, TableId};
use crate::transaction::TransactionId;
use cache::PageCache;
use log::{debug, trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;

pub use error::{BufferPoolError, BufferPoolResult};

/// Access a caller asks for when fetching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn lock_mode(self) -> LockMode {
        match self {
            Permission::ReadOnly => LockMode::Shared,
            Permission::ReadWrite => LockMode::Exclusive,
        }
    }
}

#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

struct BufferPoolInner {
    config: BufferPoolConfig,
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    detector: DeadlockDetector,
    cache: Mutex<PageCache>,
}

impl BufferPool {
    pub fn new(config: BufferPoolConfig, catalog: Arc<Catalog>) -> BufferPoolResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(BufferPoolInner {
                cache: Mutex::new(PageCache::new(config.capacity)),
                config,
                catalog,
                lock_manager: LockManager::new(),
                detector: DeadlockDetector::new(),
            }),
        })
    }

    pub fn config(&self) -> &BufferPoolConfig {
        &self.inner.config
    }

    pub fn capacity(&self) -> usize {
        self.inner.config.capacity
    }

    pub fn page_size(&self) -> usize {
        self.inner.config.page_size
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.inner.catalog
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.inner.lock_manager
    }

    pub fn deadlock_detector(&self) -> &DeadlockDetector {
        &self.inner.detector
    }

    /// Fetches `page_id` on behalf of `txn`, first acquiring the lock that
    /// `permission` needs.
    ///
    /// Blocks while the lock is held incompatibly by other transactions.
    /// Fails with [`BufferPoolError::Deadlock`] if waiting would close a
    /// wait-for cycle; the caller should then abort `txn`.
    pub fn fetch_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        permission: Permission,
    ) -> BufferPoolResult<PageRef> {
        self.acquire_lock(txn, page_id, permission.lock_mode())?;
        self.load_page(page_id)
    }

    fn acquire_lock(
        &self,
        txn: TransactionId,
        page_id: PageId,
        mode: LockMode,
    ) -> BufferPoolResult<()> {
        let inner = &self.inner;
        let mut waited = false;

        while !inner.lock_manager.acquire(txn, page_id, mode) {
            let holders = inner.lock_manager.holders_of(page_id);
            if inner.detector.check_wait(txn, &holders) {
                warn!(
                    "{} aborted as deadlock victim waiting for {:?} on {} (held by {:?})",
                    txn, mode, page_id, holders
                );
                return Err(BufferPoolError::Deadlock { txn, page_id });
            }

            if !waited {
                debug!(
                    "{} waiting for {:?} on {} held by {:?}",
                    txn, mode, page_id, holders
                );
                waited = true;
            }
            inner
                .lock_manager
                .wait_for_release(inner.config.lock_retry_interval());
        }

        if waited {
            inner.detector.clear(txn);
        }
        Ok(())
    }

    fn table(&self, table_id: TableId) -> BufferPoolResult<Arc<dyn TableFile>> {
        self.inner
            .catalog
            .table(table_id)
            .ok_or(BufferPoolError::UnknownTable(table_id))
    }

    fn load_page(&self, page_id: PageId) -> BufferPoolResult<PageRef> {
        let mut cache = self.inner.cache.lock();
        if let Some(page) = cache.get(page_id) {
            return Ok(page);
        }

        let table = self.table(page_id.table_id)?;
        let page = table.page_store().read_page(page_id)?;
        self.check_page_size(&page)?;

        if cache.is_full() {
            Self::evict_page(&mut cache)?;
        }
        let page = page.into_ref();
        cache.insert(page_id, Arc::clone(&page));
        trace!("Loaded {} into cache ({} pages)", page_id, cache.len());

        Ok(page)
    }

    fn check_page_size(&self, page: &Page) -> BufferPoolResult<()> {
        if page.size() != self.inner.config.page_size {
            return Err(StorageError::PageSizeMismatch {
                expected: self.inner.config.page_size,
                actual: page.size(),
            }
            .into());
        }
        Ok(())
    }

    /// Frees one slot: drops the oldest clean page. Dirty pages are never
    /// written out here.
    fn evict_page(cache: &mut PageCache) -> BufferPoolResult<()> {
        match cache.evict() {
            Some(victim) => {
                trace!("Evicted {}", victim);
                Ok(())
            }
            None => {
                warn!("Eviction failed: all {} cached pages are dirty", cache.capacity());
                Err(BufferPoolError::EvictionExhausted {
                    capacity: cache.capacity(),
                })
            }
        }
    }

    /// Applies a tuple insert or delete to `table_id` as `txn`.
    ///
    /// The table file fetches (and locks) the pages it touches; every page it
    /// reports is marked dirty by `txn` and installed in the cache, replacing
    /// any other cached copy.
    pub fn apply_mutation(
        &self,
        txn: TransactionId,
        table_id: TableId,
        mutation: Mutation,
    ) -> BufferPoolResult<Vec<PageRef>> {
        let table = self.table(table_id)?;
        let pages = match &mutation {
            Mutation::Insert(tuple) => table.insert_tuple(self, txn, tuple)?,
            Mutation::Delete(record_id) => table.delete_tuple(self, txn, *record_id)?,
        };

        for page in &pages {
            let page_id = {
                let mut page = page.write();
                page.mark_dirty(txn);
                page.id()
            };
            self.install_page(page_id, page)?;
        }
        trace!("{} applied {:?} to {}", txn, mutation, table_id);

        Ok(pages)
    }

    fn install_page(&self, page_id: PageId, page: &PageRef) -> BufferPoolResult<()> {
        let mut cache = self.inner.cache.lock();
        let same = cache.peek(page_id).map(|cached| Arc::ptr_eq(cached, page));
        match same {
            Some(true) => {
                cache.get(page_id);
            }
            Some(false) => cache.insert(page_id, Arc::clone(page)),
            None => {
                if cache.is_full() {
                    Self::evict_page(&mut cache)?;
                }
                cache.insert(page_id, Arc::clone(page));
            }
        }
        Ok(())
    }

    /// Writes every dirty page `txn` holds a lock on and marks it clean.
    /// Locks are kept.
    pub fn flush_pages(&self, txn: TransactionId) -> BufferPoolResult<()> {
        for page_id in self.inner.lock_manager.pages_held_by(txn) {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    fn flush_page(&self, page_id: PageId) -> BufferPoolResult<()> {
        let table = self.table(page_id.table_id)?;
        let cache = self.inner.cache.lock();
        if let Some(page) = cache.peek(page_id) {
            let mut page = page.write();
            if page.is_dirty() {
                table.page_store().write_page(&page)?;
                page.mark_clean();
                trace!("Flushed {}", page_id);
            }
        }
        Ok(())
    }

    /// Writes every dirty cached page, whoever dirtied it.
    ///
    /// This steals uncommitted changes; it exists for shutdown and tests, not
    /// for use while transactions are running.
    pub fn flush_all_pages(&self) -> BufferPoolResult<()> {
        let cache = self.inner.cache.lock();
        for (&page_id, page) in cache.pages() {
            let mut page = page.write();
            if page.is_dirty() {
                self.table(page_id.table_id)?
                    .page_store()
                    .write_page(&page)?;
                page.mark_clean();
            }
        }
        Ok(())
    }

    /// Commits `txn`: forces its dirty pages to their stores, then releases
    /// all of its locks.
    ///
    /// If a write fails, no lock is released and the error is returned; the
    /// caller should abort the transaction.
    pub fn commit(&self, txn: TransactionId) -> BufferPoolResult<()> {
        self.flush_pages(txn)?;
        self.inner.lock_manager.release_all(txn);
        self.inner.detector.clear(txn);

        debug!("{} committed", txn);
        Ok(())
    }

    /// Aborts `txn`: every cached page it holds a lock on is reloaded from
    /// its store, discarding in-memory changes, then all locks are released.
    ///
    /// Locks are released even when a reload fails. A page that could not be
    /// reloaded is dropped from the cache so its dirty content is never
    /// served, and the first such error is returned.
    pub fn abort(&self, txn: TransactionId) -> BufferPoolResult<()> {
        let pages = self.inner.lock_manager.pages_held_by(txn);
        let mut first_error = None;
        for &page_id in &pages {
            if let Err(e) = self.restore_page(txn, page_id) {
                warn!("{} could not restore {} on abort: {}", txn, page_id, e);
                self.discard_page(page_id);
                first_error.get_or_insert(e);
            }
        }
        self.inner.lock_manager.release_all(txn);
        self.inner.detector.clear(txn);

        match first_error {
            Some(e) => Err(e),
            None => {
                debug!("{} aborted ({} pages locked)", txn, pages.len());
                Ok(())
            }
        }
    }

    fn restore_page(&self, txn: TransactionId, page_id: PageId) -> BufferPoolResult<()> {
        let table = self.table(page_id.table_id)?;
        let mut cache = self.inner.cache.lock();
        let Some(page) = cache.peek(page_id).cloned() else {
            return Ok(());
        };

        {
            let mut page = page.write();
            // A page dirtied by someone else is not ours to roll back.
            if page.dirtier().map_or(true, |owner| owner == txn) {
                let stored = table.page_store().read_page(page_id)?;
                page.restore_from(stored);
            }
        }
        // Rolled-back pages are the first to go.
        cache.demote(page_id);
        Ok(())
    }

    /// Commits or aborts `txn` and releases all of its locks.
    pub fn complete_transaction(&self, txn: TransactionId, commit: bool) -> BufferPoolResult<()> {
        if commit {
            self.commit(txn)
        } else {
            self.abort(txn)
        }
    }

    /// Releases one lock before the transaction completes.
    ///
    /// This breaks two-phase locking. Only call it when the transaction has
    /// neither modified the page nor relied on what it read there, e.g. a
    /// heap insert skipping a full page.
    pub fn release_lock(&self, txn: TransactionId, page_id: PageId) {
        self.inner.lock_manager.release(txn, page_id);
    }

    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.inner.lock_manager.holds(txn, page_id)
    }

    /// Drops a page from the cache without writing it.
    pub fn discard_page(&self, page_id: PageId) {
        if self.inner.cache.lock().remove(page_id).is_some() {
            trace!("Discarded {}", page_id);
        }
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.inner.cache.lock().contains(page_id)
    }

    pub fn cached_page_count(&self) -> usize {
        self.inner.cache.lock().len()
    }

    /// Cached page ids from next eviction candidate to most recently used.
    pub fn cached_page_ids(&self) -> Vec<PageId> {
        self.inner.cache.lock().page_ids()
    }
}
