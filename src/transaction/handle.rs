use super::id::TransactionId;
use crate::access::{Mutation, RecordId};
use crate::storage::buffer::{BufferPool, BufferPoolResult, Permission};
use crate::storage::page::{PageId, PageRef, TableId};
use log::{debug, warn};

pub struct Transaction {
    id: TransactionId,
    pool: BufferPool,
    finished: bool,
}

impl Transaction {
    pub fn begin(pool: &BufferPool) -> Self {
        let id = TransactionId::fresh();
        debug!("{} started", id);
        Self {
            id,
            pool: pool.clone(),
            finished: false,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn fetch_page(&self, page_id: PageId, permission: Permission) -> BufferPoolResult<PageRef> {
        self.pool.fetch_page(self.id, page_id, permission)
    }

    pub fn insert(&self, table_id: TableId, tuple: Vec<u8>) -> BufferPoolResult<Vec<PageRef>> {
        self.pool
            .apply_mutation(self.id, table_id, Mutation::Insert(tuple))
    }

    pub fn delete(&self, table_id: TableId, record_id: RecordId) -> BufferPoolResult<Vec<PageRef>> {
        self.pool
            .apply_mutation(self.id, table_id, Mutation::Delete(record_id))
    }

    /// Commits. On failure the handle is dropped unfinished, which aborts.
    pub fn commit(mut self) -> BufferPoolResult<()> {
        self.pool.complete_transaction(self.id, true)?;
        self.finished = true;
        Ok(())
    }

    pub fn abort(mut self) -> BufferPoolResult<()> {
        self.finished = true;
        self.pool.complete_transaction(self.id, false)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.pool.complete_transaction(self.id, false) {
                warn!("Failed to abort {} on drop: {}", self.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::HeapFile;
    use crate::catalog::Catalog;
    use crate::config::BufferPoolConfig;
    use crate::storage::disk::{MemoryPageStore, PageStore};
    use std::sync::Arc;

    const TABLE: TableId = TableId(1);

    fn setup() -> (BufferPool, Arc<MemoryPageStore>) {
        let store = Arc::new(MemoryPageStore::new(TABLE, 128));
        let catalog = Arc::new(Catalog::new());
        catalog.add_table("t", Arc::new(HeapFile::new(store.clone())));
        let pool = BufferPool::new(BufferPoolConfig::new(4, 128), catalog).unwrap();
        (pool, store)
    }

    #[test]
    fn test_ids_are_unique() {
        let (pool, _) = setup();
        let a = Transaction::begin(&pool);
        let b = Transaction::begin(&pool);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_commit_persists() -> BufferPoolResult<()> {
        let (pool, store) = setup();
        let txn = Transaction::begin(&pool);
        let id = txn.id();
        txn.insert(TABLE, b"row".to_vec())?;
        txn.commit()?;

        assert!(pool.lock_manager().pages_held_by(id).is_empty());
        assert!(store.read_page(PageId::new(TABLE, 0))?.data().iter().any(|&b| b != 0));
        Ok(())
    }

    #[test]
    fn test_drop_aborts() -> BufferPoolResult<()> {
        let (pool, _) = setup();
        let page_id = PageId::new(TABLE, 0);
        let id = {
            let txn = Transaction::begin(&pool);
            txn.insert(TABLE, b"row".to_vec())?;
            txn.id()
        };

        assert!(!pool.holds_lock(id, page_id));
        let page = pool.fetch_page(TransactionId::fresh(), page_id, Permission::ReadOnly)?;
        assert!(!page.read().is_dirty());
        assert!(page.read().data().iter().all(|&b| b == 0));
        Ok(())
    }
}
