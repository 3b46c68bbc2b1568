use crate::access::{RecordId, TableFile};
use crate::storage::buffer::{BufferPool, BufferPoolResult, Permission};
use crate::storage::disk::PageStore;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::heap_page::max_tuple_size;
use crate::storage::page::{HeapPage, PageId, PageRef, TableId};
use crate::transaction::TransactionId;
use log::trace;
use std::sync::Arc;

/// A table stored as an unordered collection of slotted heap pages.
pub struct HeapFile {
    store: Arc<dyn PageStore>,
}

impl HeapFile {
    pub fn new(store: Arc<dyn PageStore>) -> Self {
        Self { store }
    }

    pub fn num_pages(&self) -> StorageResult<u32> {
        self.store.num_pages()
    }

    /// Reads every live tuple, taking a shared lock on each page.
    pub fn scan(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
    ) -> BufferPoolResult<Vec<(RecordId, Vec<u8>)>> {
        let mut tuples = Vec::new();
        for page_no in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id(), page_no);
            let page = pool.fetch_page(txn, page_id, Permission::ReadOnly)?;

            let page = page.read();
            let heap = HeapPage::new(page.data());
            tuples.extend(
                heap.tuples()
                    .map(|(slot, tuple)| (RecordId::new(page_id, slot), tuple.to_vec())),
            );
        }
        Ok(tuples)
    }

    pub fn get_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        record_id: RecordId,
    ) -> BufferPoolResult<Vec<u8>> {
        self.check_table(record_id.page_id)?;
        let page = pool.fetch_page(txn, record_id.page_id, Permission::ReadOnly)?;
        let page = page.read();
        let heap = HeapPage::new(page.data());
        let tuple = heap.get_tuple(record_id.slot)?;
        Ok(tuple.to_vec())
    }

    fn check_table(&self, page_id: PageId) -> StorageResult<()> {
        if page_id.table_id != self.table_id() {
            return Err(StorageError::TableMismatch {
                page_id,
                table_id: self.table_id(),
            });
        }
        Ok(())
    }

    /// Inserts into `page` if it has room. Returns `None` when it is full.
    fn insert_into(page: &PageRef, txn: TransactionId, tuple: &[u8]) -> StorageResult<Option<u16>> {
        let mut page = page.write();
        let slot = {
            let mut heap = HeapPage::new(page.data_mut());
            if !heap.has_room_for(tuple.len()) {
                return Ok(None);
            }
            heap.insert_tuple(tuple)?
        };
        page.mark_dirty(txn);
        Ok(Some(slot))
    }
}

impl TableFile for HeapFile {
    fn table_id(&self) -> TableId {
        self.store.table_id()
    }

    fn page_store(&self) -> &dyn PageStore {
        self.store.as_ref()
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &[u8],
    ) -> BufferPoolResult<Vec<PageRef>> {
        let page_size = self.store.page_size();
        if tuple.len() > max_tuple_size(page_size) {
            return Err(StorageError::TupleTooLarge {
                size: tuple.len(),
                page_size,
            }
            .into());
        }

        for page_no in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id(), page_no);
            let already_held = pool.holds_lock(txn, page_id);
            let page = pool.fetch_page(txn, page_id, Permission::ReadWrite)?;

            if let Some(slot) = Self::insert_into(&page, txn, tuple)? {
                trace!("{} inserted into {} slot {}", txn, page_id, slot);
                return Ok(vec![page]);
            }
            // Full and untouched, so nothing depends on this lock.
            if !already_held {
                pool.release_lock(txn, page_id);
            }
        }

        let page_id = self.store.allocate_page()?;
        trace!("{} allocated {}", txn, page_id);
        let page = pool.fetch_page(txn, page_id, Permission::ReadWrite)?;
        match Self::insert_into(&page, txn, tuple)? {
            Some(_) => Ok(vec![page]),
            None => Err(StorageError::PageFull {
                required: tuple.len(),
                available: HeapPage::new(page.read().data()).free_space(),
            }
            .into()),
        }
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        record_id: RecordId,
    ) -> BufferPoolResult<Vec<PageRef>> {
        self.check_table(record_id.page_id)?;
        let page = pool.fetch_page(txn, record_id.page_id, Permission::ReadWrite)?;
        {
            let mut page = page.write();
            HeapPage::new(page.data_mut()).delete_tuple(record_id.slot)?;
            page.mark_dirty(txn);
        }
        Ok(vec![page])
    }
}
