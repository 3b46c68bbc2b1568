//! Table access on top of the buffer pool.
//!
//! Tuples are opaque byte strings here; schemas live above this layer.

pub mod heap;

use crate::storage::buffer::{BufferPool, BufferPoolResult};
use crate::storage::disk::PageStore;
use crate::storage::page::{PageId, PageRef, TableId};
use crate::transaction::TransactionId;
use serde::{Deserialize, Serialize};

pub use heap::HeapFile;

/// Location of a tuple: its page and slot within the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }
}

/// A tuple-level change applied through [`BufferPool::apply_mutation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Insert(Vec<u8>),
    Delete(RecordId),
}

/// A table's file: where its pages live and how tuples are placed on them.
///
/// Implementations fetch every page they touch through the pool, so the
/// locks are already held when the pool marks the returned pages dirty.
pub trait TableFile: Send + Sync {
    fn table_id(&self) -> TableId;

    fn page_store(&self) -> &dyn PageStore;

    /// Inserts `tuple`, returning the pages it modified.
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &[u8],
    ) -> BufferPoolResult<Vec<PageRef>>;

    /// Deletes the tuple at `record_id`, returning the pages it modified.
    fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        record_id: RecordId,
    ) -> BufferPoolResult<Vec<PageRef>>;
}
