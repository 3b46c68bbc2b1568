pub mod heap_page;

use crate::transaction::TransactionId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use heap_page::HeapPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableId(pub u32);

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "table{}", self.0)
    }
}

/// Names a page across the whole store: a table plus the page's position in
/// that table's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        Self { table_id, page_no }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// An in-memory copy of a page.
///
/// A page is dirty exactly when it carries a dirtier: the last transaction
/// that wrote it since it was loaded, flushed or restored.
#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    data: Box<[u8]>,
    dirtier: Option<TransactionId>,
}

/// Handle to a cached page shared between the buffer pool and its callers.
pub type PageRef = Arc<RwLock<Page>>;

impl Page {
    pub fn new(id: PageId, data: Box<[u8]>) -> Self {
        Self {
            id,
            data,
            dirtier: None,
        }
    }

    /// A zero-filled page, which is also a valid empty heap page.
    pub fn empty(id: PageId, page_size: usize) -> Self {
        Self::new(id, vec![0u8; page_size].into_boxed_slice())
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    pub fn mark_dirty(&mut self, txn: TransactionId) {
        self.dirtier = Some(txn);
    }

    pub fn mark_clean(&mut self) {
        self.dirtier = None;
    }

    /// Replaces the content with `other`'s bytes and clears the dirty tag.
    pub(crate) fn restore_from(&mut self, other: Page) {
        self.data = other.data;
        self.dirtier = None;
    }

    pub fn into_ref(self) -> PageRef {
        Arc::new(RwLock::new(self))
    }
}
