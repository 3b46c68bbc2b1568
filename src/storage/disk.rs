//! Page stores: durable homes for the pages of one table.

pub mod memory_store;
pub mod page_manager;

use crate::storage::error::StorageResult;
use crate::storage::page::{Page, PageId, TableId};

pub use memory_store::MemoryPageStore;
pub use page_manager::FilePageStore;

/// Persists and retrieves fixed-size pages of a single table.
///
/// Implementations synchronize internally; the buffer pool calls them from
/// many threads.
pub trait PageStore: Send + Sync {
    fn table_id(&self) -> TableId;

    fn page_size(&self) -> usize;

    /// Reads a page. Fails if `page_id` is past the end of the table.
    fn read_page(&self, page_id: PageId) -> StorageResult<Page>;

    /// Overwrites the page at its offset, extending the store if necessary.
    fn write_page(&self, page: &Page) -> StorageResult<()>;

    fn num_pages(&self) -> StorageResult<u32>;

    /// Appends a zeroed page and returns its id.
    fn allocate_page(&self) -> StorageResult<PageId>;
}
