use super::PageStore;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{Page, PageId, TableId};
use parking_lot::Mutex;

/// A page store held entirely in memory.
///
/// Behaves like [`super::FilePageStore`] without touching the filesystem.
pub struct MemoryPageStore {
    pages: Mutex<Vec<Box<[u8]>>>,
    table_id: TableId,
    page_size: usize,
}

impl MemoryPageStore {
    pub fn new(table_id: TableId, page_size: usize) -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            table_id,
            page_size,
        }
    }

    /// A store pre-filled with `num_pages` zeroed pages.
    pub fn with_pages(table_id: TableId, page_size: usize, num_pages: u32) -> Self {
        let store = Self::new(table_id, page_size);
        store
            .pages
            .lock()
            .resize(num_pages as usize, vec![0u8; page_size].into_boxed_slice());
        store
    }

    fn zeroed(&self) -> Box<[u8]> {
        vec![0u8; self.page_size].into_boxed_slice()
    }
}

impl PageStore for MemoryPageStore {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, page_id: PageId) -> StorageResult<Page> {
        if page_id.table_id != self.table_id {
            return Err(StorageError::TableMismatch {
                page_id,
                table_id: self.table_id,
            });
        }

        let pages = self.pages.lock();
        match pages.get(page_id.page_no as usize) {
            Some(data) => Ok(Page::new(page_id, data.clone())),
            None => Err(StorageError::PageOutOfRange {
                page_id,
                num_pages: pages.len() as u32,
            }),
        }
    }

    fn write_page(&self, page: &Page) -> StorageResult<()> {
        if page.id().table_id != self.table_id {
            return Err(StorageError::TableMismatch {
                page_id: page.id(),
                table_id: self.table_id,
            });
        }
        if page.size() != self.page_size {
            return Err(StorageError::PageSizeMismatch {
                expected: self.page_size,
                actual: page.size(),
            });
        }

        let mut pages = self.pages.lock();
        let index = page.id().page_no as usize;
        if index >= pages.len() {
            let zeroed = self.zeroed();
            pages.resize(index + 1, zeroed);
        }
        pages[index] = page.data().into();

        Ok(())
    }

    fn num_pages(&self) -> StorageResult<u32> {
        Ok(self.pages.lock().len() as u32)
    }

    fn allocate_page(&self) -> StorageResult<PageId> {
        let mut pages = self.pages.lock();
        pages.push(self.zeroed());
        Ok(PageId::new(self.table_id, pages.len() as u32 - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() -> StorageResult<()> {
        let store = MemoryPageStore::new(TableId(3), 32);
        let mut page = Page::empty(PageId::new(TableId(3), 2), 32);
        page.data_mut()[0] = 42;

        store.write_page(&page)?;

        assert_eq!(store.num_pages()?, 3);
        assert_eq!(store.read_page(PageId::new(TableId(3), 2))?.data()[0], 42);
        assert_eq!(store.read_page(PageId::new(TableId(3), 0))?.data()[0], 0);
        Ok(())
    }

    #[test]
    fn test_read_past_end_fails() {
        let store = MemoryPageStore::with_pages(TableId(3), 32, 2);
        assert!(matches!(
            store.read_page(PageId::new(TableId(3), 2)),
            Err(StorageError::PageOutOfRange { num_pages: 2, .. })
        ));
    }

    #[test]
    fn test_allocate_appends() -> StorageResult<()> {
        let store = MemoryPageStore::with_pages(TableId(3), 32, 1);
        assert_eq!(store.allocate_page()?, PageId::new(TableId(3), 1));
        assert_eq!(store.num_pages()?, 2);
        Ok(())
    }
}
