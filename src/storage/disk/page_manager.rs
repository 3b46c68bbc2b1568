use super::PageStore;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{Page, PageId, TableId};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A page store backed by one file; page `n` lives at byte `n * page_size`.
pub struct FilePageStore {
    file: Mutex<File>,
    table_id: TableId,
    page_size: usize,
}

impl FilePageStore {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: &Path, table_id: TableId, page_size: usize) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self::with_file(file, table_id, page_size))
    }

    pub fn open(path: &Path, table_id: TableId, page_size: usize) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self::with_file(file, table_id, page_size))
    }

    fn with_file(file: File, table_id: TableId, page_size: usize) -> Self {
        Self {
            file: Mutex::new(file),
            table_id,
            page_size,
        }
    }

    fn check_table(&self, page_id: PageId) -> StorageResult<()> {
        if page_id.table_id != self.table_id {
            return Err(StorageError::TableMismatch {
                page_id,
                table_id: self.table_id,
            });
        }
        Ok(())
    }

    fn page_offset(&self, page_no: u32) -> u64 {
        page_no as u64 * self.page_size as u64
    }

    fn pages_in(&self, file: &File) -> StorageResult<u32> {
        Ok((file.metadata()?.len() / self.page_size as u64) as u32)
    }
}

impl PageStore for FilePageStore {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, page_id: PageId) -> StorageResult<Page> {
        self.check_table(page_id)?;

        let mut file = self.file.lock();
        let num_pages = self.pages_in(&file)?;
        if page_id.page_no >= num_pages {
            return Err(StorageError::PageOutOfRange { page_id, num_pages });
        }

        let mut buf = vec![0u8; self.page_size];
        file.seek(SeekFrom::Start(self.page_offset(page_id.page_no)))?;
        file.read_exact(&mut buf)?;

        Ok(Page::new(page_id, buf.into_boxed_slice()))
    }

    fn write_page(&self, page: &Page) -> StorageResult<()> {
        self.check_table(page.id())?;
        if page.size() != self.page_size {
            return Err(StorageError::PageSizeMismatch {
                expected: self.page_size,
                actual: page.size(),
            });
        }

        let mut file = self.file.lock();
        let offset = self.page_offset(page.id().page_no);
        if offset + self.page_size as u64 > file.metadata()?.len() {
            file.set_len(offset + self.page_size as u64)?;
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.data())?;
        file.sync_all()?;

        Ok(())
    }

    fn num_pages(&self) -> StorageResult<u32> {
        let file = self.file.lock();
        self.pages_in(&file)
    }

    fn allocate_page(&self) -> StorageResult<PageId> {
        let file = self.file.lock();
        let page_no = self.pages_in(&file)?;
        file.set_len(self.page_offset(page_no + 1))?;

        Ok(PageId::new(self.table_id, page_no))
    }
}
