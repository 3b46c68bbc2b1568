//! Storage layer.
//!
//! - **Page**: a fixed-size block of bytes, the unit of I/O and of locking
//! - **PageStore**: reads and writes one table's pages (file or memory backed)
//! - **BufferPool**: transactional page cache with no-steal eviction and
//!   force-on-commit
//! - **HeapPage**: slotted layout for variable-length tuples

pub mod buffer;
pub mod disk;
pub mod error;
pub mod page;

pub use buffer::{BufferPool, BufferPoolError, BufferPoolResult, Permission};
pub use disk::{FilePageStore, MemoryPageStore, PageStore};
pub use error::{StorageError, StorageResult};
pub use page::{HeapPage, Page, PageId, PageRef, TableId};
