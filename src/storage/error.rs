//! Storage layer error types.

use crate::storage::page::{PageId, TableId};
use thiserror::Error;

/// Errors raised by page stores and page layouts.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Page {page_id} is out of range: table has {num_pages} pages")]
    PageOutOfRange { page_id: PageId, num_pages: u32 },

    #[error("Page size mismatch: expected {expected} bytes, got {actual}")]
    PageSizeMismatch { expected: usize, actual: usize },

    #[error("Page {page_id} does not belong to {table_id}")]
    TableMismatch { page_id: PageId, table_id: TableId },

    #[error("Page is full: requires {required} bytes but only {available} available")]
    PageFull { required: usize, available: usize },

    #[error("Tuple of {size} bytes can never fit in a {page_size}-byte page")]
    TupleTooLarge { size: usize, page_size: usize },

    #[error("Tuple not found: slot {slot_id} is empty or deleted")]
    TupleNotFound { slot_id: u16 },

    #[error("Invalid slot ID: {slot_id} (count: {slot_count})")]
    InvalidSlotId { slot_id: u16, slot_count: u16 },

    #[error("Corrupt heap page: {0}")]
    CorruptPage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
