//! Buffer pool errors.

use crate::config::ConfigError;
use crate::storage::error::StorageError;
use crate::storage::page::{PageId, TableId};
use crate::transaction::TransactionId;
use thiserror::Error;

/// Errors surfaced by buffer pool operations.
///
/// None of these are retried inside the pool; the caller decides whether to
/// abort and restart the transaction.
#[derive(Error, Debug)]
pub enum BufferPoolError {
    /// Waiting for the lock on `page_id` would close a wait-for cycle. The
    /// requesting transaction is the victim and should be aborted.
    #[error("Deadlock: {txn} aborted while waiting for {page_id}")]
    Deadlock { txn: TransactionId, page_id: PageId },

    /// The cache is full and every cached page is dirty.
    #[error("Cannot evict: all {capacity} cached pages are dirty")]
    EvictionExhausted { capacity: usize },

    #[error("Unknown table: {0}")]
    UnknownTable(TableId),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl BufferPoolError {
    pub fn is_deadlock(&self) -> bool {
        matches!(self, BufferPoolError::Deadlock { .. })
    }
}

pub type BufferPoolResult<T> = Result<T, BufferPoolError>;
