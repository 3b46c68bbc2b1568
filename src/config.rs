//! Buffer pool configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default number of pages the pool caches.
pub const DEFAULT_PAGES: usize = 50;

/// Default bytes per page.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default upper bound on a single wait between lock acquisition attempts.
pub const DEFAULT_LOCK_RETRY_MS: u64 = 10;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Buffer pool capacity must be at least 1 page")]
    ZeroCapacity,

    #[error("Page size {0} is out of range ({min}..={max} bytes)", min = MIN_PAGE_SIZE, max = MAX_PAGE_SIZE)]
    PageSizeOutOfRange(usize),
}

// Heap pages address tuples with 16-bit offsets.
const MIN_PAGE_SIZE: usize = 64;
const MAX_PAGE_SIZE: usize = u16::MAX as usize;

/// Fixed at pool construction; there is no way to change it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPoolConfig {
    /// Maximum number of cached pages.
    pub capacity: usize,
    /// Bytes per page; every page store registered with the pool must match.
    pub page_size: usize,
    /// Longest a blocked `fetch_page` sleeps before re-checking its lock.
    pub lock_retry_ms: u64,
}

impl BufferPoolConfig {
    pub fn new(capacity: usize, page_size: usize) -> Self {
        Self {
            capacity,
            page_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ConfigError::PageSizeOutOfRange(self.page_size));
        }
        Ok(())
    }

    pub fn lock_retry_interval(&self) -> Duration {
        Duration::from_millis(self.lock_retry_ms.max(1))
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_PAGES,
            page_size: DEFAULT_PAGE_SIZE,
            lock_retry_ms: DEFAULT_LOCK_RETRY_MS,
        }
    }
}
