//! Concurrency control module.
//!
//! - Page lock management (shared/exclusive locks, upgrade in place)
//! - Wait-for graph based deadlock detection

pub mod deadlock;
pub mod lock;

pub use deadlock::{DeadlockDetector, WaitForGraph};
pub use lock::{LockManager, LockMode};
