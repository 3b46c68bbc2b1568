//! Transactions.
//!
//! A transaction is an id plus the locks and dirty pages the buffer pool
//! tracks under it. [`Transaction`] is a handle that ends the transaction
//! exactly once, aborting it if dropped unfinished.

pub mod handle;
pub mod id;

pub use handle::Transaction;
pub use id::TransactionId;
