use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a transaction: the owner of page locks, the tag on the pages it
/// dirties, and a node in the wait-for graph.
///
/// Ids from [`TransactionId::fresh`] increase monotonically across the
/// process, so a larger id always belongs to a later `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Wraps a raw id. Mixing raw ids with `fresh` ones on the same pool can
    /// collide; tests that build their own pool use small raw ids freely.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn fresh() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_display_in_log_lines() {
        assert_eq!(TransactionId::new(7).to_string(), "T7");
        assert_eq!(format!("{} waits", TransactionId::new(12)), "T12 waits");
    }

    #[test]
    fn test_fresh_ids_increase() {
        let first = TransactionId::fresh();
        let second = TransactionId::fresh();
        assert!(first < second);
    }

    #[test]
    fn test_fresh_ids_unique_across_threads() {
        let ids: Vec<TransactionId> = thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| (0..100).map(|_| TransactionId::fresh()).collect::<Vec<_>>()))
                .collect();
            workers
                .into_iter()
                .flat_map(|worker| worker.join().unwrap())
                .collect()
        });

        let unique: HashSet<_> = ids.iter().copied().collect();
        assert_eq!(ids.len(), 800);
        assert_eq!(unique.len(), 800);
    }
}
