//! Wait-for graph and deadlock detection.

use crate::transaction::TransactionId;
use log::debug;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

/// Directed graph of transactions blocked on other transactions.
///
/// An edge `waiter -> holder` means `waiter` is waiting for `holder` to
/// release a lock. Edges are distinct; re-adding one has no effect.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    wait_for: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a wait-for edge. Self edges are ignored.
    pub fn add_edge(&mut self, waiter: TransactionId, holder: TransactionId) {
        if waiter != holder {
            self.wait_for.entry(waiter).or_default().insert(holder);
        }
    }

    /// Drops every outgoing edge of `txn`.
    pub fn remove_node(&mut self, txn: TransactionId) {
        self.wait_for.remove(&txn);
    }

    /// Transactions `txn` currently waits for.
    pub fn waits_for(&self, txn: TransactionId) -> Vec<TransactionId> {
        let mut holders: Vec<TransactionId> = self
            .wait_for
            .get(&txn)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        holders.sort();
        holders
    }

    pub fn edge_count(&self) -> usize {
        self.wait_for.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edge_count() == 0
    }

    /// Kahn's algorithm over the whole graph: peel off nodes with no incoming
    /// edges until none are left. Any node never peeled sits on a cycle.
    pub fn has_cycle(&self) -> bool {
        let mut in_degree: HashMap<TransactionId, usize> = HashMap::new();
        for (&waiter, holders) in &self.wait_for {
            in_degree.entry(waiter).or_insert(0);
            for &holder in holders {
                *in_degree.entry(holder).or_insert(0) += 1;
            }
        }

        let mut ready: VecDeque<TransactionId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(&txn, _)| txn)
            .collect();

        let mut removed = 0;
        while let Some(txn) = ready.pop_front() {
            removed += 1;
            let Some(holders) = self.wait_for.get(&txn) else {
                continue;
            };
            for holder in holders {
                if let Some(degree) = in_degree.get_mut(holder) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(*holder);
                    }
                }
            }
        }

        removed < in_degree.len()
    }
}

/// Owns the wait-for graph behind a single mutex.
#[derive(Debug, Default)]
pub struct DeadlockDetector {
    graph: Mutex<WaitForGraph>,
}

impl DeadlockDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `waiter` is blocked on `holders` and checks the whole
    /// graph for a cycle.
    ///
    /// The waiter's previous edges are replaced, so edges never accumulate
    /// across attempts. When a cycle is found the waiter is the victim: its
    /// edges are removed and `true` is returned.
    ///
    /// Edges are only refreshed when the waiter retries. A holder that has
    /// released its lock early (`BufferPool::release_lock`) keeps its
    /// incoming edge until then, so a transaction requesting in that window
    /// can be picked as victim of a cycle that no longer exists. The victim
    /// simply aborts and retries; nothing blocks forever.
    pub fn check_wait(&self, waiter: TransactionId, holders: &[TransactionId]) -> bool {
        let mut graph = self.graph.lock();
        graph.remove_node(waiter);
        for &holder in holders {
            graph.add_edge(waiter, holder);
        }

        if graph.has_cycle() {
            debug!("{} closes a wait-for cycle via {:?}", waiter, holders);
            graph.remove_node(waiter);
            true
        } else {
            false
        }
    }

    /// Removes `txn`'s outgoing edges once it stops waiting.
    pub fn clear(&self, txn: TransactionId) {
        self.graph.lock().remove_node(txn);
    }

    pub fn waits_for(&self, txn: TransactionId) -> Vec<TransactionId> {
        self.graph.lock().waits_for(txn)
    }

    pub fn edge_count(&self) -> usize {
        self.graph.lock().edge_count()
    }
}
