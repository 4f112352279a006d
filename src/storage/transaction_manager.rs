// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::transaction::{Transaction, UndoEntry, TRANSACTION_ID_START};
use super::{StorageResult, TracedStorageError};

struct CommittedUpdates {
    commit_id: u64,
    undo: Vec<UndoEntry>,
}

struct ManagerState {
    /// Source of start times and commit ids.
    current_timestamp: u64,
    next_transaction_id: u64,
    /// Transaction id to start time of running transactions.
    active: BTreeMap<u64, u64>,
    /// Committed updates some running transaction may still need to undo on read.
    committed: Vec<CommittedUpdates>,
}

/// Hands out snapshots, stamps commits and retires version chain entries.
///
/// A transaction sees every update committed before it started, plus its own. Committed update
/// nodes are unlinked once every running transaction started after their commit.
pub struct TransactionManager {
    state: Mutex<ManagerState>,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManagerState {
                current_timestamp: 1,
                next_transaction_id: TRANSACTION_ID_START,
                active: BTreeMap::new(),
                committed: vec![],
            }),
        }
    }

    pub fn begin(&self) -> Arc<Transaction> {
        let mut state = self.state.lock();
        let start_time = state.current_timestamp;
        state.current_timestamp += 1;
        let transaction_id = state.next_transaction_id;
        state.next_transaction_id += 1;
        state.active.insert(transaction_id, start_time);
        debug!(txn = transaction_id, start_time, "begin transaction");
        Arc::new(Transaction::new(start_time, transaction_id))
    }

    /// Commit `txn`, returning its commit id.
    pub fn commit(&self, txn: &Transaction) -> StorageResult<u64> {
        let mut state = self.state.lock();
        Self::check_active(&state, txn)?;
        let commit_id = state.current_timestamp;
        state.current_timestamp += 1;
        let undo = txn.finish();
        for entry in &undo {
            entry.node.commit(commit_id);
        }
        state.active.remove(&txn.transaction_id());
        debug!(txn = txn.transaction_id(), commit_id, updates = undo.len(), "commit transaction");
        if !undo.is_empty() {
            state.committed.push(CommittedUpdates { commit_id, undo });
        }
        Self::cleanup(&mut state);
        Ok(commit_id)
    }

    /// Abort `txn`, undoing its updates newest first.
    pub fn abort(&self, txn: &Transaction) -> StorageResult<()> {
        let mut state = self.state.lock();
        Self::check_active(&state, txn)?;
        let undo = txn.finish();
        for entry in undo.iter().rev() {
            entry.segment.rollback_update(&entry.node);
        }
        state.active.remove(&txn.transaction_id());
        debug!(txn = txn.transaction_id(), updates = undo.len(), "abort transaction");
        Self::cleanup(&mut state);
        Ok(())
    }

    fn check_active(state: &ManagerState, txn: &Transaction) -> StorageResult<()> {
        if txn.is_finished() || !state.active.contains_key(&txn.transaction_id()) {
            return Err(TracedStorageError::not_found(
                "active transaction",
                txn.transaction_id(),
            ));
        }
        Ok(())
    }

    fn lowest_start_time(state: &ManagerState) -> u64 {
        state
            .active
            .values()
            .copied()
            .min()
            .unwrap_or(state.current_timestamp)
    }

    fn cleanup(state: &mut ManagerState) {
        let lowest = Self::lowest_start_time(state);
        state.committed.retain(|committed| {
            if committed.commit_id >= lowest {
                return true;
            }
            for entry in &committed.undo {
                entry.segment.cleanup_update(&entry.node);
            }
            false
        });
    }

    /// Start time of the oldest running transaction.
    pub fn lowest_active_start(&self) -> u64 {
        Self::lowest_start_time(&self.state.lock())
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Number of committed transactions whose update nodes are still linked.
    pub fn pending_cleanup(&self) -> usize {
        self.state.lock().committed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps() {
        let manager = TransactionManager::new();
        let t1 = manager.begin();
        let t2 = manager.begin();
        assert!(t1.start_time() < t2.start_time());
        assert!(t1.transaction_id() >= TRANSACTION_ID_START);
        assert_ne!(t1.transaction_id(), t2.transaction_id());
        assert_eq!(manager.lowest_active_start(), t1.start_time());

        let commit_id = manager.commit(&t2).unwrap();
        assert!(commit_id > t2.start_time());
        let t3 = manager.begin();
        assert!(t3.start_time() > commit_id);
        assert_eq!(manager.active_count(), 2);

        manager.abort(&t1).unwrap();
        manager.commit(&t3).unwrap();
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn test_finish_twice() {
        let manager = TransactionManager::new();
        let txn = manager.begin();
        manager.commit(&txn).unwrap();
        assert!(manager.commit(&txn).is_err());
        assert!(manager.abort(&txn).is_err());
    }
}
