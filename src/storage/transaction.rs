// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::rle::{RleSegment, UpdateNode};

/// Transaction ids are drawn from a range disjoint from timestamps, so that an uncommitted
/// version is newer than every snapshot.
pub const TRANSACTION_ID_START: u64 = 1 << 62;

/// An update to undo on abort, or to clean up after commit.
pub(crate) struct UndoEntry {
    pub segment: Arc<RleSegment>,
    pub node: Arc<UpdateNode>,
}

/// Snapshot and undo log of a transaction.
pub struct Transaction {
    start_time: u64,
    transaction_id: u64,
    undo: Mutex<Vec<UndoEntry>>,
    finished: AtomicBool,
}

impl Transaction {
    pub(crate) fn new(start_time: u64, transaction_id: u64) -> Self {
        Self {
            start_time,
            transaction_id,
            undo: Mutex::new(vec![]),
            finished: AtomicBool::new(false),
        }
    }

    /// Versions older than this timestamp are visible.
    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn transaction_id(&self) -> u64 {
        self.transaction_id
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Number of update nodes written by this transaction.
    pub fn update_count(&self) -> usize {
        self.undo.lock().len()
    }

    /// The node this transaction already wrote for a vector of `segment`.
    pub(crate) fn find_node(
        &self,
        segment: &Arc<RleSegment>,
        vector_index: usize,
    ) -> Option<Arc<UpdateNode>> {
        self.undo
            .lock()
            .iter()
            .find(|e| Arc::ptr_eq(&e.segment, segment) && e.node.vector_index() == vector_index)
            .map(|e| e.node.clone())
    }

    pub(crate) fn register(&self, segment: Arc<RleSegment>, node: Arc<UpdateNode>) {
        self.undo.lock().push(UndoEntry { segment, node });
    }

    /// Mark the transaction finished and take its undo log.
    pub(crate) fn finish(&self) -> Vec<UndoEntry> {
        self.finished.store(true, Ordering::Release);
        std::mem::take(&mut *self.undo.lock())
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("start_time", &self.start_time)
            .field("transaction_id", &self.transaction_id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.is_finished() {
            warn!(
                txn = self.transaction_id,
                "Transaction dropped without committing or aborting"
            );
        }
    }
}
