// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Version chains of the vectors of a segment.
//!
//! The delta overlay always holds the newest value of a tuple, including values written by
//! transactions that are still running. An [`UpdateNode`] remembers the values a transaction
//! replaced, so that readers which must not see that transaction can restore them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::storage::Transaction;
use crate::types::DataValue;

/// Values replaced by one transaction in one vector.
#[derive(Debug)]
pub struct UpdateNode {
    vector_index: usize,
    /// Transaction id while the writer is running, commit id afterwards.
    version: AtomicU64,
    /// Replaced values, sorted by tuple id within the vector.
    tuples: RwLock<Vec<(u32, DataValue)>>,
}

impl UpdateNode {
    pub(crate) fn new(vector_index: usize, transaction_id: u64, mut tuples: Vec<(u32, DataValue)>) -> Self {
        tuples.sort_unstable_by_key(|(id, _)| *id);
        Self {
            vector_index,
            version: AtomicU64::new(transaction_id),
            tuples: RwLock::new(tuples),
        }
    }

    pub fn vector_index(&self) -> usize {
        self.vector_index
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub(crate) fn commit(&self, commit_id: u64) {
        self.version.store(commit_id, Ordering::Release);
    }

    /// Whether `txn` sees the values written by this node's transaction.
    pub fn is_visible(&self, txn: &Transaction) -> bool {
        let version = self.version();
        version < txn.start_time() || version == txn.transaction_id()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.tuples
            .read()
            .binary_search_by_key(&id, |(x, _)| *x)
            .is_ok()
    }

    /// Replaced values, sorted by tuple id.
    pub fn tuples(&self) -> RwLockReadGuard<'_, Vec<(u32, DataValue)>> {
        self.tuples.read()
    }

    /// Record more replaced values. Tuples already recorded keep their first replaced value.
    pub(crate) fn merge(&self, new: impl IntoIterator<Item = (u32, DataValue)>) {
        let mut tuples = self.tuples.write();
        for (id, value) in new {
            if let Err(pos) = tuples.binary_search_by_key(&id, |(x, _)| *x) {
                tuples.insert(pos, (id, value));
            }
        }
    }
}

/// Update nodes of one vector, newest first.
#[derive(Debug, Clone, Default)]
pub struct VersionChain {
    nodes: Vec<Arc<UpdateNode>>,
}

impl VersionChain {
    pub fn push(&mut self, node: Arc<UpdateNode>) {
        self.nodes.insert(0, node);
    }

    /// Unlink `node`. Returns `false` if it is not part of the chain.
    pub fn remove(&mut self, node: &Arc<UpdateNode>) -> bool {
        let len = self.nodes.len();
        self.nodes.retain(|n| !Arc::ptr_eq(n, node));
        self.nodes.len() != len
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<UpdateNode>> {
        self.nodes.iter()
    }

    /// Returns the first of `ids` last written by a transaction invisible to `txn`.
    pub fn find_conflict(&self, txn: &Transaction, ids: &[u32]) -> Option<u32> {
        self.nodes
            .iter()
            .filter(|node| !node.is_visible(txn))
            .find_map(|node| ids.iter().copied().find(|id| node.contains(*id)))
    }

    /// Restore the values `txn` must see.
    ///
    /// Every invisible node is applied, newest to oldest, so the oldest replaced value of a
    /// tuple wins. Visible nodes are skipped but never end the walk: a running writer can sit
    /// behind a committed one.
    pub fn apply(&self, txn: &Transaction, mut f: impl FnMut(u32, &DataValue)) {
        for node in self.nodes.iter().filter(|node| !node.is_visible(txn)) {
            for (id, value) in node.tuples().iter() {
                f(*id, value);
            }
        }
    }
}

/// Version chains of all vectors of a segment.
#[derive(Debug, Default)]
pub struct SegmentVersions {
    chains: Vec<VersionChain>,
}

impl SegmentVersions {
    pub fn new(max_vector_count: usize) -> Self {
        Self {
            chains: vec![VersionChain::default(); max_vector_count],
        }
    }

    pub fn get(&self, vector_index: usize) -> Option<&VersionChain> {
        self.chains.get(vector_index).filter(|c| !c.is_empty())
    }

    pub fn get_mut(&mut self, vector_index: usize) -> &mut VersionChain {
        if self.chains.len() <= vector_index {
            self.chains.resize_with(vector_index + 1, Default::default);
        }
        &mut self.chains[vector_index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXN: u64 = crate::storage::TRANSACTION_ID_START;

    fn node(txn: u64, tuples: &[(u32, i32)]) -> Arc<UpdateNode> {
        Arc::new(UpdateNode::new(
            0,
            txn,
            tuples.iter().map(|(id, v)| (*id, DataValue::Int32(*v))).collect(),
        ))
    }

    #[test]
    fn test_visibility() {
        let n = node(TXN + 1, &[(0, 1)]);
        let writer = Transaction::new(1, TXN + 1);
        let other = Transaction::new(2, TXN + 2);
        assert!(n.is_visible(&writer));
        assert!(!n.is_visible(&other));

        n.commit(3);
        assert!(!n.is_visible(&other));
        let later = Transaction::new(4, TXN + 3);
        assert!(n.is_visible(&later));
    }

    #[test]
    fn test_merge_keeps_first_value() {
        let n = node(TXN, &[(3, 30), (1, 10)]);
        n.merge([(1, DataValue::Int32(99)), (2, DataValue::Null)]);
        assert_eq!(
            *n.tuples(),
            vec![
                (1, DataValue::Int32(10)),
                (2, DataValue::Null),
                (3, DataValue::Int32(30))
            ]
        );
    }

    #[test]
    fn test_apply_behind_visible_node() {
        // an active writer updated tuple 1, then a committed writer updated tuple 2
        let active = node(TXN + 1, &[(1, 100)]);
        let committed = node(TXN + 2, &[(2, 200)]);
        committed.commit(5);
        let mut chain = VersionChain::default();
        chain.push(active.clone());
        chain.push(committed.clone());

        let reader = Transaction::new(6, TXN + 3);
        let mut restored = vec![];
        chain.apply(&reader, |id, v| restored.push((id, *v)));
        assert_eq!(restored, vec![(1, DataValue::Int32(100))]);

        assert_eq!(chain.find_conflict(&reader, &[2, 1]), Some(1));
        assert!(chain.remove(&active));
        assert!(!chain.remove(&active));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_apply_oldest_wins() {
        let newer = node(TXN + 1, &[(0, 2)]);
        let older = node(TXN + 2, &[(0, 1)]);
        let mut chain = VersionChain::default();
        chain.push(older);
        chain.push(newer);
        let reader = Transaction::new(1, TXN + 3);
        let mut value = DataValue::Null;
        chain.apply(&reader, |_, v| value = *v);
        assert_eq!(value, DataValue::Int32(1));
    }
}
