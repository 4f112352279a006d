// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::ops::Range;

use tracing::debug;

use crate::types::DataValue;

/// Overrides of the tuples of one vector, sorted by tuple id.
///
/// `DataValue::Null` overrides a tuple with null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorUpdates {
    entries: Vec<(u32, DataValue)>,
}

impl VectorUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, id: u32) -> Result<usize, usize> {
        let pos = self.entries.partition_point(|(x, _)| *x < id);
        match self.entries.get(pos) {
            Some((x, _)) if *x == id => Ok(pos),
            _ => Err(pos),
        }
    }

    /// Insert or replace the override of `id`, returning the replaced value.
    pub fn insert(&mut self, id: u32, value: DataValue) -> Option<DataValue> {
        match self.position(id) {
            Ok(pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            Err(pos) => {
                self.entries.insert(pos, (id, value));
                None
            }
        }
    }

    pub fn get(&self, id: u32) -> Option<&DataValue> {
        self.position(id).ok().map(|pos| &self.entries[pos].1)
    }

    /// Entries with ids in `range`, ascending.
    pub fn range(&self, range: Range<u32>) -> &[(u32, DataValue)] {
        let start = self.entries.partition_point(|(x, _)| *x < range.start);
        let end = self.entries.partition_point(|(x, _)| *x < range.end);
        &self.entries[start..end]
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &DataValue)> + '_ {
        self.entries.iter().map(|(id, v)| (*id, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lazily created overlays of all vectors of a segment.
#[derive(Debug, Default)]
pub struct SegmentDeltaUpdates {
    vectors: Vec<Option<VectorUpdates>>,
}

impl SegmentDeltaUpdates {
    pub fn new(max_vector_count: usize) -> Self {
        Self {
            vectors: vec![None; max_vector_count],
        }
    }

    pub fn get(&self, vector_index: usize) -> Option<&VectorUpdates> {
        self.vectors.get(vector_index).and_then(Option::as_ref)
    }

    /// Returns the overlay of a vector, creating it on first use.
    pub fn get_or_create(&mut self, vector_index: usize) -> &mut VectorUpdates {
        if self.vectors.len() <= vector_index {
            self.vectors.resize(vector_index + 1, None);
        }
        self.vectors[vector_index].get_or_insert_with(|| {
            debug!(vector_index, "created delta overlay");
            VectorUpdates::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replace() {
        let mut updates = VectorUpdates::new();
        assert_eq!(updates.insert(5, DataValue::Int32(1)), None);
        assert_eq!(updates.insert(2, DataValue::Null), None);
        assert_eq!(updates.insert(5, DataValue::Int32(9)), Some(DataValue::Int32(1)));
        assert_eq!(
            updates.iter().collect::<Vec<_>>(),
            vec![(2, &DataValue::Null), (5, &DataValue::Int32(9))]
        );
        assert_eq!(updates.get(5), Some(&DataValue::Int32(9)));
        assert_eq!(updates.get(3), None);
    }

    #[test]
    fn test_range() {
        let mut updates = VectorUpdates::new();
        for id in [1, 4, 6, 9] {
            updates.insert(id, DataValue::Int64(id as i64));
        }
        fn ids(updates: &VectorUpdates, r: Range<u32>) -> Vec<u32> {
            updates.range(r).iter().map(|(id, _)| *id).collect()
        }
        assert_eq!(ids(&updates, 0..5), vec![1, 4]);
        assert_eq!(ids(&updates, 4..9), vec![4, 6]);
        assert_eq!(ids(&updates, 10..12), Vec::<u32>::new());
        assert_eq!(ids(&updates, 0..10), vec![1, 4, 6, 9]);
    }

    #[test]
    fn test_lazy_creation() {
        let mut delta = SegmentDeltaUpdates::new(4);
        assert!(delta.get(2).is_none());
        delta.get_or_create(2).insert(0, DataValue::Bool(true));
        assert_eq!(delta.get(2).map(|u| u.len()), Some(1));
        assert!(delta.get(1).is_none());
    }
}
