// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::rle::{codec_for, RleSegment, SegmentStatistics, TableFilter};
use super::{
    BufferManagerRef, SegmentOptions, StorageError, StorageResult, TracedStorageError,
    Transaction,
};
use crate::array::{ArrayBuilderImpl, ArrayImpl, SelectionVector};
use crate::types::PhysicalType;

struct ColumnSegment {
    segment: Arc<RleSegment>,
    stats: Mutex<SegmentStatistics>,
}

/// The segments of one column, in row order.
pub struct ColumnData {
    buffer_manager: BufferManagerRef,
    options: SegmentOptions,
    ty: PhysicalType,
    segments: RwLock<Vec<ColumnSegment>>,
}

impl ColumnData {
    pub fn new(
        buffer_manager: BufferManagerRef,
        options: SegmentOptions,
        ty: PhysicalType,
    ) -> StorageResult<Self> {
        options.validate()?;
        codec_for(ty)?;
        Ok(Self {
            buffer_manager,
            options,
            ty,
            segments: RwLock::new(vec![]),
        })
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.ty
    }

    pub fn row_count(&self) -> u64 {
        self.segments
            .read()
            .last()
            .map_or(0, |s| s.segment.row_start() + s.segment.tuple_count() as u64)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    pub fn segments(&self) -> Vec<Arc<RleSegment>> {
        self.segments.read().iter().map(|s| s.segment.clone()).collect()
    }

    fn builder(&self, capacity: usize) -> StorageResult<ArrayBuilderImpl> {
        ArrayBuilderImpl::with_capacity(self.ty, capacity)
            .ok_or_else(|| TracedStorageError::not_implemented(format!("column of {}", self.ty)))
    }

    /// Append a batch, starting new segments as the last one fills up.
    pub fn append(&self, source: &ArrayImpl) -> StorageResult<()> {
        let mut segments = self.segments.write();
        let mut offset = 0;
        while offset < source.len() {
            let (full, row_start) = segments.last().map_or((true, 0), |s| {
                let count = s.segment.tuple_count();
                (
                    count == s.segment.max_tuple_count(),
                    s.segment.row_start() + count as u64,
                )
            });
            if full {
                let segment = RleSegment::new(
                    self.buffer_manager.clone(),
                    &self.options,
                    self.ty,
                    row_start,
                )?;
                debug!(
                    row_start,
                    segments = segments.len() + 1,
                    "column rolled over to a new segment"
                );
                segments.push(ColumnSegment {
                    segment: Arc::new(segment),
                    stats: Mutex::new(SegmentStatistics::new()),
                });
            }
            let last = &segments[segments.len() - 1];
            let remaining = source.len() - offset;
            offset += last
                .segment
                .append(&mut last.stats.lock(), source, offset, remaining)?;
        }
        Ok(())
    }

    /// Update the rows `row_ids`, ascending, to `values` on behalf of `txn`.
    pub fn update(
        &self,
        txn: &Transaction,
        row_ids: &[u64],
        values: &ArrayImpl,
    ) -> StorageResult<()> {
        if txn.is_finished() {
            return Err(TracedStorageError::not_found(
                "active transaction",
                txn.transaction_id(),
            ));
        }
        if values.len() != row_ids.len() {
            return Err(TracedStorageError::invalid_type(
                self.ty,
                format!("{} values for {} row ids", values.len(), row_ids.len()),
            ));
        }
        if let Some(w) = row_ids.windows(2).find(|w| w[0] >= w[1]) {
            return Err(StorageError::InvalidRowId(w[1]).into());
        }
        let segments = self.segments.read();
        let mut k = 0;
        while k < row_ids.len() {
            let row_id = row_ids[k];
            let pos = segments.partition_point(|s| s.segment.row_start() <= row_id);
            let entry = pos
                .checked_sub(1)
                .map(|pos| &segments[pos])
                .ok_or(StorageError::InvalidRowId(row_id))?;
            let segment = &entry.segment;
            let vector_size = segment.vector_size() as u64;
            let vector_index = ((row_id - segment.row_start()) / vector_size) as usize;
            let vector_offset = segment.row_start() + vector_index as u64 * vector_size;
            let end = row_ids[k..]
                .iter()
                .position(|&id| id >= vector_offset + vector_size)
                .map_or(row_ids.len(), |p| k + p);

            let mut builder = self.builder(end - k)?;
            for i in k..end {
                builder.push(&values.get(i))?;
            }
            let node = txn.find_node(segment, vector_index);
            let is_new = node.is_none();
            let node = segment.update(
                &mut entry.stats.lock(),
                txn,
                &builder.finish(),
                &row_ids[k..end],
                vector_index,
                vector_offset,
                node,
            )?;
            if is_new {
                txn.register(segment.clone(), node);
            }
            k = end;
        }
        Ok(())
    }

    /// All rows as seen by `txn`.
    pub fn scan(&self, txn: &Transaction) -> StorageResult<ArrayImpl> {
        let mut builder = self.builder(self.row_count() as usize)?;
        for entry in self.segments.read().iter() {
            for vector_index in 0..entry.segment.vector_total() {
                builder.append(&entry.segment.scan(txn, vector_index, true)?)?;
            }
        }
        Ok(builder.finish())
    }

    /// Row ids and values of the rows passing `filters`, as seen by `txn`.
    ///
    /// Vectors without version chains are filtered on their compressed runs, the others are
    /// decompressed for `txn` first. See [`RleSegment::filter_scan`].
    pub fn filter_scan(
        &self,
        txn: &Transaction,
        filters: &[TableFilter],
    ) -> StorageResult<(Vec<u64>, ArrayImpl)> {
        let mut row_ids = vec![];
        let mut builder = self.builder(0)?;
        for entry in self.segments.read().iter() {
            let segment = &entry.segment;
            for vector_index in 0..segment.vector_total() {
                let mut sel = SelectionVector::new_full(segment.vector_count(vector_index));
                let batch = segment.filter_scan(txn, vector_index, &mut sel, filters)?;
                let vector_offset =
                    segment.row_start() + (vector_index * segment.vector_size()) as u64;
                for pos in sel.iter() {
                    row_ids.push(vector_offset + pos as u64);
                    builder.push(&batch.get(pos))?;
                }
            }
        }
        Ok((row_ids, builder.finish()))
    }

    /// Statistics of the whole column.
    pub fn statistics(&self) -> SegmentStatistics {
        let mut stats = SegmentStatistics::new();
        for entry in self.segments.read().iter() {
            stats.merge(&entry.stats.lock());
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::array::PrimitiveArray;
    use crate::storage::{InMemoryBufferManager, TransactionManager};
    use crate::types::DataValue;

    fn column(ty: PhysicalType) -> ColumnData {
        ColumnData::new(
            Arc::new(InMemoryBufferManager::new()),
            SegmentOptions::default_for_test(),
            ty,
        )
        .unwrap()
    }

    fn i64_array(values: impl IntoIterator<Item = i64>) -> ArrayImpl {
        values.into_iter().collect::<PrimitiveArray<i64>>().into()
    }

    #[test]
    fn test_append_rollover() {
        let column = column(PhysicalType::Int64);
        let capacity = 5 * 64;
        column.append(&i64_array(0..capacity - 10)).unwrap();
        assert_eq!(column.segment_count(), 1);
        column.append(&i64_array(0..30)).unwrap();
        assert_eq!(column.segment_count(), 2);
        assert_eq!(column.row_count(), capacity as u64 + 20);
        assert_eq!(column.segments()[1].row_start(), capacity as u64);

        let manager = TransactionManager::new();
        let txn = manager.begin();
        let values = column.scan(&txn).unwrap().to_values();
        assert_eq!(values.len(), capacity as usize + 20);
        assert_eq!(values[capacity as usize - 1], DataValue::Int64(9));
        assert_eq!(values[capacity as usize], DataValue::Int64(10));
        manager.commit(&txn).unwrap();
    }

    #[test]
    fn test_update_across_segments() {
        let column = column(PhysicalType::Int64);
        column.append(&i64_array(0..400)).unwrap();
        let manager = TransactionManager::new();
        let txn = manager.begin();
        column
            .update(&txn, &[1, 2, 70, 330], &i64_array([-1, -2, -70, -330]))
            .unwrap();
        // vectors 0 and 1 of the first segment, vector 0 of the second
        assert_eq!(txn.update_count(), 3);
        column.update(&txn, &[3], &i64_array([-3])).unwrap();
        assert_eq!(txn.update_count(), 3);
        manager.commit(&txn).unwrap();

        let reader = manager.begin();
        let values = column.scan(&reader).unwrap();
        for (row, expected) in [(1, -1), (3, -3), (70, -70), (330, -330), (4, 4)] {
            assert_eq!(values.get(row), DataValue::Int64(expected));
        }
        assert_eq!(column.statistics().min, DataValue::Int64(-330));
        manager.commit(&reader).unwrap();
    }

    #[test]
    fn test_update_invalid_rows() {
        let column = column(PhysicalType::Int64);
        column.append(&i64_array(0..10)).unwrap();
        let manager = TransactionManager::new();
        let txn = manager.begin();
        assert!(column.update(&txn, &[10], &i64_array([0])).is_err());
        assert!(column.update(&txn, &[2, 1], &i64_array([0, 0])).is_err());
        assert_eq!(txn.update_count(), 0);
        manager.abort(&txn).unwrap();
    }

    #[test]
    fn test_update_finished_transaction() {
        let column = column(PhysicalType::Int64);
        column.append(&i64_array(0..10)).unwrap();
        let manager = TransactionManager::new();

        let committed = manager.begin();
        manager.commit(&committed).unwrap();
        let err = column.update(&committed, &[3], &i64_array([30])).unwrap_err();
        assert!(matches!(err.inner(), StorageError::NotFound(..)));

        let aborted = manager.begin();
        manager.abort(&aborted).unwrap();
        assert!(column.update(&aborted, &[3], &i64_array([30])).is_err());
        assert!(!column.segments()[0].has_versions(0));

        // the row stays free for later writers
        let writer = manager.begin();
        column.update(&writer, &[3], &i64_array([31])).unwrap();
        manager.commit(&writer).unwrap();
        let reader = manager.begin();
        assert_eq!(column.scan(&reader).unwrap().get(3), DataValue::Int64(31));
        manager.commit(&reader).unwrap();
    }

    #[test]
    fn test_filter_scan() {
        let column = column(PhysicalType::Int64);
        column.append(&i64_array((0..200).map(|i| i / 50))).unwrap();
        let manager = TransactionManager::new();

        let writer = manager.begin();
        column.update(&writer, &[0], &i64_array([3])).unwrap();

        let reader = manager.begin();
        let (rows, values) = column
            .filter_scan(&reader, &[TableFilter::equal(3i64)])
            .unwrap();
        assert_eq!(rows, (150..200).collect_vec());
        assert_eq!(values.len(), 50);

        // the writer sees its own update
        let (rows, _) = column
            .filter_scan(&writer, &[TableFilter::equal(3i64)])
            .unwrap();
        assert_eq!(rows.len(), 51);
        assert_eq!(rows[0], 0);

        let (rows, _) = column
            .filter_scan(
                &reader,
                &[TableFilter::greater_than_or_equal(1i64), TableFilter::less_than(3i64)],
            )
            .unwrap();
        assert_eq!(rows, (50..150).collect_vec());

        manager.commit(&writer).unwrap();
        manager.commit(&reader).unwrap();
    }

    #[test]
    fn test_variable_length_column() {
        let err = ColumnData::new(
            Arc::new(InMemoryBufferManager::new()),
            SegmentOptions::default_for_test(),
            PhysicalType::Blob,
        )
        .err()
        .unwrap();
        assert!(matches!(err.inner(), StorageError::NotImplemented(_)));
    }
}
