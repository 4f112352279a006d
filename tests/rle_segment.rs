// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::sync::Arc;

use rle_segment::array::{ArrayImpl, PrimitiveArray, SelectionVector};
use rle_segment::storage::rle::{ColumnScanState, RleSegment, SegmentStatistics, TableFilter};
use rle_segment::storage::{
    InMemoryBufferManager, SegmentOptions, StorageError, TransactionManager,
};
use rle_segment::types::{DataValue, PhysicalType};

fn sample() -> ArrayImpl {
    [Some(5), Some(5), Some(5), Some(3), Some(3), None, None, Some(7)]
        .into_iter()
        .collect::<PrimitiveArray<i32>>()
        .into()
}

fn segment_with(
    source: &ArrayImpl,
) -> (Arc<InMemoryBufferManager>, RleSegment, SegmentStatistics) {
    let buffer_manager = Arc::new(InMemoryBufferManager::new());
    let segment = RleSegment::new(
        buffer_manager.clone(),
        &SegmentOptions::default(),
        source.physical_type(),
        0,
    )
    .unwrap();
    let mut stats = SegmentStatistics::new();
    let appended = segment.append(&mut stats, source, 0, source.len()).unwrap();
    assert_eq!(appended, source.len());
    (buffer_manager, segment, stats)
}

#[test]
fn append_scan_and_select() {
    let source = sample();
    let (_, segment, stats) = segment_with(&source);
    assert_eq!(segment.tuple_count(), 8);
    assert_eq!(stats.min, DataValue::Int32(3));
    assert_eq!(stats.max, DataValue::Int32(7));
    assert!(stats.has_null);

    let manager = TransactionManager::new();
    let txn = manager.begin();
    assert_eq!(segment.scan(&txn, 0, true).unwrap(), source);
    manager.commit(&txn).unwrap();

    let state = ColumnScanState::new(0);
    let mut result = ArrayImpl::new_null(PhysicalType::Int32, 0).unwrap();
    let mut sel = SelectionVector::new_full(8);
    segment
        .select(&state, &mut result, &mut sel, &[TableFilter::greater_than(4)])
        .unwrap();
    assert_eq!(sel.as_slice(), &[0, 1, 2, 7]);
    for id in sel.iter() {
        assert_eq!(result.get(id), source.get(id));
    }

    let mut sel = SelectionVector::new_full(8);
    segment
        .select(
            &state,
            &mut result,
            &mut sel,
            &[TableFilter::greater_than_or_equal(3), TableFilter::less_than(5)],
        )
        .unwrap();
    assert_eq!(sel.as_slice(), &[3, 4]);
}

#[test]
fn fetch_row_and_filter_fetch() {
    let source = sample();
    let (_, segment, _) = segment_with(&source);
    assert_eq!(segment.fetch_row(3).unwrap(), DataValue::Int32(3));
    assert_eq!(segment.fetch_row(6).unwrap(), DataValue::Null);
    assert!(matches!(
        segment.fetch_row(8).unwrap_err().inner(),
        StorageError::InvalidRowId(8)
    ));

    let sel = SelectionVector::from(vec![1, 5, 7]);
    let mut result = ArrayImpl::new_null(PhysicalType::Int32, 0).unwrap();
    segment
        .filter_fetch_base_data(&ColumnScanState::new(0), &mut result, &sel)
        .unwrap();
    assert_eq!(result.get(1), DataValue::Int32(5));
    assert_eq!(result.get(5), DataValue::Null);
    assert_eq!(result.get(7), DataValue::Int32(7));
}

#[test]
fn rejected_filters() {
    let (_, segment, _) = segment_with(&sample());
    let state = ColumnScanState::new(0);
    let mut result = ArrayImpl::new_null(PhysicalType::Int32, 0).unwrap();

    let mut select = |filters: &[TableFilter]| {
        let mut sel = SelectionVector::new_full(8);
        segment
            .select(&state, &mut result, &mut sel, filters)
            .unwrap_err()
    };
    assert!(matches!(
        select(&[TableFilter::equal(5i64)]).inner(),
        StorageError::InvalidType { .. }
    ));
    assert!(matches!(
        select(&vec![TableFilter::equal(5); 3]).inner(),
        StorageError::InvalidFilter(_)
    ));
}

#[test]
fn attach_existing_block() {
    let source: ArrayImpl = (0..500i64).map(|i| i / 7).collect::<PrimitiveArray<i64>>().into();
    let (buffer_manager, segment, _) = segment_with(&source);
    let block_id = segment.block_id();
    drop(segment);
    assert_eq!(buffer_manager.pin_count(block_id), Some(0));

    let attached = RleSegment::attach(
        buffer_manager.clone(),
        &SegmentOptions::default(),
        PhysicalType::Int64,
        0,
        block_id,
        500,
    )
    .unwrap();
    let manager = TransactionManager::new();
    let txn = manager.begin();
    assert_eq!(attached.scan(&txn, 0, false).unwrap(), source);
    manager.commit(&txn).unwrap();

    // appending continues the tail run
    let mut stats = SegmentStatistics::new();
    let more: ArrayImpl = [71i64, 72].into_iter().collect::<PrimitiveArray<i64>>().into();
    attached.append(&mut stats, &more, 0, 2).unwrap();
    assert_eq!(attached.fetch_row(500).unwrap(), DataValue::Int64(71));
    assert_eq!(attached.fetch_row(499).unwrap(), DataValue::Int64(71));
}

#[test]
fn invalid_options() {
    let options = SegmentOptions {
        block_size: 16,
        vector_size: 1024,
    };
    let err = RleSegment::new(
        Arc::new(InMemoryBufferManager::new()),
        &options,
        PhysicalType::Int64,
        0,
    )
    .unwrap_err();
    assert!(matches!(err.inner(), StorageError::InvalidOptions(_)));
}
