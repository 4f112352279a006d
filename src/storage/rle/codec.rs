// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Run-length codec over vector regions.
//!
//! A segment resolves its [`RleCodec`] once from its physical type. All per-type work happens in
//! [`PrimitiveRleCodec`], which is generic over the native value type.

use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;

use super::delta::VectorUpdates;
use super::encode::RleValue;
use super::filter::{ComparisonKind, TableFilter};
use super::layout::{VectorRegion, VectorRegionMut};
use super::statistics::SegmentStatistics;
use crate::array::{ArrayImpl, PrimitiveArray, SelectionVector};
use crate::storage::{StorageResult, TracedStorageError};
use crate::types::{DataValue, PhysicalType};

/// Compressed tuples of one vector together with their overlay.
#[derive(Clone, Copy)]
pub struct VectorInput<'a> {
    pub region: VectorRegion<'a>,
    /// Number of logical tuples in the region.
    pub tuple_count: usize,
    pub updates: Option<&'a VectorUpdates>,
}

impl<'a> VectorInput<'a> {
    fn overlay(&self, range: Range<usize>) -> &'a [(u32, DataValue)] {
        match self.updates {
            Some(updates) => updates.range(range.start as u32..range.end as u32),
            None => &[],
        }
    }
}

/// Type-specialized operations of an RLE segment.
pub trait RleCodec: Send + Sync {
    /// Append `count` tuples of `source` starting at `offset` to a region already holding
    /// `existing` tuples. The caller guarantees the region has room for them.
    fn append(
        &self,
        region: VectorRegionMut<'_>,
        existing: usize,
        stats: &mut SegmentStatistics,
        source: &ArrayImpl,
        offset: usize,
        count: usize,
    ) -> StorageResult<()>;

    /// Decompress every tuple of the vector, overlay included.
    fn decompress(&self, input: &VectorInput<'_>) -> ArrayImpl;

    /// Latest value of tuple `id`, overlay included.
    fn fetch_value(&self, input: &VectorInput<'_>, id: usize) -> DataValue;

    /// Materialize the selected tuples, nulls and overlay included.
    fn filter_fetch(&self, input: &VectorInput<'_>, result: &mut ArrayImpl, sel: &SelectionVector);

    /// Narrow `sel` to the tuples passing all `filters`, evaluated on the compressed runs.
    ///
    /// Accepts no filter, one comparison, or a range given as a lower bound (`>`, `>=`)
    /// followed by an upper bound (`<`, `<=`). Anything else is `InvalidFilter`.
    fn select(
        &self,
        input: &VectorInput<'_>,
        result: &mut ArrayImpl,
        sel: &mut SelectionVector,
        filters: &[TableFilter],
    ) -> StorageResult<()>;

    /// Narrow `sel` to the tuples of an already decompressed batch passing all `filters`.
    /// Takes the same filter forms as [`RleCodec::select`].
    fn filter_batch(
        &self,
        batch: &ArrayImpl,
        sel: &mut SelectionVector,
        filters: &[TableFilter],
    ) -> StorageResult<()>;
}

macro_rules! impl_codec_for {
    ([], $( { $Abc:ident, $Type:ty, $abc:ident } ),*) => {
        /// Resolve the codec of a physical type.
        pub fn codec_for(ty: PhysicalType) -> StorageResult<Arc<dyn RleCodec>> {
            match ty {
                $(
                    PhysicalType::$Abc => Ok(Arc::new(PrimitiveRleCodec::<$Type>::new())),
                )*
                other => Err(TracedStorageError::not_implemented(format!(
                    "RLE segment for {other}"
                ))),
            }
        }
    };
}

crate::for_all_variants! { impl_codec_for }

/// Position of a forward-only scan over the runs of a region.
struct RunCursor<'a, T> {
    region: VectorRegion<'a>,
    run: usize,
    /// First tuple covered by `run`.
    start: usize,
    len: usize,
    value: Option<T>,
}

impl<'a, T: RleValue> RunCursor<'a, T> {
    fn new(region: VectorRegion<'a>, tuple_count: usize) -> Self {
        let mut cursor = Self {
            region,
            run: 0,
            start: 0,
            len: 0,
            value: None,
        };
        if tuple_count > 0 {
            cursor.load();
        }
        cursor
    }

    fn load(&mut self) {
        self.len = self.region.run_length(self.run) as usize;
        self.value = self.region.get(self.run);
    }

    /// Value of tuple `id`. `id` never decreases between calls.
    fn seek(&mut self, id: usize) -> Option<T> {
        while self.start + self.len <= id {
            self.start += self.len;
            self.run += 1;
            self.load();
        }
        self.value
    }
}

/// Materializes whole runs into an output batch, in order.
struct RunMaterializer<'a> {
    input: VectorInput<'a>,
    run: usize,
    /// First tuple not yet materialized.
    start: usize,
}

impl<'a> RunMaterializer<'a> {
    fn new(input: VectorInput<'a>) -> Self {
        Self {
            input,
            run: 0,
            start: 0,
        }
    }

    /// Materialize every run up to and including the one covering `id`, base values first and
    /// then their overlay entries.
    fn materialize_until<T: RleValue>(&mut self, id: usize, out: &mut PrimitiveArray<T>) {
        let region = self.input.region;
        while self.start <= id {
            let len = region.run_length(self.run) as usize;
            let end = (self.start + len).min(self.input.tuple_count);
            let value = region.get::<T>(self.run);
            for i in self.start..end {
                out.set(i, value);
            }
            for (i, v) in self.input.overlay(self.start..end) {
                out.set(*i as usize, T::from_data_value(v));
            }
            self.start += len;
            self.run += 1;
        }
    }
}

pub struct PrimitiveRleCodec<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T: RleValue> PrimitiveRleCodec<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }

    /// Check the filters against the physical type and convert their constants.
    fn bind_filters(&self, filters: &[TableFilter]) -> StorageResult<Vec<(ComparisonKind, T)>> {
        if filters.len() > 2 {
            return Err(TracedStorageError::invalid_filter(format!(
                "expected at most 2 filters, got {}",
                filters.len()
            )));
        }
        if let [lower, upper] = filters {
            if !lower.comparison.is_lower_bound() || !upper.comparison.is_upper_bound() {
                return Err(TracedStorageError::invalid_filter(format!(
                    "expected a lower and an upper bound, got {lower} and {upper}"
                )));
            }
        }
        if !filters.is_empty() && !T::FILTERABLE {
            return Err(TracedStorageError::invalid_type(
                T::PHYSICAL_TYPE,
                "comparison filters are not supported",
            ));
        }
        filters
            .iter()
            .map(|f| match T::from_data_value(&f.constant) {
                Some(c) => Ok((f.comparison, c)),
                None => Err(TracedStorageError::invalid_type(
                    T::PHYSICAL_TYPE,
                    format!("filter constant {} does not match", f.constant),
                )),
            })
            .collect()
    }

    fn typed<'b>(&self, array: &'b ArrayImpl) -> StorageResult<&'b PrimitiveArray<T>> {
        T::as_array(array).ok_or_else(|| {
            TracedStorageError::invalid_type(
                T::PHYSICAL_TYPE,
                format!("got a batch of {}", array.physical_type()),
            )
        })
    }

    fn passes(value: &T, filters: &[(ComparisonKind, T)]) -> bool {
        filters.iter().all(|(kind, constant)| kind.evaluate(value, constant))
    }

    /// One comparison: locate the run of every selected tuple, or its overlay entry, and
    /// evaluate against that value only.
    fn select_single(
        &self,
        input: &VectorInput<'_>,
        sel: &mut SelectionVector,
        filter: &(ComparisonKind, T),
    ) -> PrimitiveArray<T> {
        let mut out = PrimitiveArray::new_null(input.tuple_count);
        let mut cursor = RunCursor::<T>::new(input.region, input.tuple_count);
        let overlay = input.overlay(0..input.tuple_count);
        let mut next_override = 0;
        let mut approved = 0;
        for k in 0..sel.len() {
            let id = sel.get(k);
            while next_override < overlay.len() && (overlay[next_override].0 as usize) < id {
                next_override += 1;
            }
            let value = match overlay.get(next_override) {
                Some((i, v)) if *i as usize == id => T::from_data_value(v),
                _ => cursor.seek(id),
            };
            if let Some(v) = value {
                if filter.0.evaluate(&v, &filter.1) {
                    out.set(id, Some(v));
                    sel.set(approved, id);
                    approved += 1;
                }
            }
        }
        sel.truncate(approved);
        out
    }

    /// Two comparisons: every run visited on the way to a selected tuple is materialized, then
    /// both comparisons are evaluated on the materialized value.
    fn select_range(
        &self,
        input: &VectorInput<'_>,
        sel: &mut SelectionVector,
        filters: &[(ComparisonKind, T)],
    ) -> PrimitiveArray<T> {
        let mut out = PrimitiveArray::new_null(input.tuple_count);
        let mut materializer = RunMaterializer::new(*input);
        let mut approved = 0;
        for k in 0..sel.len() {
            let id = sel.get(k);
            materializer.materialize_until(id, &mut out);
            if let Some(v) = out.value_at(id) {
                if Self::passes(&v, filters) {
                    sel.set(approved, id);
                    approved += 1;
                }
            }
        }
        sel.truncate(approved);
        out
    }
}

impl<T: RleValue> Default for PrimitiveRleCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RleValue> RleCodec for PrimitiveRleCodec<T> {
    fn append(
        &self,
        mut region: VectorRegionMut<'_>,
        existing: usize,
        stats: &mut SegmentStatistics,
        source: &ArrayImpl,
        offset: usize,
        count: usize,
    ) -> StorageResult<()> {
        let array = self.typed(source)?;
        let mut run_count = region.as_region().run_count(existing)?;
        // the last run of the region, extended when the next tuple equals it
        let mut tail: Option<(Option<T>, u32)> = (run_count > 0).then(|| {
            let r = region.as_region();
            (r.get(run_count - 1), r.run_length(run_count - 1))
        });
        for value in (offset..offset + count).map(|i| array.value_at(i)) {
            match tail {
                Some((prev, len)) if prev == value => {
                    region.set_run_length(run_count - 1, len + 1);
                    tail = Some((prev, len + 1));
                }
                _ => {
                    stats.update(value.map_or(DataValue::Null, T::into_data_value));
                    region.set_run(run_count, value, 1);
                    run_count += 1;
                    tail = Some((value, 1));
                }
            }
        }
        Ok(())
    }

    fn decompress(&self, input: &VectorInput<'_>) -> ArrayImpl {
        let mut out = PrimitiveArray::new_null(input.tuple_count);
        let mut cursor = RunCursor::<T>::new(input.region, input.tuple_count);
        let mut overlay = input.overlay(0..input.tuple_count).iter().peekable();
        for i in 0..input.tuple_count {
            let base = cursor.seek(i);
            let value = match overlay.next_if(|(id, _)| *id as usize == i) {
                Some((_, v)) => T::from_data_value(v),
                None => base,
            };
            out.set(i, value);
        }
        T::into_array_impl(out)
    }

    fn fetch_value(&self, input: &VectorInput<'_>, id: usize) -> DataValue {
        if let Some(v) = input.updates.and_then(|u| u.get(id as u32)) {
            return *v;
        }
        let mut cursor = RunCursor::<T>::new(input.region, input.tuple_count);
        cursor.seek(id).map_or(DataValue::Null, T::into_data_value)
    }

    fn filter_fetch(&self, input: &VectorInput<'_>, result: &mut ArrayImpl, sel: &SelectionVector) {
        let mut out = PrimitiveArray::new_null(input.tuple_count);
        let mut cursor = RunCursor::<T>::new(input.region, input.tuple_count);
        let overlay = input.overlay(0..input.tuple_count);
        let mut next_override = 0;
        for id in sel.iter() {
            while next_override < overlay.len() && (overlay[next_override].0 as usize) < id {
                next_override += 1;
            }
            let value = match overlay.get(next_override) {
                Some((i, v)) if *i as usize == id => T::from_data_value(v),
                _ => cursor.seek(id),
            };
            out.set(id, value);
        }
        *result = T::into_array_impl(out);
    }

    fn select(
        &self,
        input: &VectorInput<'_>,
        result: &mut ArrayImpl,
        sel: &mut SelectionVector,
        filters: &[TableFilter],
    ) -> StorageResult<()> {
        let filters = self.bind_filters(filters)?;
        let out = match filters.as_slice() {
            [] => {
                self.filter_fetch(input, result, sel);
                return Ok(());
            }
            [filter] => self.select_single(input, sel, filter),
            range => self.select_range(input, sel, range),
        };
        *result = T::into_array_impl(out);
        Ok(())
    }

    fn filter_batch(
        &self,
        batch: &ArrayImpl,
        sel: &mut SelectionVector,
        filters: &[TableFilter],
    ) -> StorageResult<()> {
        let filters = self.bind_filters(filters)?;
        let array = self.typed(batch)?;
        let mut approved = 0;
        for k in 0..sel.len() {
            let id = sel.get(k);
            if let Some(v) = array.value_at(id) {
                if Self::passes(&v, &filters) {
                    sel.set(approved, id);
                    approved += 1;
                }
            }
        }
        sel.truncate(approved);
        Ok(())
    }
}
