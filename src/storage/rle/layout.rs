// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! Division of a block into vector regions.
//!
//! Every region has the same size and holds one vector in compressed form:
//!
//! ```plain
//! | nullmask (V / 8 bytes) | values (V * width) | run lengths (V * u32) |
//! ```
//!
//! Bit `k` of the nullmask and slot `k` of the value and run length arrays describe run `k`.
//! The arrays are sized for the worst case of one run per tuple.

use std::ops::Range;

use bitvec::prelude::*;
use bytes::{Buf, BufMut};

use super::encode::PrimitiveFixedWidthEncode;
use crate::storage::{SegmentOptions, StorageResult, TracedStorageError};

const RUN_LENGTH_WIDTH: usize = std::mem::size_of::<u32>();

/// Offsets of the vector regions within a block, computed once per segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorLayout {
    vector_size: usize,
    width: usize,
    region_size: usize,
    max_vector_count: usize,
}

impl VectorLayout {
    pub fn new(options: &SegmentOptions, width: usize) -> StorageResult<Self> {
        options.validate()?;
        let vector_size = options.vector_size;
        let region_size = vector_size / 8 + vector_size * (width + RUN_LENGTH_WIDTH);
        let max_vector_count = options.block_size / region_size;
        if max_vector_count == 0 {
            return Err(TracedStorageError::invalid_options(format!(
                "block of {} bytes cannot hold a vector region of {} bytes",
                options.block_size, region_size
            )));
        }
        Ok(Self {
            vector_size,
            width,
            region_size,
            max_vector_count,
        })
    }

    pub fn vector_size(&self) -> usize {
        self.vector_size
    }

    pub fn region_size(&self) -> usize {
        self.region_size
    }

    pub fn max_vector_count(&self) -> usize {
        self.max_vector_count
    }

    pub fn max_tuple_count(&self) -> usize {
        self.max_vector_count * self.vector_size
    }

    fn region_range(&self, vector_index: usize) -> StorageResult<Range<usize>> {
        if vector_index >= self.max_vector_count {
            return Err(TracedStorageError::not_found("vector", vector_index));
        }
        let start = vector_index * self.region_size;
        Ok(start..start + self.region_size)
    }

    fn split_sizes(&self) -> (usize, usize) {
        (self.vector_size / 8, self.vector_size * self.width)
    }

    /// Read-only view of a region.
    pub fn region<'a>(&self, block: &'a [u8], vector_index: usize) -> StorageResult<VectorRegion<'a>> {
        let range = self.region_range(vector_index)?;
        let bytes = block
            .get(range)
            .ok_or_else(|| TracedStorageError::decode("block smaller than its layout"))?;
        let (nullmask_size, values_size) = self.split_sizes();
        let (nullmask, rest) = bytes.split_at(nullmask_size);
        let (values, run_lengths) = rest.split_at(values_size);
        Ok(VectorRegion {
            nullmask: nullmask.view_bits::<Lsb0>(),
            values,
            run_lengths,
            width: self.width,
        })
    }

    /// Mutable view of a region.
    pub fn region_mut<'a>(
        &self,
        block: &'a mut [u8],
        vector_index: usize,
    ) -> StorageResult<VectorRegionMut<'a>> {
        let range = self.region_range(vector_index)?;
        let bytes = block
            .get_mut(range)
            .ok_or_else(|| TracedStorageError::decode("block smaller than its layout"))?;
        let (nullmask_size, values_size) = self.split_sizes();
        let (nullmask, rest) = bytes.split_at_mut(nullmask_size);
        let (values, run_lengths) = rest.split_at_mut(values_size);
        Ok(VectorRegionMut {
            nullmask: nullmask.view_bits_mut::<Lsb0>(),
            values,
            run_lengths,
            width: self.width,
        })
    }
}

/// Read-only view of one vector region.
#[derive(Clone, Copy)]
pub struct VectorRegion<'a> {
    nullmask: &'a BitSlice<u8, Lsb0>,
    values: &'a [u8],
    run_lengths: &'a [u8],
    width: usize,
}

impl<'a> VectorRegion<'a> {
    pub fn is_null(&self, run: usize) -> bool {
        self.nullmask[run]
    }

    pub fn value<T: PrimitiveFixedWidthEncode>(&self, run: usize) -> T {
        let mut buf = &self.values[run * self.width..(run + 1) * self.width];
        T::decode(&mut buf)
    }

    /// Value of a run, `None` for a null run.
    pub fn get<T: PrimitiveFixedWidthEncode>(&self, run: usize) -> Option<T> {
        (!self.is_null(run)).then(|| self.value(run))
    }

    pub fn run_length(&self, run: usize) -> u32 {
        let start = run * RUN_LENGTH_WIDTH;
        let mut buf = &self.run_lengths[start..start + RUN_LENGTH_WIDTH];
        buf.get_u32_le()
    }

    /// Number of runs covering the first `tuple_count` tuples of the region.
    pub fn run_count(&self, tuple_count: usize) -> StorageResult<usize> {
        let mut covered = 0;
        let mut runs = 0;
        while covered < tuple_count {
            if runs * RUN_LENGTH_WIDTH >= self.run_lengths.len() {
                return Err(TracedStorageError::decode("run lengths exceed the region"));
            }
            let len = self.run_length(runs) as usize;
            if len == 0 {
                return Err(TracedStorageError::decode(format!("empty run {runs}")));
            }
            covered += len;
            runs += 1;
        }
        if covered != tuple_count {
            return Err(TracedStorageError::decode(format!(
                "runs cover {covered} tuples, expected {tuple_count}"
            )));
        }
        Ok(runs)
    }
}

/// Mutable view of one vector region.
pub struct VectorRegionMut<'a> {
    nullmask: &'a mut BitSlice<u8, Lsb0>,
    values: &'a mut [u8],
    run_lengths: &'a mut [u8],
    width: usize,
}

impl<'a> VectorRegionMut<'a> {
    pub fn as_region(&self) -> VectorRegion<'_> {
        VectorRegion {
            nullmask: &*self.nullmask,
            values: &*self.values,
            run_lengths: &*self.run_lengths,
            width: self.width,
        }
    }

    /// Clear every null bit of the region.
    pub fn reset(&mut self) {
        self.nullmask.fill(false);
    }

    /// Write run `run`. Null runs store the default value.
    pub fn set_run<T: PrimitiveFixedWidthEncode>(&mut self, run: usize, value: Option<T>, len: u32) {
        self.nullmask.set(run, value.is_none());
        let mut buf = &mut self.values[run * self.width..(run + 1) * self.width];
        value.as_ref().unwrap_or(T::DEFAULT_VALUE).encode(&mut buf);
        self.set_run_length(run, len);
    }

    pub fn set_run_length(&mut self, run: usize, len: u32) {
        let start = run * RUN_LENGTH_WIDTH;
        let mut buf = &mut self.run_lengths[start..start + RUN_LENGTH_WIDTH];
        buf.put_u32_le(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_size() {
        let options = SegmentOptions::default();
        let layout = VectorLayout::new(&options, 4).unwrap();
        assert_eq!(layout.region_size(), 1024 / 8 + 1024 * 8);
        assert_eq!(layout.max_vector_count(), (262144 - 8) / (128 + 8192));
    }

    #[test]
    fn test_layout_too_small() {
        let options = SegmentOptions {
            block_size: 100,
            vector_size: 64,
        };
        assert!(VectorLayout::new(&options, 8).is_err());
    }

    #[test]
    fn test_regions_do_not_overlap() {
        let options = SegmentOptions::default_for_test();
        let layout = VectorLayout::new(&options, 2).unwrap();
        let mut block = vec![0u8; options.block_size];
        {
            let mut region = layout.region_mut(&mut block, 1).unwrap();
            region.set_run(0, Some(-3i16), 5);
            region.set_run::<i16>(1, None, 2);
        }
        let first = layout.region(&block, 0).unwrap();
        assert_eq!(first.run_length(0), 0);
        assert!(!first.is_null(1));

        let second = layout.region(&block, 1).unwrap();
        assert_eq!(second.get::<i16>(0), Some(-3));
        assert_eq!(second.get::<i16>(1), None);
        assert_eq!(second.run_count(7).unwrap(), 2);
        assert!(second.run_count(6).is_err());
    }

    #[test]
    fn test_vector_out_of_range() {
        let options = SegmentOptions::default_for_test();
        let layout = VectorLayout::new(&options, 8).unwrap();
        let block = vec![0u8; options.block_size];
        assert!(layout.region(&block, layout.max_vector_count()).is_err());
    }
}
