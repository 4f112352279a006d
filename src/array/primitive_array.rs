// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt::Debug;
use std::iter::FromIterator;

use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};

use super::{Array, ArrayBuilder};
use crate::types::NativeType;

/// A collection of primitive types, such as `i32`, `f32`.
///
/// The array is flat: every position owns a data slot, and the validity bitmap tells whether
/// the slot holds a value. Invalid slots keep `T::default()`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveArray<T: NativeType> {
    valid: BitVec,
    data: Vec<T>,
}

impl<T: NativeType> PrimitiveArray<T> {
    /// Create an array of `len` null slots, to be filled with [`PrimitiveArray::set`].
    pub fn new_null(len: usize) -> Self {
        Self {
            valid: BitVec::repeat(false, len),
            data: vec![T::default(); len],
        }
    }

    /// Overwrite the slot at `idx`.
    pub fn set(&mut self, idx: usize, value: Option<T>) {
        self.valid.set(idx, value.is_some());
        self.data[idx] = value.unwrap_or_default();
    }

    /// Whether the slot at `idx` is null.
    pub fn is_null(&self, idx: usize) -> bool {
        !self.valid[idx]
    }

    pub fn null_count(&self) -> usize {
        self.valid.count_zeros()
    }

    /// Returns a copy of the element at `idx`.
    pub fn value_at(&self, idx: usize) -> Option<T> {
        self.get(idx).copied()
    }

    pub fn to_vec(&self) -> Vec<Option<T>> {
        self.iter().map(|x| x.copied()).collect()
    }
}

impl<T: NativeType> Debug for PrimitiveArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// Enable `collect()` an array from iterator of `Option<T>`.
impl<T: NativeType> FromIterator<Option<T>> for PrimitiveArray<T> {
    fn from_iter<I: IntoIterator<Item = Option<T>>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut builder = <Self as Array>::Builder::with_capacity(iter.size_hint().0);
        for e in iter {
            builder.push(e.as_ref());
        }
        builder.finish()
    }
}

// Enable `collect()` an array from iterator of `T`.
impl<T: NativeType> FromIterator<T> for PrimitiveArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter().map(Some).collect()
    }
}

impl<T: NativeType> Array for PrimitiveArray<T> {
    type Item = T;
    type Builder = PrimitiveArrayBuilder<T>;

    fn get(&self, idx: usize) -> Option<&T> {
        self.valid[idx].then(|| &self.data[idx])
    }

    fn len(&self) -> usize {
        self.valid.len()
    }
}

/// A builder that constructs a [`PrimitiveArray`] from `Option<T>`.
pub struct PrimitiveArrayBuilder<T: NativeType> {
    valid: BitVec,
    data: Vec<T>,
}

impl<T: NativeType> ArrayBuilder for PrimitiveArrayBuilder<T> {
    type Array = PrimitiveArray<T>;

    fn with_capacity(capacity: usize) -> Self {
        Self {
            valid: BitVec::with_capacity(capacity),
            data: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, value: Option<&T>) {
        self.valid.push(value.is_some());
        self.data.push(value.cloned().unwrap_or_default());
    }

    fn append(&mut self, other: &PrimitiveArray<T>) {
        self.valid.extend_from_bitslice(&other.valid);
        self.data.extend_from_slice(&other.data);
    }

    fn finish(self) -> PrimitiveArray<T> {
        PrimitiveArray {
            valid: self.valid,
            data: self.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_builder<T: NativeType + From<i8>>() {
        let iter = (0..100i8).map(|x| if x % 2 == 0 { None } else { Some(T::from(x)) });
        let array = iter.clone().collect::<PrimitiveArray<T>>();
        assert_eq!(array.to_vec(), iter.collect::<Vec<_>>());
        assert_eq!(array.null_count(), 50);
    }

    #[test]
    fn test_builder_i16() {
        test_builder::<i16>();
    }

    #[test]
    fn test_builder_i64() {
        test_builder::<i64>();
    }

    #[test]
    fn test_builder_f64() {
        test_builder::<f64>();
    }

    #[test]
    fn test_set() {
        let mut array = PrimitiveArray::<i32>::new_null(4);
        assert_eq!(array.to_vec(), vec![None; 4]);
        array.set(1, Some(7));
        array.set(3, Some(9));
        array.set(3, None);
        assert_eq!(array.to_vec(), vec![None, Some(7), None, None]);
        assert!(array.is_null(3));
    }
}
