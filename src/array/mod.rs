// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

//! In-memory batches exchanged with column segments.
//!
//! A batch is flat: position `i` of an [`ArrayImpl`] is logical tuple `i` of the vector it was
//! read from. Filtering does not compact batches, it narrows a [`SelectionVector`] instead.

use serde::{Deserialize, Serialize};

use crate::types::{DataValue, PhysicalType, ScalarConvert};

mod iterator;
mod primitive_array;
mod selection_vector;

pub use self::iterator::ArrayIter;
pub use self::primitive_array::*;
pub use self::selection_vector::*;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ArrayError {
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: PhysicalType,
        actual: DataValue,
    },
    #[error("index {index} out of boundary for array of length {len}")]
    IndexOutOfBoundary { index: usize, len: usize },
}

/// A trait over all array builders.
///
/// `push` always accepts a reference to an element, e.g. `builder.push(Some(&1))`.
pub trait ArrayBuilder {
    /// Corresponding `Array` of this builder
    type Array: Array<Builder = Self>;

    /// Create a new builder with `capacity`.
    fn with_capacity(capacity: usize) -> Self;

    /// Append a value to builder.
    fn push(&mut self, value: Option<&<Self::Array as Array>::Item>);

    /// Append an array to builder.
    fn append(&mut self, other: &Self::Array);

    /// Finish build and return a new array.
    fn finish(self) -> Self::Array;
}

/// A trait over all array.
///
/// `Array` must be built with an `ArrayBuilder`. The array trait provides several
/// unified interface on an array, like `len`, `get` and `iter`.
pub trait Array: Sized {
    /// Corresponding builder of this array.
    type Builder: ArrayBuilder<Array = Self>;

    /// Type of element in the array.
    type Item: ?Sized;

    /// Retrieve a reference to value.
    fn get(&self, idx: usize) -> Option<&Self::Item>;

    /// Number of items of array.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get iterator of current array.
    fn iter(&self) -> ArrayIter<'_, Self> {
        ArrayIter::new(self)
    }
}

macro_rules! impl_array_impl {
    ([], $( { $Abc:ident, $Type:ty, $abc:ident } ),*) => {
        /// Embeds all fixed-width arrays.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub enum ArrayImpl {
            $(
                $Abc(PrimitiveArray<$Type>),
            )*
        }

        /// Embeds all fixed-width array builders.
        pub enum ArrayBuilderImpl {
            $(
                $Abc(PrimitiveArrayBuilder<$Type>),
            )*
        }

        $(
            impl From<PrimitiveArray<$Type>> for ArrayImpl {
                fn from(array: PrimitiveArray<$Type>) -> Self {
                    Self::$Abc(array)
                }
            }

            impl<'a> TryFrom<&'a ArrayImpl> for &'a PrimitiveArray<$Type> {
                type Error = PhysicalType;

                /// Returns the physical type of `array` on mismatch.
                fn try_from(array: &'a ArrayImpl) -> Result<Self, Self::Error> {
                    match array {
                        ArrayImpl::$Abc(a) => Ok(a),
                        other => Err(other.physical_type()),
                    }
                }
            }

        )*

        impl ArrayImpl {
            /// Create an array of `len` nulls. Returns `None` for variable-length types.
            pub fn new_null(ty: PhysicalType, len: usize) -> Option<Self> {
                match ty {
                    $(
                        PhysicalType::$Abc => Some(Self::$Abc(PrimitiveArray::new_null(len))),
                    )*
                    _ => None,
                }
            }

            pub fn physical_type(&self) -> PhysicalType {
                match self {
                    $(
                        Self::$Abc(_) => PhysicalType::$Abc,
                    )*
                }
            }

            /// Number of items of array.
            pub fn len(&self) -> usize {
                match self {
                    $(
                        Self::$Abc(a) => a.len(),
                    )*
                }
            }

            /// Get the value at the given index.
            pub fn get(&self, idx: usize) -> DataValue {
                match self {
                    $(
                        Self::$Abc(a) => a.value_at(idx).into(),
                    )*
                }
            }

            /// Overwrite the value at the given index. `DataValue::Null` clears the slot.
            pub fn set(&mut self, idx: usize, value: &DataValue) -> Result<(), ArrayError> {
                let len = self.len();
                if idx >= len {
                    return Err(ArrayError::IndexOutOfBoundary { index: idx, len });
                }
                match self {
                    $(
                        Self::$Abc(a) => {
                            if value.is_null() {
                                a.set(idx, None);
                                return Ok(());
                            }
                            match <$Type as ScalarConvert>::from_data_value(value) {
                                Some(v) => a.set(idx, Some(v)),
                                None => return Err(ArrayError::TypeMismatch {
                                    expected: PhysicalType::$Abc,
                                    actual: *value,
                                }),
                            }
                        }
                    )*
                }
                Ok(())
            }
        }

        impl ArrayBuilderImpl {
            /// Create a new array builder from physical type.
            /// Returns `None` for variable-length types.
            pub fn with_capacity(ty: PhysicalType, capacity: usize) -> Option<Self> {
                match ty {
                    $(
                        PhysicalType::$Abc => Some(Self::$Abc(PrimitiveArrayBuilder::with_capacity(capacity))),
                    )*
                    _ => None,
                }
            }

            /// Appends an element to the back of array.
            pub fn push(&mut self, v: &DataValue) -> Result<(), ArrayError> {
                match self {
                    $(
                        Self::$Abc(a) => {
                            if v.is_null() {
                                a.push(None);
                                return Ok(());
                            }
                            match <$Type as ScalarConvert>::from_data_value(v) {
                                Some(v) => a.push(Some(&v)),
                                None => return Err(ArrayError::TypeMismatch {
                                    expected: PhysicalType::$Abc,
                                    actual: *v,
                                }),
                            }
                        }
                    )*
                }
                Ok(())
            }

            /// Appends an array of the same type.
            pub fn append(&mut self, array_impl: &ArrayImpl) -> Result<(), ArrayError> {
                match (self, array_impl) {
                    $(
                        (Self::$Abc(builder), ArrayImpl::$Abc(arr)) => builder.append(arr),
                    )*
                    (builder, other) => {
                        return Err(ArrayError::TypeMismatch {
                            expected: builder.physical_type(),
                            actual: if other.len() > 0 { other.get(0) } else { DataValue::Null },
                        })
                    }
                }
                Ok(())
            }

            pub fn physical_type(&self) -> PhysicalType {
                match self {
                    $(
                        Self::$Abc(_) => PhysicalType::$Abc,
                    )*
                }
            }

            /// Finish build and return a new array.
            pub fn finish(self) -> ArrayImpl {
                match self {
                    $(
                        Self::$Abc(a) => ArrayImpl::$Abc(a.finish()),
                    )*
                }
            }
        }
    };
}

crate::for_all_variants! { impl_array_impl }

impl ArrayImpl {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collect all values of the array.
    pub fn to_values(&self) -> Vec<DataValue> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }
}
