// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt::{Display, Formatter};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::Interval;

/// A wrapper around floats providing implementations of `Eq`, `Ord`, and `Hash`.
pub type F32 = OrderedFloat<f32>;
pub type F64 = OrderedFloat<f64>;

/// Primitive scalar value.
///
/// Used for filter constants, statistics and the sparse update structures, where values of
/// different physical types travel through the same code path.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum DataValue {
    // NOTE: Null comes first.
    // => NULL is less than any non-NULL values
    #[default]
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    Float32(F32),
    Float64(F64),
    Interval(Interval),
}

impl DataValue {
    /// Returns `true` if value is null.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Compares and returns the minimum of two values of the same type.
    pub fn min(self, other: Self) -> Self {
        match (self, other) {
            (Self::Null, a) | (a, Self::Null) => a,
            (a, b) => std::cmp::min(a, b),
        }
    }

    /// Compares and returns the maximum of two values of the same type.
    pub fn max(self, other: Self) -> Self {
        match (self, other) {
            (Self::Null, a) | (a, Self::Null) => a,
            (a, b) => std::cmp::max(a, b),
        }
    }
}

impl Display for DataValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Int128(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Interval(v) => write!(f, "{v}"),
        }
    }
}

/// Conversion between a native type and [`DataValue`].
pub trait ScalarConvert: Sized {
    fn into_data_value(self) -> DataValue;

    /// Returns `None` if `value` holds a different type or is null.
    fn from_data_value(value: &DataValue) -> Option<Self>;
}

macro_rules! impl_scalar_convert {
    ([], $( { $Abc:ident, $Type:ty, $abc:ident } ),*) => {
        $(
            impl From<$Type> for DataValue {
                fn from(v: $Type) -> Self {
                    v.into_data_value()
                }
            }

            impl From<Option<$Type>> for DataValue {
                fn from(v: Option<$Type>) -> Self {
                    match v {
                        Some(v) => v.into_data_value(),
                        None => Self::Null,
                    }
                }
            }
        )*
    };
}

macro_rules! impl_exact_convert {
    ($($Abc:ident: $Type:ty),*) => {
        $(
            impl ScalarConvert for $Type {
                fn into_data_value(self) -> DataValue {
                    DataValue::$Abc(self)
                }

                fn from_data_value(value: &DataValue) -> Option<Self> {
                    match value {
                        DataValue::$Abc(v) => Some(*v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_exact_convert!(
    Bool: bool,
    Int8: i8,
    Int16: i16,
    Int32: i32,
    Int64: i64,
    Int128: i128,
    Interval: Interval
);

impl ScalarConvert for f32 {
    fn into_data_value(self) -> DataValue {
        DataValue::Float32(OrderedFloat(self))
    }

    fn from_data_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::Float32(v) => Some(v.0),
            _ => None,
        }
    }
}

impl ScalarConvert for f64 {
    fn into_data_value(self) -> DataValue {
        DataValue::Float64(OrderedFloat(self))
    }

    fn from_data_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::Float64(v) => Some(v.0),
            _ => None,
        }
    }
}

crate::for_all_variants! { impl_scalar_convert }
