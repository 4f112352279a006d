// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

mod interval;
mod native;
mod value;

pub use self::interval::*;
pub use self::native::*;
pub use self::value::*;

/// Physical storage type of a column.
///
/// Every fixed-width type maps to a native Rust type through [`for_all_variants`]. Variable-length
/// types are part of the catalog so that they can be routed here by mistake and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Float32,
    Float64,
    Interval,
    Varchar,
    Blob,
}

impl PhysicalType {
    /// Width in bytes of one value, or `None` for variable-length types.
    pub const fn width(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::Int8 => Some(1),
            Self::Int16 => Some(2),
            Self::Int32 | Self::Float32 => Some(4),
            Self::Int64 | Self::Float64 => Some(8),
            Self::Int128 | Self::Interval => Some(16),
            Self::Varchar | Self::Blob => None,
        }
    }

    /// Whether comparison filters can be pushed down to segments of this type.
    pub const fn is_filterable(&self) -> bool {
        !matches!(self, Self::Interval | Self::Varchar | Self::Blob | Self::Bool)
    }
}

impl Display for PhysicalType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Bool => "BOOLEAN",
            Self::Int8 => "TINYINT",
            Self::Int16 => "SMALLINT",
            Self::Int32 => "INTEGER",
            Self::Int64 => "BIGINT",
            Self::Int128 => "HUGEINT",
            Self::Float32 => "FLOAT",
            Self::Float64 => "DOUBLE",
            Self::Interval => "INTERVAL",
            Self::Varchar => "VARCHAR",
            Self::Blob => "BLOB",
        };
        write!(f, "{name}")
    }
}

/// Invoke a macro with all fixed-width variants.
///
/// Each entry is `{ Abc, Type, abc }`: the variant name shared by [`PhysicalType`],
/// [`DataValue`] and `ArrayImpl`, the native type, and a snake-case name.
///
/// ```ignore
/// macro_rules! impl_something {
///     ([], $( { $Abc:ident, $Type:ty, $abc:ident } ),*) => { ... };
/// }
/// for_all_variants! { impl_something }
/// ```
#[macro_export]
macro_rules! for_all_variants {
    ($macro:ident $(, $x:tt)*) => {
        $macro! {
            [$($x),*],
            { Bool, bool, bool },
            { Int8, i8, int8 },
            { Int16, i16, int16 },
            { Int32, i32, int32 },
            { Int64, i64, int64 },
            { Int128, i128, int128 },
            { Float32, f32, float32 },
            { Float64, f64, float64 },
            { Interval, $crate::types::Interval, interval }
        }
    };
}
