// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use std::fmt::Debug;

use super::interval::Interval;

/// Native element types that can be held by a `PrimitiveArray`.
pub trait NativeType:
    PartialOrd + PartialEq + Debug + Copy + Send + Sync + Sized + Default + 'static
{
}

macro_rules! impl_native {
    ($($t:ty),*) => {
        $(impl NativeType for $t {})*
    }
}

impl_native!(bool, i8, i16, i32, i64, i128, f32, f64, Interval);
