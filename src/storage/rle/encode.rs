// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use bytes::{Buf, BufMut};

use crate::array::{ArrayImpl, PrimitiveArray};
use crate::types::{Interval, NativeType, PhysicalType, ScalarConvert};

/// Encode a primitive value into fixed-width buffer
pub trait PrimitiveFixedWidthEncode: NativeType {
    /// Width of each element
    const WIDTH: usize;
    const DEFAULT_VALUE: &'static Self;

    /// Encode current primitive data to the front of `buffer`.
    fn encode(&self, buffer: &mut impl BufMut);

    /// Decode a data from a bytes array.
    fn decode(buffer: &mut impl Buf) -> Self;
}

impl PrimitiveFixedWidthEncode for bool {
    const WIDTH: usize = std::mem::size_of::<u8>();
    const DEFAULT_VALUE: &'static bool = &false;

    fn encode(&self, buffer: &mut impl BufMut) {
        buffer.put_u8(*self as u8)
    }

    fn decode(buffer: &mut impl Buf) -> Self {
        buffer.get_u8() != 0
    }
}

macro_rules! impl_fixed_width_le {
    ($($t:ty: $put:ident, $get:ident, $default:expr);* $(;)?) => {
        $(
            impl PrimitiveFixedWidthEncode for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();
                const DEFAULT_VALUE: &'static $t = &$default;

                fn encode(&self, buffer: &mut impl BufMut) {
                    buffer.$put(*self);
                }

                fn decode(buffer: &mut impl Buf) -> Self {
                    buffer.$get()
                }
            }
        )*
    };
}

impl_fixed_width_le! {
    i8: put_i8, get_i8, 0;
    i16: put_i16_le, get_i16_le, 0;
    i32: put_i32_le, get_i32_le, 0;
    i64: put_i64_le, get_i64_le, 0;
    i128: put_i128_le, get_i128_le, 0;
    f32: put_f32_le, get_f32_le, 0.0;
    f64: put_f64_le, get_f64_le, 0.0;
}

impl PrimitiveFixedWidthEncode for Interval {
    const WIDTH: usize =
        std::mem::size_of::<i32>() + std::mem::size_of::<i32>() + std::mem::size_of::<i64>();
    const DEFAULT_VALUE: &'static Self = &Interval::from_days(0);

    fn encode(&self, buffer: &mut impl BufMut) {
        buffer.put_i32_le(self.num_months());
        buffer.put_i32_le(self.days());
        buffer.put_i64_le(self.micros());
    }

    fn decode(buffer: &mut impl Buf) -> Self {
        let months = buffer.get_i32_le();
        let days = buffer.get_i32_le();
        let micros = buffer.get_i64_le();
        Interval::new(months, days, micros)
    }
}

/// Binds a native type to its physical type and to its variant of [`ArrayImpl`].
pub trait RleValue: PrimitiveFixedWidthEncode + ScalarConvert {
    const PHYSICAL_TYPE: PhysicalType;

    /// Whether comparison filters can be evaluated against values of this type.
    const FILTERABLE: bool = Self::PHYSICAL_TYPE.is_filterable();

    fn as_array(array: &ArrayImpl) -> Option<&PrimitiveArray<Self>>;

    fn into_array_impl(array: PrimitiveArray<Self>) -> ArrayImpl;
}

macro_rules! impl_rle_value {
    ([], $( { $Abc:ident, $Type:ty, $abc:ident } ),*) => {
        $(
            impl RleValue for $Type {
                const PHYSICAL_TYPE: PhysicalType = PhysicalType::$Abc;

                fn as_array(array: &ArrayImpl) -> Option<&PrimitiveArray<Self>> {
                    match array {
                        ArrayImpl::$Abc(a) => Some(a),
                        _ => None,
                    }
                }

                fn into_array_impl(array: PrimitiveArray<Self>) -> ArrayImpl {
                    ArrayImpl::$Abc(array)
                }
            }
        )*
    };
}

crate::for_all_variants! { impl_rle_value }

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_to_vec<T: PrimitiveFixedWidthEncode>(value: T) -> Vec<u8> {
        let mut buf = vec![];
        value.encode(&mut buf);
        assert_eq!(buf.len(), T::WIDTH);
        buf
    }

    #[test]
    fn test_little_endian() {
        assert_eq!(encode_to_vec(0x0102i16), vec![0x02, 0x01]);
        assert_eq!(encode_to_vec(1i32), vec![1, 0, 0, 0]);
        assert_eq!(encode_to_vec(true), vec![1]);
    }

    #[test]
    fn test_interval_width() {
        let interval = Interval::new(1, -2, 3_000_000);
        let buf = encode_to_vec(interval);
        assert_eq!(buf.len(), 16);
        assert_eq!(Interval::decode(&mut buf.as_slice()), interval);
    }

    #[test]
    fn test_widths_match_catalog() {
        assert_eq!(PhysicalType::Int128.width(), Some(i128::WIDTH));
        assert_eq!(PhysicalType::Float32.width(), Some(f32::WIDTH));
        assert_eq!(PhysicalType::Interval.width(), Some(Interval::WIDTH));
        assert!(!bool::FILTERABLE);
        assert!(i64::FILTERABLE);
    }
}
