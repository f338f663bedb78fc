//! Value + rank pair layouts used by indexed (min-loc / max-loc) reductions.
//!
//! Each pair is `repr(C)` with explicit padding so it is `Pod` and has the
//! same layout as the corresponding MPI pair type on LP64 targets.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;
use std::mem::size_of;

use super::ScalarKind;

/// A composite element made of one scalar value and an `i32` rank index.
pub trait ValueRankPair: Pod + Send + Sync {
    /// Scalar kind of the value half.
    const VALUE_KIND: ScalarKind;
    /// Width in bytes of the value half.
    const VALUE_WIDTH: usize;

    fn rank(&self) -> i32;
}

macro_rules! value_rank_pair {
    (
        $(#[$m:meta])*
        $name:ident, $val:ty, $kind:expr, { $($pad:ident : $pt:ty),* }
    ) => {
        $(#[$m])*
        #[repr(C)]
        #[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
        pub struct $name {
            pub value: $val,
            $( #[serde(skip)] $pad: $pt, )*
            pub rank: i32,
        }

        impl $name {
            pub fn new(value: $val, rank: i32) -> Self {
                Self { value, rank, ..Default::default() }
            }
        }

        impl ValueRankPair for $name {
            const VALUE_KIND: ScalarKind = $kind;
            const VALUE_WIDTH: usize = size_of::<$val>();

            #[inline]
            fn rank(&self) -> i32 {
                self.rank
            }
        }
    };
}

value_rank_pair!(
    /// `f32` value with its owning rank (`MPI_FLOAT_INT`).
    FloatInt, f32, ScalarKind::Float, {}
);
value_rank_pair!(
    /// `i32` value with its owning rank (`MPI_2INT`).
    TwoInt, i32, ScalarKind::Signed, {}
);
value_rank_pair!(
    /// `i16` value with its owning rank (`MPI_SHORT_INT`).
    ShortInt, i16, ScalarKind::Signed, { _pad: u16 }
);

/// `f64` value with its owning rank (`MPI_DOUBLE_INT`).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct DoubleInt {
    pub value: f64,
    pub rank: i32,
    #[serde(skip)]
    _pad: u32,
}

/// `i64` value with its owning rank (`MPI_LONG_INT`).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct LongInt {
    pub value: i64,
    pub rank: i32,
    #[serde(skip)]
    _pad: u32,
}

impl DoubleInt {
    pub fn new(value: f64, rank: i32) -> Self {
        Self { value, rank, _pad: 0 }
    }
}

impl LongInt {
    pub fn new(value: i64, rank: i32) -> Self {
        Self { value, rank, _pad: 0 }
    }
}

impl ValueRankPair for DoubleInt {
    const VALUE_KIND: ScalarKind = ScalarKind::Float;
    const VALUE_WIDTH: usize = 8;

    #[inline]
    fn rank(&self) -> i32 {
        self.rank
    }
}

impl ValueRankPair for LongInt {
    const VALUE_KIND: ScalarKind = ScalarKind::Signed;
    const VALUE_WIDTH: usize = 8;

    #[inline]
    fn rank(&self) -> i32 {
        self.rank
    }
}

const_assert_eq!(size_of::<FloatInt>(), 8);
const_assert_eq!(size_of::<TwoInt>(), 8);
const_assert_eq!(size_of::<ShortInt>(), 8);
const_assert_eq!(size_of::<DoubleInt>(), 16);
const_assert_eq!(size_of::<LongInt>(), 16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_is_zeroed_by_constructors() {
        let p = ShortInt::new(-3, 2);
        let bytes = bytemuck::bytes_of(&p);
        assert_eq!(&bytes[2..4], &[0, 0]);
        assert_eq!(p.rank(), 2);

        let d = DoubleInt::new(1.5, 7);
        assert_eq!(&bytemuck::bytes_of(&d)[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn pairs_serialize_without_padding() {
        let json = serde_json::to_string(&LongInt::new(9, 1)).unwrap();
        assert_eq!(json, r#"{"value":9,"rank":1}"#);
    }
}
