//
// Copyright 2024 The Project Oak Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! The closed set of numeric representations supported by the kernel, and the
//! conservatively rounded arithmetic privacy maps are written in.
//!
//! Maps must never report a privacy loss smaller than the true value, so every
//! inexact operation rounds away from the caller's favor. Exactness of the
//! field operations is decided by residual tests (two-sum for addition, fused
//! multiply-add for multiplication, division and square root), which keeps
//! exact results byte-identical to a plain evaluation of the same formula.

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{Error, Fallible};

/// A member of the closed set of numeric types usable as data, distances or
/// privacy-loss values.
///
/// Membership in this set is decided at compile time, so a composition over an
/// unsupported representation is rejected before any measurement exists.
pub trait Number:
    'static
    + Copy
    + Clone
    + Send
    + Sync
    + Debug
    + PartialEq
    + PartialOrd
    + num_traits::Zero
    + num_traits::One
    + num_traits::ToPrimitive
{
}

macro_rules! impl_number {
    ($($ty:ty),+) => {$(impl Number for $ty {})+}
}
impl_number!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

/// Signed or unsigned integers of known width.
pub trait Integer:
    Number + Eq + Ord + Hash + num_traits::PrimInt + num_traits::Saturating + num_traits::FromPrimitive
{
}

macro_rules! impl_integer {
    ($($ty:ty),+) => {$(impl Integer for $ty {})+}
}
impl_integer!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

/// IEEE 754 floating-point numbers of known width, extended with directed
/// ("inf"/"neg_inf") arithmetic.
///
/// The `inf_*` operations never return a value below the exact result; the
/// `neg_inf_*` operations never return a value above it. `ln` and `exp` are
/// exposed at round-to-nearest, which is within one ulp of the directed bound;
/// see the crate documentation for the rounding policy.
pub trait Float: Number + num_traits::Float + num_traits::FromPrimitive + num_traits::FloatConst {
    /// The smallest float strictly greater than `self`.
    fn next_up_(self) -> Self;
    /// The largest float strictly less than `self`.
    fn next_down_(self) -> Self;

    fn inf_add(self, v: Self) -> Fallible<Self>;
    fn neg_inf_add(self, v: Self) -> Fallible<Self>;
    fn inf_sub(self, v: Self) -> Fallible<Self> {
        self.inf_add(-v)
    }
    fn neg_inf_sub(self, v: Self) -> Fallible<Self> {
        self.neg_inf_add(-v)
    }
    fn inf_mul(self, v: Self) -> Fallible<Self>;
    fn neg_inf_mul(self, v: Self) -> Fallible<Self>;
    fn inf_div(self, v: Self) -> Fallible<Self>;
    fn neg_inf_div(self, v: Self) -> Fallible<Self>;
    fn inf_sqrt(self) -> Fallible<Self>;
    fn neg_inf_sqrt(self) -> Fallible<Self>;

    /// Natural logarithm at round-to-nearest.
    fn inf_ln(self) -> Fallible<Self>;
    /// Exponential at round-to-nearest.
    fn inf_exp(self) -> Fallible<Self>;
}

macro_rules! impl_float {
    ($ty:ty, $bits:ty) => {
        impl Float for $ty {
            fn next_up_(self) -> Self {
                if self.is_nan() || self == <$ty>::INFINITY {
                    return self;
                }
                if self == 0.0 {
                    // Covers -0.0: the successor of both zeros is the
                    // smallest positive subnormal.
                    return <$ty>::from_bits(1);
                }
                let bits = self.to_bits();
                if self > 0.0 {
                    <$ty>::from_bits(bits + 1)
                } else {
                    <$ty>::from_bits(bits - 1)
                }
            }

            fn next_down_(self) -> Self {
                if self.is_nan() || self == <$ty>::NEG_INFINITY {
                    return self;
                }
                if self == 0.0 {
                    return -<$ty>::from_bits(1);
                }
                let bits = self.to_bits();
                if self > 0.0 {
                    <$ty>::from_bits(bits - 1)
                } else {
                    <$ty>::from_bits(bits + 1)
                }
            }

            fn inf_add(self, v: Self) -> Fallible<Self> {
                let s = self + v;
                if s.is_nan() {
                    return Err(Error::InvalidDistance("sum is not a number".into()));
                }
                if !s.is_finite() {
                    return Ok(s);
                }
                // Knuth two-sum: the rounding error of s = a + b, exactly.
                let bb = s - self;
                let err = (self - (s - bb)) + (v - bb);
                Ok(if err > 0.0 { s.next_up_() } else { s })
            }

            fn neg_inf_add(self, v: Self) -> Fallible<Self> {
                let s = self + v;
                if s.is_nan() {
                    return Err(Error::InvalidDistance("sum is not a number".into()));
                }
                if !s.is_finite() {
                    return Ok(s);
                }
                let bb = s - self;
                let err = (self - (s - bb)) + (v - bb);
                Ok(if err < 0.0 { s.next_down_() } else { s })
            }

            fn inf_mul(self, v: Self) -> Fallible<Self> {
                let p = self * v;
                if p.is_nan() {
                    return Err(Error::InvalidDistance("product is not a number".into()));
                }
                if !p.is_finite() {
                    return Ok(p);
                }
                // Fused multiply-add recovers the sign of the rounding error.
                let residual = self.mul_add(v, -p);
                Ok(if residual > 0.0 { p.next_up_() } else { p })
            }

            fn neg_inf_mul(self, v: Self) -> Fallible<Self> {
                let p = self * v;
                if p.is_nan() {
                    return Err(Error::InvalidDistance("product is not a number".into()));
                }
                if !p.is_finite() {
                    return Ok(p);
                }
                let residual = self.mul_add(v, -p);
                Ok(if residual < 0.0 { p.next_down_() } else { p })
            }

            fn inf_div(self, v: Self) -> Fallible<Self> {
                let q = self / v;
                if q.is_nan() {
                    return Err(Error::InvalidDistance("quotient is not a number".into()));
                }
                if !q.is_finite() {
                    return Ok(q);
                }
                // residual = q*v - self, with the sign of (q - self/v) * v.
                let residual = q.mul_add(v, -self);
                let too_small = if v > 0.0 { residual < 0.0 } else { residual > 0.0 };
                Ok(if too_small { q.next_up_() } else { q })
            }

            fn neg_inf_div(self, v: Self) -> Fallible<Self> {
                let q = self / v;
                if q.is_nan() {
                    return Err(Error::InvalidDistance("quotient is not a number".into()));
                }
                if !q.is_finite() {
                    return Ok(q);
                }
                let residual = q.mul_add(v, -self);
                let too_large = if v > 0.0 { residual > 0.0 } else { residual < 0.0 };
                Ok(if too_large { q.next_down_() } else { q })
            }

            fn inf_sqrt(self) -> Fallible<Self> {
                if self < 0.0 {
                    return Err(Error::InvalidDistance("sqrt of a negative value".into()));
                }
                let s = self.sqrt();
                if !s.is_finite() {
                    return Ok(s);
                }
                let residual = s.mul_add(s, -self);
                Ok(if residual < 0.0 { s.next_up_() } else { s })
            }

            fn neg_inf_sqrt(self) -> Fallible<Self> {
                if self < 0.0 {
                    return Err(Error::InvalidDistance("sqrt of a negative value".into()));
                }
                let s = self.sqrt();
                if !s.is_finite() {
                    return Ok(s);
                }
                let residual = s.mul_add(s, -self);
                Ok(if residual > 0.0 { s.next_down_() } else { s })
            }

            fn inf_ln(self) -> Fallible<Self> {
                if self <= 0.0 {
                    return Err(Error::InvalidDistance("ln of a non-positive value".into()));
                }
                Ok(self.ln())
            }

            fn inf_exp(self) -> Fallible<Self> {
                if self.is_nan() {
                    return Err(Error::InvalidDistance("exp of not a number".into()));
                }
                Ok(self.exp())
            }
        }
    };
}
impl_float!(f32, u32);
impl_float!(f64, u64);

/// Conversion between members of the numeric set that never rounds toward the
/// caller's favor: `inf_cast` never returns a value below the argument,
/// `neg_inf_cast` never one above it.
pub trait InfCast<TI>: Sized {
    fn inf_cast(v: TI) -> Fallible<Self>;
    fn neg_inf_cast(v: TI) -> Fallible<Self>;
}

macro_rules! impl_infcast_int_to_float {
    ($int:ty; $($float:ty),+) => {$(
        impl InfCast<$int> for $float {
            fn inf_cast(v: $int) -> Fallible<Self> {
                let r = v as $float;
                // Casting back is exact: either |v| fits in the mantissa, or
                // r is integer-valued and truncation loses nothing.
                Ok(if (r as $int) < v { r.next_up_() } else { r })
            }
            fn neg_inf_cast(v: $int) -> Fallible<Self> {
                let r = v as $float;
                Ok(if (r as $int) > v { r.next_down_() } else { r })
            }
        }
    )+};
}
impl_infcast_int_to_float!(u8; f32, f64);
impl_infcast_int_to_float!(u16; f32, f64);
impl_infcast_int_to_float!(u32; f32, f64);
impl_infcast_int_to_float!(u64; f32, f64);
impl_infcast_int_to_float!(u128; f32, f64);
impl_infcast_int_to_float!(usize; f32, f64);
impl_infcast_int_to_float!(i8; f32, f64);
impl_infcast_int_to_float!(i16; f32, f64);
impl_infcast_int_to_float!(i32; f32, f64);
impl_infcast_int_to_float!(i64; f32, f64);
impl_infcast_int_to_float!(i128; f32, f64);
impl_infcast_int_to_float!(isize; f32, f64);

macro_rules! impl_infcast_int_to_int {
    ($int:ty; $($to:ty),+) => {$(
        impl InfCast<$int> for $to {
            fn inf_cast(v: $int) -> Fallible<Self> {
                <$to>::try_from(v).map_err(|_| {
                    Error::InvalidDistance("distance does not fit in the target type".into())
                })
            }
            fn neg_inf_cast(v: $int) -> Fallible<Self> {
                Self::inf_cast(v)
            }
        }
    )+};
}
impl_infcast_int_to_int!(u32; u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl InfCast<f32> for f64 {
    fn inf_cast(v: f32) -> Fallible<Self> {
        // Every f32 is exactly representable as an f64.
        Ok(v as f64)
    }
    fn neg_inf_cast(v: f32) -> Fallible<Self> {
        Ok(v as f64)
    }
}

impl InfCast<f64> for f32 {
    fn inf_cast(v: f64) -> Fallible<Self> {
        let r = v as f32;
        Ok(if (r as f64) < v { r.next_up_() } else { r })
    }
    fn neg_inf_cast(v: f64) -> Fallible<Self> {
        let r = v as f32;
        Ok(if (r as f64) > v { r.next_down_() } else { r })
    }
}

impl InfCast<f64> for f64 {
    fn inf_cast(v: f64) -> Fallible<Self> {
        Ok(v)
    }
    fn neg_inf_cast(v: f64) -> Fallible<Self> {
        Ok(v)
    }
}

impl InfCast<f32> for f32 {
    fn inf_cast(v: f32) -> Fallible<Self> {
        Ok(v)
    }
    fn neg_inf_cast(v: f32) -> Fallible<Self> {
        Ok(v)
    }
}

/// Component-wise comparison of privacy-loss distances.
///
/// Scalars compare directly; an `(epsilon, delta)` pair compares in both
/// components. A comparison involving NaN is an error, never a silent `false`.
pub trait ProductOrd: Sized {
    fn product_ge(&self, other: &Self) -> Fallible<bool>;
    fn product_le(&self, other: &Self) -> Fallible<bool> {
        other.product_ge(self)
    }
}

impl<T: Number> ProductOrd for T {
    fn product_ge(&self, other: &Self) -> Fallible<bool> {
        self.partial_cmp(other)
            .map(|ord| ord != std::cmp::Ordering::Less)
            .ok_or_else(|| Error::InvalidDistance("distances are not comparable".into()))
    }
}

impl<A: ProductOrd, B: ProductOrd> ProductOrd for (A, B) {
    fn product_ge(&self, other: &Self) -> Fallible<bool> {
        Ok(self.0.product_ge(&other.0)? && self.1.product_ge(&other.1)?)
    }
}

/// Values usable as atomic domain members.
///
/// `check_member` rejects values outside the domain's value set; float NaN is
/// the only rejected atom among the built-in types.
pub trait CheckAtom: 'static + Clone + PartialEq + Debug + Send + Sync {
    fn check_member(&self) -> bool {
        true
    }
}

macro_rules! impl_check_atom {
    ($($ty:ty),+) => {$(impl CheckAtom for $ty {})+}
}
impl_check_atom!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);
impl_check_atom!(bool, char, String);

impl CheckAtom for f32 {
    fn check_member(&self) -> bool {
        !self.is_nan()
    }
}

impl CheckAtom for f64 {
    fn check_member(&self) -> bool {
        !self.is_nan()
    }
}

/// Atom types usable as hash-map keys in histogram releases.
pub trait Hashable: CheckAtom + Eq + Hash {}
impl<T: CheckAtom + Eq + Hash> Hashable for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_up_and_down_are_adjacent() {
        let x = 1.0f64;
        assert!(x.next_up_() > x);
        assert!(x.next_down_() < x);
        assert_eq!(x.next_up_().next_down_(), x);
        assert_eq!(0.0f64.next_up_(), f64::from_bits(1));
        assert!((-0.0f64).next_up_() > 0.0);
    }

    #[test]
    fn exact_arithmetic_is_unchanged() {
        // Dyadic operands: every operation below is exact, so directed
        // rounding must return the plain result.
        assert_eq!(1.0f64.inf_div(2.0).unwrap(), 0.5);
        assert_eq!(1.0f64.neg_inf_div(2.0).unwrap(), 0.5);
        assert_eq!(0.25f64.inf_mul(0.5).unwrap(), 0.125);
        assert_eq!(1.5f64.inf_add(0.25).unwrap(), 1.75);
        assert_eq!(0.25f64.inf_sqrt().unwrap(), 0.5);
    }

    #[test]
    fn inexact_arithmetic_rounds_outward() {
        let up = 1.0f64.inf_div(3.0).unwrap();
        let down = 1.0f64.neg_inf_div(3.0).unwrap();
        assert!(up > down);
        assert_eq!(down.next_up_(), up);
        // One third is irrational in binary: the true value is bracketed.
        assert!(up * 3.0 >= 1.0);
        assert!(down * 3.0 <= 1.0);
    }

    #[test]
    fn addition_residual_detection() {
        // 0.1 + 0.2 is inexact; the directed results must bracket.
        let up = 0.1f64.inf_add(0.2).unwrap();
        let down = 0.1f64.neg_inf_add(0.2).unwrap();
        assert!(up >= down);
        assert!(up - down <= f64::EPSILON);
    }

    #[test]
    fn int_to_float_casts() {
        assert_eq!(f64::inf_cast(1u32).unwrap(), 1.0);
        assert_eq!(f64::inf_cast(1i32).unwrap(), 1.0);
        // 2^53 + 1 is not representable in f64.
        let v = (1u64 << 53) + 1;
        assert!(f64::inf_cast(v).unwrap() >= v as f64);
        assert!(f64::neg_inf_cast(v).unwrap() <= f64::inf_cast(v).unwrap());
    }

    #[test]
    fn product_order_on_pairs() {
        assert!((1.0, 1e-5).product_ge(&(0.5, 1e-6)).unwrap());
        assert!(!(1.0, 1e-7).product_ge(&(0.5, 1e-6)).unwrap());
        assert!((0.5f64).product_le(&0.5).unwrap());
    }

    #[test]
    fn nan_is_never_comparable() {
        assert!(f64::NAN.product_ge(&1.0).is_err());
        assert!(!f64::NAN.check_member());
        assert!(1.0f64.check_member());
    }
}
