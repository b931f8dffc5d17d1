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

//! Exact integer sampling for the discrete mechanisms.
//!
//! The samplers below follow the rejection algorithms of Canonne, Kapralov
//! and Steinke, "The Discrete Gaussian for Differential Privacy" (NeurIPS
//! 2020, <https://arxiv.org/abs/2004.00010>). All arithmetic is on
//! arbitrary-precision rationals: no floating-point operation appears
//! between the random bits and the returned integer, so the sampled
//! distribution matches the distribution in the privacy proof exactly.
//!
//! Every loop terminates with probability 1; expected iteration counts are
//! documented per sampler.

use num_bigint::{BigInt, BigUint};
use num_rational::{BigRational, Ratio};
use num_traits::{One, Signed, ToPrimitive, Zero};
use rand::RngCore;

use super::Rand;
use crate::error::{Error, Fallible};
use crate::traits::Integer;

/// A non-negative rational sampling parameter.
pub type URational = Ratio<BigUint>;

/// Converts a finite positive float to the rational it represents, exactly.
pub fn rational_from_float(value: f64) -> Fallible<URational> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidParameter(format!(
            "expected a finite positive value, got {value}"
        )));
    }
    let ratio = BigRational::from_float(value)
        .ok_or_else(|| Error::InvalidParameter(format!("{value} has no rational form")))?;
    Ok(Ratio::new(
        ratio.numer().magnitude().clone(),
        ratio.denom().magnitude().clone(),
    ))
}

/// A uniform draw from `{0, 1, ..., bound - 1}`.
///
/// Rejection from `bits(bound)` random bits; fewer than 2 draws are consumed
/// in expectation.
pub fn sample_uniform_below(bound: &BigUint, rand: &mut Rand) -> Fallible<BigUint> {
    if bound.is_zero() {
        return Err(Error::InvalidParameter("uniform bound is zero".into()));
    }
    if bound.is_one() {
        return Ok(BigUint::zero());
    }
    let bits = bound.bits();
    let n_bytes = ((bits + 7) / 8) as usize;
    let top_mask: u8 = match bits % 8 {
        0 => 0xff,
        partial => (1u8 << partial) - 1,
    };
    let mut buf = vec![0u8; n_bytes];
    loop {
        rand.fill_bytes(&mut buf);
        buf[0] &= top_mask;
        let candidate = BigUint::from_bytes_be(&buf);
        if &candidate < bound {
            return Ok(candidate);
        }
    }
}

/// A draw from Bernoulli(prob) for a rational `prob <= 1`.
fn sample_bernoulli_ratio(prob: &URational, rand: &mut Rand) -> Fallible<bool> {
    let draw = sample_uniform_below(prob.denom(), rand)?;
    Ok(&draw < prob.numer())
}

/// A draw from Bernoulli(exp(-gamma)) for `gamma <= 1`.
///
/// Runs the alternating-series acceptance loop; the loop index exceeds `k`
/// with probability `gamma^k / k!`, so a `u64` counter cannot overflow.
fn sample_bernoulli_exp1(gamma: &URational, rand: &mut Rand) -> Fallible<bool> {
    debug_assert!(gamma <= &URational::one());
    let mut k = 1u64;
    loop {
        let frac = Ratio::new(gamma.numer().clone(), gamma.denom() * BigUint::from(k));
        if sample_bernoulli_ratio(&frac, rand)? {
            k += 1;
        } else {
            return Ok(k % 2 == 1);
        }
    }
}

/// A draw from Bernoulli(exp(-gamma)) for any non-negative rational `gamma`.
fn sample_bernoulli_exp(gamma: &URational, rand: &mut Rand) -> Fallible<bool> {
    let one = URational::one();
    let mut remaining = gamma.clone();
    while remaining > one {
        if !sample_bernoulli_exp1(&one, rand)? {
            return Ok(false);
        }
        remaining = &remaining - &one;
    }
    sample_bernoulli_exp1(&remaining, rand)
}

/// A draw from the discrete Laplace distribution with the given rational
/// scale: `P(X = x)` proportional to `exp(-|x| / scale)` over the integers.
///
/// Unbiased and exact for every magnitude. Each attempt is accepted with
/// probability above `(1 - exp(-1/scale)) / 2`; for `scale >= 1` the expected
/// number of attempts is below 4.
pub fn sample_discrete_laplace(scale: &URational, rand: &mut Rand) -> Fallible<BigInt> {
    if scale.numer().is_zero() {
        return Err(Error::InvalidParameter("discrete laplace scale is zero".into()));
    }
    let t = scale.numer();
    let s = scale.denom();
    let one = URational::one();
    loop {
        let u = sample_uniform_below(t, rand)?;
        if !sample_bernoulli_exp(&Ratio::new(u.clone(), t.clone()), rand)? {
            continue;
        }
        let mut v = BigUint::zero();
        while sample_bernoulli_exp1(&one, rand)? {
            v += 1u32;
        }
        let magnitude = (u + t * v) / s;
        let negative = rand.boolean();
        if negative && magnitude.is_zero() {
            // Zero may only be kept with a positive sign, otherwise its
            // probability would be double that of every other magnitude.
            continue;
        }
        let magnitude = BigInt::from(magnitude);
        return Ok(if negative { -magnitude } else { magnitude });
    }
}

/// A draw from the discrete Gaussian distribution with the given rational
/// sigma: `P(X = x)` proportional to `exp(-x^2 / (2 sigma^2))` over the
/// integers.
///
/// Rejection from a discrete Laplace proposal at scale `floor(sigma) + 1`;
/// the expected number of proposals is bounded by a constant (about 1.4 for
/// large sigma, below 10 for any positive sigma).
pub fn sample_discrete_gaussian(sigma: &URational, rand: &mut Rand) -> Fallible<BigInt> {
    if sigma.numer().is_zero() {
        return Err(Error::InvalidParameter("discrete gaussian sigma is zero".into()));
    }
    let sigma_sq = sigma * sigma;
    let t = sigma.to_integer() + BigUint::one();
    let proposal_scale = URational::from_integer(t.clone());
    loop {
        let candidate = sample_discrete_laplace(&proposal_scale, rand)?;
        // Accept with probability exp(-(|x| - sigma^2/t)^2 / (2 sigma^2)).
        let inner = BigInt::from(candidate.magnitude() * sigma_sq.denom() * &t)
            - BigInt::from(sigma_sq.numer().clone());
        let inner_sq = inner.magnitude() * inner.magnitude();
        let denom =
            BigUint::from(2u32) * sigma_sq.numer() * sigma_sq.denom() * &t * &t;
        if sample_bernoulli_exp(&Ratio::new(inner_sq, denom), rand)? {
            return Ok(candidate);
        }
    }
}

fn bigint_of<T: Integer>(value: T) -> BigInt {
    if let Some(signed) = value.to_i128() {
        BigInt::from(signed)
    } else {
        // Only u128 values beyond i128::MAX take this branch.
        BigInt::from(value.to_u128().unwrap_or(u128::MAX))
    }
}

fn from_bigint<T: Integer>(value: &BigInt) -> Option<T> {
    if value.is_negative() {
        T::from_i128(value.to_i128()?)
    } else {
        T::from_u128(value.to_u128()?)
    }
}

/// Adds integer noise onto `value`, clamping the sum into the range of `T`.
///
/// Saturation is post-processing on the released value and cannot increase
/// the privacy loss.
pub fn saturating_add_noise<T: Integer>(value: T, noise: &BigInt) -> T {
    let total = bigint_of(value) + noise;
    if total > bigint_of(T::max_value()) {
        return T::max_value();
    }
    if total < bigint_of(T::min_value()) {
        return T::min_value();
    }
    from_bigint(&total).unwrap_or_else(T::max_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_from_float_is_exact() {
        assert_eq!(rational_from_float(2.0).unwrap(), Ratio::from_integer(BigUint::from(2u32)));
        assert_eq!(
            rational_from_float(10.5).unwrap(),
            Ratio::new(BigUint::from(21u32), BigUint::from(2u32))
        );
        assert!(rational_from_float(0.0).is_err());
        assert!(rational_from_float(-1.0).is_err());
        assert!(rational_from_float(f64::INFINITY).is_err());
    }

    #[test]
    fn uniform_below_is_in_range() {
        let mut rand = Rand::new_for_test(42);
        let bound = BigUint::from(10u32);
        for _ in 0..1000 {
            assert!(sample_uniform_below(&bound, &mut rand).unwrap() < bound);
        }
        assert!(sample_uniform_below(&BigUint::zero(), &mut rand).is_err());
        assert!(sample_uniform_below(&BigUint::one(), &mut rand).unwrap().is_zero());
    }

    #[test]
    fn bernoulli_exp_frequency() {
        // P(true) = exp(-1) ~ 0.3679.
        let mut rand = Rand::new_for_test(7);
        let gamma = URational::one();
        let trials = 20_000;
        let hits =
            (0..trials).filter(|_| sample_bernoulli_exp(&gamma, &mut rand).unwrap()).count();
        let freq = hits as f64 / trials as f64;
        assert!((freq - (-1.0f64).exp()).abs() < 0.02, "frequency was {freq}");
    }

    #[test]
    fn discrete_laplace_is_symmetric_and_centered() {
        let mut rand = Rand::new_for_test(13);
        let scale = rational_from_float(2.0).unwrap();
        let n = 10_000;
        let samples: Vec<i64> = (0..n)
            .map(|_| sample_discrete_laplace(&scale, &mut rand).unwrap().to_i64().unwrap())
            .collect();
        let mean = samples.iter().sum::<i64>() as f64 / n as f64;
        assert!(mean.abs() < 0.15, "mean was {mean}");
        // Variance of the discrete Laplace at scale 2 is about 7.5.
        let var = samples.iter().map(|&x| (x as f64).powi(2)).sum::<f64>() / n as f64;
        assert!((var - 7.5).abs() < 1.0, "variance was {var}");
    }

    #[test]
    fn discrete_gaussian_matches_target_variance() {
        let mut rand = Rand::new_for_test(17);
        let sigma = rational_from_float(2.0).unwrap();
        let n = 10_000;
        let samples: Vec<i64> = (0..n)
            .map(|_| sample_discrete_gaussian(&sigma, &mut rand).unwrap().to_i64().unwrap())
            .collect();
        let mean = samples.iter().sum::<i64>() as f64 / n as f64;
        assert!(mean.abs() < 0.1, "mean was {mean}");
        // Variance of the discrete Gaussian is close to sigma^2 = 4.
        let var = samples.iter().map(|&x| (x as f64).powi(2)).sum::<f64>() / n as f64;
        assert!((var - 4.0).abs() < 0.5, "variance was {var}");
    }

    #[test]
    fn saturating_release_clamps_at_type_bounds() {
        assert_eq!(saturating_add_noise(1i32, &BigInt::from(2)), 3);
        assert_eq!(saturating_add_noise(i32::MAX, &BigInt::from(1)), i32::MAX);
        assert_eq!(saturating_add_noise(i32::MIN, &BigInt::from(-1)), i32::MIN);
        assert_eq!(saturating_add_noise(0u8, &BigInt::from(-5)), 0);
    }
}
