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

//! Random draws from the distributions the mechanism catalog is built on.
//!
//! Every measurement invocation owns its own [`Rand`] instance, so concurrent
//! invocations never share mutable generator state.

pub mod discrete;

use rand::rngs::StdRng;
use rand::{thread_rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::{Error, Fallible};

/// Wrapper for the actual random number generator.
///
/// `StdRng` is backed by a cryptographically suitable block cipher; the
/// wrapper adds a bit buffer so single-bit draws do not consume a full word
/// of entropy each.
pub struct Rand {
    /// The internal random number generator used for sampling the noise.
    rng: StdRng,
    /// Buffer of random bits for generating random boolean values.
    rand_bit_buf: u32,
    /// Current position inside the bit buffer.
    rand_bit_pos: usize,
}

impl Rand {
    pub fn new() -> Fallible<Self> {
        Ok(Self::new_with_rng(StdRng::from_rng(thread_rng())?))
    }

    #[cfg(test)]
    pub fn new_for_test(seed: u64) -> Self {
        Self::new_with_rng(StdRng::seed_from_u64(seed))
    }

    fn new_with_rng(rng: StdRng) -> Self {
        Self { rng, rand_bit_buf: 0, rand_bit_pos: usize::MAX }
    }

    /// Returns a uniformly random u64.
    pub fn u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Returns true or false with equal probability.
    pub fn boolean(&mut self) -> bool {
        if self.rand_bit_pos > 31 {
            // Out of random bits.
            self.rand_bit_buf = self.rng.next_u32();
            self.rand_bit_pos = 0
        }
        let res = self.rand_bit_buf & (1 << self.rand_bit_pos) > 0;
        self.rand_bit_pos += 1;
        res
    }

    /// Returns an f64 from the interval (0,1] such that each float in the
    /// interval is returned with positive probability and the resulting
    /// distribution simulates a continuous uniform distribution on (0, 1].
    pub fn uniform(&mut self) -> f64 {
        let i = self.u64() % (1u64 << 53);
        let r = (1.0 + (i as f64) / ((1u64 << 53) as f64)) / 2.0_f64.powf(self.geometric());
        // We want to avoid returning 0, since callers may take the log.
        if r == 0.0 {
            return 1.0;
        }
        r
    }

    /// Returns an f64 that counts the number of Bernoulli trials until the
    /// first success for a success probability of 0.5.
    fn geometric(&mut self) -> f64 {
        // 1 plus the number of leading zeros from an infinite stream of random
        // bits follows the desired geometric distribution.
        let mut b = 1;
        let mut r = 0;
        while r == 0 {
            r = self.rng.next_u32();
            b += r.leading_zeros();
        }
        b as f64
    }

    /// Returns true with probability exactly `prob`.
    ///
    /// The draw compares a stream of random bits against the binary expansion
    /// of `prob`, so the outcome distribution is exact for every
    /// representable probability; the expected number of bits consumed is 2.
    pub fn bernoulli(&mut self, prob: f64) -> Fallible<bool> {
        if !(0.0..=1.0).contains(&prob) {
            return Err(Error::InvalidParameter(format!(
                "bernoulli probability is {prob}, must be in [0, 1]"
            )));
        }
        if prob == 1.0 {
            return Ok(true);
        }
        let mut prob = prob;
        loop {
            if prob == 0.0 {
                // The remaining expansion is all zeros: the random stream
                // cannot fall below it.
                return Ok(false);
            }
            // Doubling and the conditional subtraction are exact: prob stays
            // a dyadic rational in [0, 1).
            prob *= 2.0;
            let prob_bit = prob >= 1.0;
            if prob_bit {
                prob -= 1.0;
            }
            let rand_bit = self.boolean();
            if rand_bit != prob_bit {
                return Ok(prob_bit);
            }
        }
    }

    /// Counts failures before the first success over exactly `trials`
    /// Bernoulli draws with success probability `prob`.
    ///
    /// All `trials` draws are always consumed, so the running time depends
    /// only on `trials`, never on the outcome.
    pub fn geometric_trials(&mut self, prob: f64, trials: u64) -> Fallible<u64> {
        let mut first_success = trials;
        for i in 0..trials {
            if self.bernoulli(prob)? && first_success == trials {
                first_success = i;
            }
        }
        Ok(first_success)
    }

    /// A draw from the Laplace distribution with location 0 and the given
    /// scale, as the difference of two exponential draws over [`Self::uniform`].
    pub fn laplace(&mut self, scale: f64) -> Fallible<f64> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::InvalidParameter(format!("laplace scale is {scale}")));
        }
        Ok(scale * (self.uniform().ln() - self.uniform().ln()))
    }

    /// A draw from the Gaussian distribution with mean 0 and the given
    /// standard deviation.
    pub fn gaussian(&mut self, std: f64) -> Fallible<f64> {
        let normal = Normal::new(0.0, std)
            .map_err(|_| Error::InvalidParameter(format!("gaussian std is {std}")))?;
        Ok(normal.sample(self))
    }
}

impl RngCore for Rand {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_stays_in_half_open_interval() {
        let mut rand = Rand::new_for_test(42);
        for _ in 0..1000 {
            let u = rand.uniform();
            assert!(u > 0.0 && u <= 1.0);
        }
    }

    #[test]
    fn bernoulli_is_exact_at_the_ends() {
        let mut rand = Rand::new_for_test(42);
        assert!(rand.bernoulli(1.0).unwrap());
        assert!(!rand.bernoulli(0.0).unwrap());
        assert!(rand.bernoulli(-0.1).is_err());
        assert!(rand.bernoulli(1.1).is_err());
    }

    #[test]
    fn bernoulli_frequency_tracks_probability() {
        let mut rand = Rand::new_for_test(7);
        let trials = 20_000;
        let hits = (0..trials).filter(|_| rand.bernoulli(0.75).unwrap()).count();
        let freq = hits as f64 / trials as f64;
        assert!((freq - 0.75).abs() < 0.02, "frequency was {freq}");
    }

    #[test]
    fn geometric_trials_always_consumes_the_full_budget() {
        let mut rand = Rand::new_for_test(3);
        for _ in 0..100 {
            let v = rand.geometric_trials(0.5, 8).unwrap();
            assert!(v <= 8);
        }
        // Success never observed at probability zero.
        assert_eq!(rand.geometric_trials(0.0, 8).unwrap(), 8);
    }

    #[test]
    fn seeded_draws_are_reproducible() {
        let mut a = Rand::new_for_test(11);
        let mut b = Rand::new_for_test(11);
        for _ in 0..100 {
            assert_eq!(a.u64(), b.u64());
        }
        assert_eq!(a.laplace(2.0).unwrap(), b.laplace(2.0).unwrap());
        assert_eq!(a.gaussian(2.0).unwrap(), b.gaussian(2.0).unwrap());
    }

    #[test]
    fn continuous_noise_moments_are_plausible() {
        let mut rand = Rand::new_for_test(19);
        let n = 20_000;
        let mean: f64 = (0..n).map(|_| rand.laplace(1.0).unwrap()).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "laplace mean was {mean}");
        let var: f64 =
            (0..n).map(|_| rand.gaussian(1.0).unwrap().powi(2)).sum::<f64>() / n as f64;
        assert!((var - 1.0).abs() < 0.1, "gaussian variance was {var}");
    }
}
