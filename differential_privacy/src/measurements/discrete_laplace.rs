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

//! The discrete Laplace mechanism with exact, unbounded sampling.

use crate::core::{Domain, Function, Measurement, Metric, PrivacyMap};
use crate::domains::{AtomDomain, VectorDomain};
use crate::error::{Error, Fallible};
use crate::measures::MaxDivergence;
use crate::metrics::{AbsoluteDistance, L1Distance};
use crate::samplers::discrete::{
    rational_from_float, sample_discrete_laplace, saturating_add_noise, URational,
};
use crate::samplers::Rand;
use crate::traits::{CheckAtom, Float, InfCast, Integer};

use super::laplace::validate_scale;

/// Integer domains over which additive discrete Laplace noise is defined,
/// along with the metric the mechanism's sensitivity is measured in.
pub trait DiscreteLaplaceDomain: Domain {
    type Atom: Integer;
    type InputMetric: Metric<Distance = Self::Atom>;

    /// Per-element exact sampling at the given rational scale.
    fn noise_function(scale: URational) -> Function<Self::Carrier, Self::Carrier>;

    /// Per-element truncated sampling in time that depends only on `trials`.
    fn linear_noise_function(
        prob: f64,
        trials: u64,
        bounds: (Self::Atom, Self::Atom),
    ) -> Function<Self::Carrier, Self::Carrier>;
}

pub(crate) fn add_linear_geometric_noise<T: Integer>(
    value: T,
    prob: f64,
    trials: u64,
    bounds: (T, T),
    rand: &mut Rand,
) -> Fallible<T> {
    let (lower, upper) = bounds;
    let clamped = num_traits::clamp(value, lower, upper);
    // The difference of two capped geometric draws is two-sided geometric
    // noise; both draws always run their full trial budget, and truncation at
    // the range width is absorbed by the final clamp.
    let positive = rand.geometric_trials(prob, trials)?;
    let negative = rand.geometric_trials(prob, trials)?;
    let noise = num_bigint::BigInt::from(positive as i128 - negative as i128);
    Ok(num_traits::clamp(saturating_add_noise(clamped, &noise), lower, upper))
}

impl<T: Integer + CheckAtom> DiscreteLaplaceDomain for AtomDomain<T> {
    type Atom = T;
    type InputMetric = AbsoluteDistance<T>;

    fn noise_function(scale: URational) -> Function<T, T> {
        Function::new_fallible(move |arg: &T| {
            let mut rand = Rand::new()?;
            let noise = sample_discrete_laplace(&scale, &mut rand)?;
            Ok(saturating_add_noise(*arg, &noise))
        })
    }

    fn linear_noise_function(prob: f64, trials: u64, bounds: (T, T)) -> Function<T, T> {
        Function::new_fallible(move |arg: &T| {
            let mut rand = Rand::new()?;
            add_linear_geometric_noise(*arg, prob, trials, bounds, &mut rand)
        })
    }
}

impl<T: Integer + CheckAtom> DiscreteLaplaceDomain for VectorDomain<AtomDomain<T>> {
    type Atom = T;
    type InputMetric = L1Distance<T>;

    fn noise_function(scale: URational) -> Function<Vec<T>, Vec<T>> {
        Function::new_fallible(move |arg: &Vec<T>| {
            let mut rand = Rand::new()?;
            arg.iter()
                .map(|v| {
                    let noise = sample_discrete_laplace(&scale, &mut rand)?;
                    Ok(saturating_add_noise(*v, &noise))
                })
                .collect()
        })
    }

    fn linear_noise_function(prob: f64, trials: u64, bounds: (T, T)) -> Function<Vec<T>, Vec<T>> {
        Function::new_fallible(move |arg: &Vec<T>| {
            let mut rand = Rand::new()?;
            arg.iter()
                .map(|v| add_linear_geometric_noise(*v, prob, trials, bounds, &mut rand))
                .collect()
        })
    }
}

/// The pure-DP privacy map shared by the discrete Laplace samplers:
/// `epsilon = d_in / scale`, with the integer sensitivity cast conservatively.
pub(crate) fn integer_laplace_privacy_map<MI, T, QO>(scale: QO) -> PrivacyMap<MI, MaxDivergence<QO>>
where
    MI: Metric<Distance = T>,
    T: Integer,
    QO: Float + InfCast<T>,
{
    PrivacyMap::new_fallible(move |d_in: &T| {
        let d_in = QO::inf_cast(*d_in)?;
        if d_in < QO::zero() {
            return Err(Error::InvalidDistance(format!(
                "sensitivity is {d_in:?}, must be non-negative"
            )));
        }
        d_in.inf_div(scale)
    })
}

/// Makes a measurement that perturbs an integer (or each element of an
/// integer vector) with exact discrete Laplace noise.
///
/// The sampler is unbiased and exact regardless of magnitude; the released
/// sum saturates at the bounds of the data type.
///
/// Privacy map: `epsilon = d_in / scale` under max-divergence, where `d_in`
/// bounds the absolute (scalar) or L1 (vector) sensitivity.
pub fn make_discrete_laplace<D, QO>(
    input_domain: D,
    input_metric: D::InputMetric,
    scale: QO,
) -> Fallible<Measurement<D, D::Carrier, D::InputMetric, MaxDivergence<QO>>>
where
    D: DiscreteLaplaceDomain,
    QO: Float + InfCast<D::Atom>,
{
    validate_scale(scale)?;
    let rational_scale = rational_from_float(scale.to_f64().ok_or_else(|| {
        Error::InvalidParameter("scale is not representable as f64".into())
    })?)?;
    Measurement::new(
        input_domain,
        D::noise_function(rational_scale),
        input_metric,
        MaxDivergence::new(),
        integer_laplace_privacy_map::<D::InputMetric, D::Atom, QO>(scale),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_boundary_is_exact_at_scale_two() {
        let meas =
            make_discrete_laplace(AtomDomain::<i32>::new(), AbsoluteDistance::new(), 2.0).unwrap();
        assert!(meas.check(&1, &0.5).unwrap());
        assert!(!meas.check(&1, &0.49999).unwrap());
    }

    #[test]
    fn vector_variant_shares_the_boundary() {
        let meas = make_discrete_laplace(
            VectorDomain::new(AtomDomain::<i32>::new()),
            L1Distance::new(),
            2.0,
        )
        .unwrap();
        assert!(meas.check(&1, &0.5).unwrap());
        assert!(!meas.check(&1, &0.49999).unwrap());
        assert_eq!(meas.invoke(&vec![100, 10, 12]).unwrap().len(), 3);
    }

    #[test]
    fn release_saturates_instead_of_wrapping() {
        let meas =
            make_discrete_laplace(AtomDomain::<i8>::new(), AbsoluteDistance::new(), 20.0).unwrap();
        for _ in 0..100 {
            // With scale far above the type's range, saturation is common;
            // the release must stay in range rather than wrap.
            let _ = meas.invoke(&i8::MAX).unwrap();
        }
    }

    #[test]
    fn invalid_parameters_fail_at_construction() {
        assert!(
            make_discrete_laplace(AtomDomain::<i32>::new(), AbsoluteDistance::new(), 0.0).is_err()
        );
        assert!(make_discrete_laplace(AtomDomain::<i32>::new(), AbsoluteDistance::new(), -2.0)
            .is_err());
    }
}
