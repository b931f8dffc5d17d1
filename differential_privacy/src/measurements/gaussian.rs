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

//! The continuous Gaussian mechanism under zero-concentrated DP.

use crate::core::{Domain, Function, Measurement, Metric, PrivacyMap};
use crate::domains::{AtomDomain, VectorDomain};
use crate::error::{Error, Fallible};
use crate::measures::ZeroConcentratedDivergence;
use crate::metrics::{AbsoluteDistance, L2Distance};
use crate::samplers::Rand;
use crate::traits::{CheckAtom, Float};

use super::laplace::validate_scale;

fn then_add_gaussian<Q: Float>(scale: Q, rand: &mut Rand, value: Q) -> Fallible<Q> {
    let noise = rand.gaussian(scale.to_f64().ok_or_else(|| {
        Error::FailedFunction("scale is not representable as f64".into())
    })?)?;
    let noise = Q::from_f64(noise)
        .ok_or_else(|| Error::FailedFunction("noise is not representable".into()))?;
    Ok(value + noise)
}

/// Domains over which additive Gaussian noise is defined, along with the
/// metric the mechanism's sensitivity is measured in.
pub trait GaussianDomain: Domain {
    type Atom: Float;
    type InputMetric: Metric<Distance = Self::Atom>;

    fn noise_function(scale: Self::Atom) -> Function<Self::Carrier, Self::Carrier>;
}

impl<Q: Float + CheckAtom> GaussianDomain for AtomDomain<Q> {
    type Atom = Q;
    type InputMetric = AbsoluteDistance<Q>;

    fn noise_function(scale: Q) -> Function<Q, Q> {
        Function::new_fallible(move |arg: &Q| {
            let mut rand = Rand::new()?;
            then_add_gaussian(scale, &mut rand, *arg)
        })
    }
}

impl<Q: Float + CheckAtom> GaussianDomain for VectorDomain<AtomDomain<Q>> {
    type Atom = Q;
    type InputMetric = L2Distance<Q>;

    fn noise_function(scale: Q) -> Function<Vec<Q>, Vec<Q>> {
        Function::new_fallible(move |arg: &Vec<Q>| {
            let mut rand = Rand::new()?;
            arg.iter().map(|v| then_add_gaussian(scale, &mut rand, *v)).collect()
        })
    }
}

/// The zCDP privacy map of additive Gaussian noise:
/// `rho = (d_in / scale)^2 / 2`, rounded away from the caller's favor.
pub(crate) fn gaussian_privacy_map<MI, Q>(scale: Q) -> PrivacyMap<MI, ZeroConcentratedDivergence<Q>>
where
    MI: Metric<Distance = Q>,
    Q: Float,
{
    PrivacyMap::new_fallible(move |d_in: &Q| {
        if d_in < &Q::zero() {
            return Err(Error::InvalidDistance(format!(
                "sensitivity is {d_in:?}, must be non-negative"
            )));
        }
        let base = d_in.inf_div(scale)?;
        base.inf_mul(base)?.inf_div(Q::one() + Q::one())
    })
}

/// Makes a measurement that adds Gaussian(0, scale^2) noise to a real value,
/// or independently to each component of a vector of real values.
///
/// Privacy map: `rho = (d_in / scale)^2 / 2` under zero-concentrated
/// divergence, where `d_in` bounds the absolute (scalar) or L2 (vector)
/// sensitivity. Convert to an approximate-DP curve with
/// [`crate::combinators::make_zcdp_to_approxdp`].
pub fn make_gaussian<D: GaussianDomain>(
    input_domain: D,
    input_metric: D::InputMetric,
    scale: D::Atom,
) -> Fallible<Measurement<D, D::Carrier, D::InputMetric, ZeroConcentratedDivergence<D::Atom>>> {
    validate_scale(scale)?;
    Measurement::new(
        input_domain,
        D::noise_function(scale),
        input_metric,
        ZeroConcentratedDivergence::new(),
        gaussian_privacy_map::<D::InputMetric, D::Atom>(scale),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_gaussian_rho_is_exact_at_dyadic_parameters() {
        let meas = make_gaussian(AtomDomain::<f64>::new(), AbsoluteDistance::new(), 2.0).unwrap();
        // rho = (1/2)^2 / 2, exactly.
        assert_eq!(meas.map(&1.0).unwrap(), 0.125);
        assert!(meas.check(&1.0, &0.125).unwrap());
        assert!(!meas.check(&1.0, &0.124).unwrap());
    }

    #[test]
    fn vector_gaussian_under_l2_sensitivity() {
        let meas = make_gaussian(
            VectorDomain::new(AtomDomain::<f64>::new()),
            L2Distance::new(),
            2.0,
        )
        .unwrap();
        assert!(meas.check(&1.0, &0.125).unwrap());
        assert!(!meas.check(&1.0, &0.124).unwrap());
        let release = meas.invoke(&vec![80.0, 90.0, 100.0]).unwrap();
        assert_eq!(release.len(), 3);
    }

    #[test]
    fn map_is_monotonic() {
        let meas = make_gaussian(AtomDomain::<f64>::new(), AbsoluteDistance::new(), 1.5).unwrap();
        assert!(meas.map(&0.5).unwrap() <= meas.map(&1.0).unwrap());
        assert!(meas.map(&1.0).unwrap() <= meas.map(&3.0).unwrap());
    }

    #[test]
    fn invalid_parameters_fail_at_construction() {
        assert!(make_gaussian(AtomDomain::<f64>::new(), AbsoluteDistance::new(), 0.0).is_err());
        assert!(make_gaussian(AtomDomain::<f64>::new(), AbsoluteDistance::new(), -2.0).is_err());
    }
}
