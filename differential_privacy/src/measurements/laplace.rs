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

//! The continuous Laplace mechanism.

use crate::core::{Domain, Function, Measurement, Metric, PrivacyMap};
use crate::domains::{AtomDomain, VectorDomain};
use crate::error::{Error, Fallible};
use crate::measures::MaxDivergence;
use crate::metrics::{AbsoluteDistance, L1Distance};
use crate::samplers::Rand;
use crate::traits::{CheckAtom, Float};
use num_traits::Zero;

pub(crate) fn then_add_laplace<Q: Float>(scale: Q, rand: &mut Rand, value: Q) -> Fallible<Q> {
    let noise = rand.laplace(scale.to_f64().ok_or_else(|| {
        Error::FailedFunction("scale is not representable as f64".into())
    })?)?;
    let noise = Q::from_f64(noise)
        .ok_or_else(|| Error::FailedFunction("noise is not representable".into()))?;
    Ok(value + noise)
}

pub(crate) fn validate_scale<Q: Float>(scale: Q) -> Fallible<()> {
    if !scale.is_finite() || scale <= Q::zero() {
        return Err(Error::InvalidParameter(format!(
            "scale is {scale:?}, must be finite and positive"
        )));
    }
    Ok(())
}

/// Domains over which additive Laplace noise is defined, along with the
/// metric the mechanism's sensitivity is measured in.
pub trait LaplaceDomain: Domain {
    type Atom: Float;
    type InputMetric: Metric<Distance = Self::Atom>;

    fn noise_function(scale: Self::Atom) -> Function<Self::Carrier, Self::Carrier>;
}

impl<Q: Float + CheckAtom> LaplaceDomain for AtomDomain<Q> {
    type Atom = Q;
    type InputMetric = AbsoluteDistance<Q>;

    fn noise_function(scale: Q) -> Function<Q, Q> {
        Function::new_fallible(move |arg: &Q| {
            let mut rand = Rand::new()?;
            then_add_laplace(scale, &mut rand, *arg)
        })
    }
}

impl<Q: Float + CheckAtom> LaplaceDomain for VectorDomain<AtomDomain<Q>> {
    type Atom = Q;
    type InputMetric = L1Distance<Q>;

    fn noise_function(scale: Q) -> Function<Vec<Q>, Vec<Q>> {
        Function::new_fallible(move |arg: &Vec<Q>| {
            let mut rand = Rand::new()?;
            arg.iter().map(|v| then_add_laplace(scale, &mut rand, *v)).collect()
        })
    }
}

/// Makes a measurement that adds Laplace(0, scale) noise to a real value, or
/// independently to each component of a vector of real values.
///
/// Privacy map: `epsilon = d_in / scale` under max-divergence, where `d_in`
/// bounds the absolute (scalar) or L1 (vector) sensitivity.
pub fn make_laplace<D: LaplaceDomain>(
    input_domain: D,
    input_metric: D::InputMetric,
    scale: D::Atom,
) -> Fallible<Measurement<D, D::Carrier, D::InputMetric, MaxDivergence<D::Atom>>> {
    validate_scale(scale)?;
    Measurement::new(
        input_domain,
        D::noise_function(scale),
        input_metric,
        MaxDivergence::new(),
        PrivacyMap::new_fallible(move |d_in: &D::Atom| {
            if d_in < &D::Atom::zero() {
                return Err(Error::InvalidDistance(format!(
                    "sensitivity is {d_in:?}, must be non-negative"
                )));
            }
            d_in.inf_div(scale)
        }),
    )
}
