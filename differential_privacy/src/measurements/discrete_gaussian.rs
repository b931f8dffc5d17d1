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

//! The discrete Gaussian mechanism with exact integer sampling.

use crate::core::{Domain, Function, Measurement, Metric};
use crate::domains::{AtomDomain, VectorDomain};
use crate::error::Error;
use crate::error::Fallible;
use crate::measures::ZeroConcentratedDivergence;
use crate::metrics::{AbsoluteDistance, L2Distance};
use crate::samplers::discrete::{
    rational_from_float, sample_discrete_gaussian, saturating_add_noise, URational,
};
use crate::samplers::Rand;
use crate::traits::{CheckAtom, Float, Integer};

use super::gaussian::gaussian_privacy_map;
use super::laplace::validate_scale;

/// Integer domains over which additive discrete Gaussian noise is defined.
///
/// `QI` is the numeric type sensitivities are expressed in; it is real-valued
/// even though the data is integral (an L2 sensitivity is rarely an integer).
pub trait DiscreteGaussianDomain<QI: Float>: Domain {
    type Atom: Integer;
    type InputMetric: Metric<Distance = QI>;

    fn noise_function(sigma: URational) -> Function<Self::Carrier, Self::Carrier>;
}

impl<T: Integer + CheckAtom, QI: Float> DiscreteGaussianDomain<QI> for AtomDomain<T> {
    type Atom = T;
    type InputMetric = AbsoluteDistance<QI>;

    fn noise_function(sigma: URational) -> Function<T, T> {
        Function::new_fallible(move |arg: &T| {
            let mut rand = Rand::new()?;
            let noise = sample_discrete_gaussian(&sigma, &mut rand)?;
            Ok(saturating_add_noise(*arg, &noise))
        })
    }
}

impl<T: Integer + CheckAtom, QI: Float> DiscreteGaussianDomain<QI> for VectorDomain<AtomDomain<T>> {
    type Atom = T;
    type InputMetric = L2Distance<QI>;

    fn noise_function(sigma: URational) -> Function<Vec<T>, Vec<T>> {
        Function::new_fallible(move |arg: &Vec<T>| {
            let mut rand = Rand::new()?;
            arg.iter()
                .map(|v| {
                    let noise = sample_discrete_gaussian(&sigma, &mut rand)?;
                    Ok(saturating_add_noise(*v, &noise))
                })
                .collect()
        })
    }
}

/// Makes a measurement that perturbs an integer (or each element of an
/// integer vector) with exact discrete Gaussian noise.
///
/// Sampling is rejection-based on integer arithmetic only: there is no
/// floating-point rounding in the tail to leak through the released integer.
///
/// Privacy map: `rho = (d_in / scale)^2 / 2` under zero-concentrated
/// divergence, where `d_in` bounds the absolute (scalar) or L2 (vector)
/// sensitivity.
pub fn make_discrete_gaussian<D, QI>(
    input_domain: D,
    input_metric: D::InputMetric,
    scale: QI,
) -> Fallible<Measurement<D, D::Carrier, D::InputMetric, ZeroConcentratedDivergence<QI>>>
where
    D: DiscreteGaussianDomain<QI>,
    QI: Float,
{
    validate_scale(scale)?;
    let sigma = rational_from_float(scale.to_f64().ok_or_else(|| {
        Error::InvalidParameter("scale is not representable as f64".into())
    })?)?;
    Measurement::new(
        input_domain,
        D::noise_function(sigma),
        input_metric,
        ZeroConcentratedDivergence::new(),
        gaussian_privacy_map::<D::InputMetric, QI>(scale),
    )
}
