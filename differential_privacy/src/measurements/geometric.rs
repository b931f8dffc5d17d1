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

//! Two-sided geometric noise over a bounded integer range, sampled in time
//! that depends only on the range width.

use crate::core::Measurement;
use crate::error::{Error, Fallible};
use crate::measures::MaxDivergence;
use crate::traits::{Float, InfCast, Integer};

use super::discrete_laplace::{
    integer_laplace_privacy_map, make_discrete_laplace, DiscreteLaplaceDomain,
};
use super::laplace::validate_scale;

fn bounds_width<T: Integer>(lower: T, upper: T) -> Fallible<u64> {
    if lower >= upper {
        return Err(Error::InvalidParameter(format!(
            "bounds are ({lower:?}, {upper:?}), lower must be strictly below upper"
        )));
    }
    let width = match (lower.to_i128(), upper.to_i128()) {
        // Interpreting both endpoints mod 2^128 makes the wrapping
        // subtraction exact for every signed range.
        (Some(l), Some(u)) => (u as u128).wrapping_sub(l as u128),
        // Only u128 bounds beyond i128::MAX take this branch.
        _ => {
            let l = lower.to_u128().ok_or_else(|| {
                Error::InvalidParameter("bounds are outside the supported range".into())
            })?;
            let u = upper.to_u128().ok_or_else(|| {
                Error::InvalidParameter("bounds are outside the supported range".into())
            })?;
            u - l
        }
    };
    u64::try_from(width).map_err(|_| {
        Error::InvalidParameter("bounds range is too large for the linear-time sampler".into())
    })
}

/// Makes a measurement that perturbs a bounded integer (or each element of a
/// vector of bounded integers) with truncated two-sided geometric noise.
///
/// The sampler always consumes `upper - lower` Bernoulli trials per draw, so
/// its running time depends on the declared bounds and never on the data:
/// this resists timing side channels at the cost of clamping the release into
/// `[lower, upper]`.
///
/// Privacy map: `epsilon = d_in / scale` under max-divergence (clamping and
/// truncation are post-processing).
pub fn make_discrete_laplace_linear<D, QO>(
    input_domain: D,
    input_metric: D::InputMetric,
    scale: QO,
    bounds: (D::Atom, D::Atom),
) -> Fallible<Measurement<D, D::Carrier, D::InputMetric, MaxDivergence<QO>>>
where
    D: DiscreteLaplaceDomain,
    QO: Float + InfCast<D::Atom>,
{
    validate_scale(scale)?;
    let trials = bounds_width(bounds.0, bounds.1)?;
    let scale_f = scale
        .to_f64()
        .ok_or_else(|| Error::InvalidParameter("scale is not representable as f64".into()))?;
    // Success probability 1 - exp(-1/scale) turns the geometric trial count
    // into discrete Laplace noise at the requested scale.
    let prob = -(-scale_f.recip()).exp_m1();
    Measurement::new(
        input_domain,
        D::linear_noise_function(prob, trials, bounds),
        input_metric,
        MaxDivergence::new(),
        integer_laplace_privacy_map::<D::InputMetric, D::Atom, QO>(scale),
    )
}

/// Makes a measurement that adds two-sided geometric noise to an integer (or
/// each element of an integer vector).
///
/// When `bounds` are supplied the draw runs in constant time relative to the
/// range width and the release is clamped into the bounds; without bounds the
/// exact unbounded sampler of [`make_discrete_laplace`] is used.
///
/// Privacy map: `epsilon = d_in / scale` under max-divergence.
pub fn make_geometric<D, QO>(
    input_domain: D,
    input_metric: D::InputMetric,
    scale: QO,
    bounds: Option<(D::Atom, D::Atom)>,
) -> Fallible<Measurement<D, D::Carrier, D::InputMetric, MaxDivergence<QO>>>
where
    D: DiscreteLaplaceDomain,
    QO: Float + InfCast<D::Atom>,
{
    match bounds {
        Some(bounds) => make_discrete_laplace_linear(input_domain, input_metric, scale, bounds),
        None => make_discrete_laplace(input_domain, input_metric, scale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::{AtomDomain, VectorDomain};
    use crate::metrics::{AbsoluteDistance, L1Distance};

    #[test]
    fn bounded_release_stays_in_bounds() {
        let meas = make_discrete_laplace_linear(
            AtomDomain::<i32>::new(),
            AbsoluteDistance::new(),
            2.0,
            (1, 10),
        )
        .unwrap();
        for _ in 0..200 {
            let release = meas.invoke(&5).unwrap();
            assert!((1..=10).contains(&release));
        }
        // Out-of-bounds data is clamped before noising, not rejected.
        assert!((1..=10).contains(&meas.invoke(&100).unwrap()));
    }

    #[test]
    fn map_boundary_is_exact_at_scale_two() {
        let meas = make_discrete_laplace_linear(
            AtomDomain::<i32>::new(),
            AbsoluteDistance::new(),
            2.0,
            (1, 10),
        )
        .unwrap();
        assert!(meas.check(&1, &0.5).unwrap());
        assert!(!meas.check(&1, &0.49999).unwrap());
    }

    #[test]
    fn geometric_dispatches_on_bounds() {
        let bounded =
            make_geometric(AtomDomain::<i32>::new(), AbsoluteDistance::new(), 2.0, Some((1, 10)))
                .unwrap();
        let unbounded =
            make_geometric(AtomDomain::<i32>::new(), AbsoluteDistance::new(), 2.0, None).unwrap();
        for meas in [&bounded, &unbounded] {
            assert!(meas.check(&1, &0.5).unwrap());
            assert!(!meas.check(&1, &0.49999).unwrap());
        }
        assert!((1..=10).contains(&bounded.invoke(&100).unwrap()));
    }

    #[test]
    fn vector_variant_clamps_each_element() {
        let meas = make_discrete_laplace_linear(
            VectorDomain::new(AtomDomain::<i64>::new()),
            L1Distance::new(),
            1.0,
            (0, 4),
        )
        .unwrap();
        let release = meas.invoke(&vec![0, 2, 100]).unwrap();
        assert!(release.iter().all(|v| (0..=4).contains(v)));
    }

    #[test]
    fn degenerate_bounds_fail_at_construction() {
        for bounds in [(10, 1), (3, 3)] {
            assert!(make_discrete_laplace_linear(
                AtomDomain::<i32>::new(),
                AbsoluteDistance::new(),
                2.0,
                bounds,
            )
            .is_err());
        }
    }
}
