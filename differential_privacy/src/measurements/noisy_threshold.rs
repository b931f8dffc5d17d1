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

//! Thresholded noisy release of a keyed aggregate: the measurement half of a
//! stability histogram.
//!
//! The key set of the input is itself data-dependent, so keys cannot be
//! released unconditionally. Adding Laplace noise to every count and
//! releasing only keys whose noisy count clears the threshold bounds the
//! probability that a key present in one neighboring dataset but not the
//! other ever appears in the output; that probability is the delta of the
//! resulting approximate-DP guarantee.

use std::collections::HashMap;

use crate::core::{Function, Measurement, PrivacyMap};
use crate::domains::{AtomDomain, MapDomain};
use crate::error::{Error, Fallible};
use crate::measures::{SmdCurve, SmoothedMaxDivergence};
use crate::metrics::L1Distance;
use crate::samplers::Rand;
use crate::traits::{CheckAtom, Float, Hashable};

use super::laplace::{then_add_laplace, validate_scale};

/// Makes a measurement that adds Laplace(0, scale) noise to each value of a
/// keyed aggregate and releases only the entries whose noisy value is at
/// least `threshold`.
///
/// Privacy map: a curve over delta with `epsilon = d_in / scale`, defined for
/// every `delta >= d_in * exp((d_in - threshold) / scale) / 2` (the union
/// bound over at most `d_in` keys on the Laplace tail above the threshold).
/// Fix a concrete delta with [`crate::combinators::make_fix_delta`].
pub fn make_noisy_threshold<TK, QO>(
    input_domain: MapDomain<AtomDomain<TK>, AtomDomain<QO>>,
    input_metric: L1Distance<QO>,
    scale: QO,
    threshold: QO,
) -> Fallible<
    Measurement<
        MapDomain<AtomDomain<TK>, AtomDomain<QO>>,
        HashMap<TK, QO>,
        L1Distance<QO>,
        SmoothedMaxDivergence<QO>,
    >,
>
where
    TK: Hashable,
    QO: Float + CheckAtom,
{
    validate_scale(scale)?;
    if !threshold.is_finite() || threshold <= QO::zero() {
        return Err(Error::InvalidParameter(format!(
            "threshold is {threshold:?}, must be finite and positive"
        )));
    }
    Measurement::new(
        input_domain,
        Function::new_fallible(move |counts: &HashMap<TK, QO>| {
            let mut rand = Rand::new()?;
            let mut released = HashMap::new();
            for (key, count) in counts {
                let noisy = then_add_laplace(scale, &mut rand, *count)?;
                if noisy >= threshold {
                    released.insert(key.clone(), noisy);
                }
            }
            Ok(released)
        }),
        input_metric,
        SmoothedMaxDivergence::new(),
        PrivacyMap::new_fallible(move |d_in: &QO| {
            let d_in = *d_in;
            if !d_in.is_finite() || d_in < QO::zero() {
                return Err(Error::InvalidDistance(format!(
                    "sensitivity is {d_in:?}, must be non-negative and finite"
                )));
            }
            Ok(SmdCurve::new(move |delta: &QO| {
                if *delta <= QO::zero() || *delta >= QO::one() {
                    return Err(Error::InvalidDistance(format!(
                        "delta is {delta:?}, must be in (0, 1)"
                    )));
                }
                if d_in == QO::zero() {
                    return Ok(QO::zero());
                }
                // Smallest delta the threshold supports at this sensitivity,
                // rounded outward.
                let two = QO::one() + QO::one();
                let tail = d_in.inf_sub(threshold)?.inf_div(scale)?.inf_exp()?.inf_div(two)?;
                let min_delta = d_in.inf_mul(tail)?;
                if *delta < min_delta {
                    return Err(Error::InvalidDistance(format!(
                        "delta must be at least {min_delta:?} at this threshold"
                    )));
                }
                d_in.inf_div(scale)
            }))
        }),
    )
}
