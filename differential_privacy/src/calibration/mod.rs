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

//! Calibration of a free mechanism parameter against a target privacy bound.
//!
//! The search assumes the supplied predicate (or measurement family) is
//! monotonic in the parameter. That precondition is not verified; a
//! non-monotonic family yields a silently incorrect result.

use log::debug;

use crate::core::{Domain, Measure, Measurement, Metric};
use crate::error::{Error, Fallible};
use crate::traits::ProductOrd;

/// Probed decades when no explicit search bounds are given.
const DISCOVERY_EXPONENT_RANGE: i32 = 8;

/// Finds the extremal `f64` at which `predicate` flips from false to true
/// (or true to false), returning the passing value adjacent to the boundary.
///
/// With explicit `bounds`, the predicate must differ between the two ends.
/// Without bounds, positive decades `10^-8 ..= 10^8` are probed to bracket
/// the boundary first. Fails with `SearchUnsatisfiable` when no passing
/// parameter is found, or when the predicate never changes over the explored
/// range.
pub fn binary_search(
    predicate: impl Fn(f64) -> bool,
    bounds: Option<(f64, f64)>,
) -> Fallible<f64> {
    let (mut lo, mut hi) = match bounds {
        Some((lo, hi)) => {
            if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                return Err(Error::InvalidParameter(format!(
                    "search bounds are ({lo}, {hi}), lower must be strictly below upper"
                )));
            }
            (lo, hi)
        }
        None => discover_bracket(&predicate)?,
    };

    let pass_lo = predicate(lo);
    if pass_lo == predicate(hi) {
        return Err(Error::SearchUnsatisfiable(
            "the predicate does not change over the search bounds".into(),
        ));
    }

    let mut iterations = 0usize;
    loop {
        let mid = lo + (hi - lo) / 2.0;
        if mid <= lo || mid >= hi {
            // The interval has collapsed to two adjacent floats.
            break;
        }
        if predicate(mid) == pass_lo {
            lo = mid;
        } else {
            hi = mid;
        }
        iterations += 1;
    }
    let result = if pass_lo { lo } else { hi };
    debug!("binary search converged to {result} after {iterations} iterations");
    Ok(result)
}

/// Probes positive decades for one passing and one failing parameter.
fn discover_bracket(predicate: &impl Fn(f64) -> bool) -> Fallible<(f64, f64)> {
    let mut passing = None;
    let mut failing = None;
    // Scan outward from 1 so nearby brackets are found early.
    for exponent in 0..=DISCOVERY_EXPONENT_RANGE {
        for candidate in [10f64.powi(exponent), 10f64.powi(-exponent)] {
            match (predicate(candidate), &passing, &failing) {
                (true, None, _) => passing = Some(candidate),
                (false, _, None) => failing = Some(candidate),
                _ => {}
            }
            if let (Some(pass), Some(fail)) = (passing, failing) {
                return Ok((pass.min(fail), pass.max(fail)));
            }
        }
    }
    if passing.is_none() {
        return Err(Error::SearchUnsatisfiable(
            "no parameter in the probed range satisfies the predicate; supply explicit bounds"
                .into(),
        ));
    }
    Err(Error::SearchUnsatisfiable(
        "the predicate holds everywhere in the probed range; supply explicit bounds".into(),
    ))
}

/// Finds the extremal parameter of a measurement family such that
/// `check(d_in, d_out)` still passes.
///
/// `make` is called with candidate parameters; a constructor error counts as
/// a failing candidate. The family must be monotonic in the parameter
/// (documented precondition).
pub fn binary_search_param<DI, TO, MI, MO>(
    make: impl Fn(f64) -> Fallible<Measurement<DI, TO, MI, MO>>,
    d_in: &MI::Distance,
    d_out: &MO::Distance,
    bounds: Option<(f64, f64)>,
) -> Fallible<f64>
where
    DI: Domain,
    MI: Metric,
    MO: Measure,
    MO::Distance: ProductOrd,
{
    binary_search(
        |param| {
            make(param)
                .and_then(|measurement| measurement.check(d_in, d_out))
                .unwrap_or(false)
        },
        bounds,
    )
}
