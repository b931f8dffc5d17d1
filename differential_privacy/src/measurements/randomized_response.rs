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

//! Randomized response: local-model release of a single categorical or
//! boolean value.

use std::collections::HashSet;

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::core::{Function, Measurement, PrivacyMap};
use crate::domains::AtomDomain;
use crate::error::{Error, Fallible};
use crate::measures::MaxDivergence;
use crate::metrics::{DiscreteDistance, IntDistance};
use crate::samplers::discrete::sample_uniform_below;
use crate::samplers::Rand;
use crate::traits::{Float, Hashable};

fn randomized_response_privacy_map(epsilon: f64) -> PrivacyMap<DiscreteDistance, MaxDivergence<f64>>
{
    PrivacyMap::new(move |d_in: &IntDistance| if *d_in == 0 { 0.0 } else { epsilon })
}

/// Makes a measurement that reports the true category with probability
/// `prob`, and otherwise one of the remaining categories uniformly at random.
///
/// `prob` must lie in `[1/k, 1)` for `k` categories, so that truth is never
/// less likely than any single lie.
///
/// Privacy map: `epsilon = ln(prob * (k - 1) / (1 - prob))` whenever the
/// inputs differ, under max-divergence.
pub fn make_randomized_response<T: Hashable>(
    categories: Vec<T>,
    prob: f64,
) -> Fallible<Measurement<AtomDomain<T>, T, DiscreteDistance, MaxDivergence<f64>>> {
    let num_categories = categories.len();
    if num_categories < 2 {
        return Err(Error::InvalidParameter(format!(
            "requires at least two categories, got {num_categories}"
        )));
    }
    if categories.iter().collect::<HashSet<_>>().len() != num_categories {
        return Err(Error::InvalidParameter("categories must be distinct".into()));
    }
    if prob < (num_categories as f64).recip() || prob >= 1.0 {
        return Err(Error::InvalidParameter(format!(
            "prob is {prob}, must be in [1/{num_categories}, 1)"
        )));
    }

    // epsilon = ln(prob * (k - 1) / (1 - prob)); the products and the
    // complement are exact for every k below 2^53.
    let epsilon = prob
        .inf_mul(num_categories as f64 - 1.0)?
        .inf_div(1.0.neg_inf_sub(prob)?)?
        .inf_ln()?;

    Ok(Measurement::new(
        AtomDomain::new(),
        Function::new_fallible(move |arg: &T| {
            let mut rand = Rand::new()?;
            if rand.bernoulli(prob)? {
                return Ok(arg.clone());
            }
            let index = sample_uniform_below(&BigUint::from(num_categories - 1), &mut rand)?
                .to_usize()
                .ok_or_else(|| Error::FailedFunction("category index overflow".into()))?;
            // Skip over the true category so the lie is uniform on the rest.
            // Inputs outside the category list leave the draw uniform over
            // the first k - 1 categories, which stays within the bound.
            let position = categories.iter().position(|c| c == arg);
            Ok(match position {
                Some(p) if index >= p => categories[index + 1].clone(),
                _ => categories[index].clone(),
            })
        }),
        DiscreteDistance,
        MaxDivergence::new(),
        randomized_response_privacy_map(epsilon),
    )?)
}

/// Makes a measurement that reports a boolean truthfully with probability
/// `prob` and flipped otherwise. `prob` must lie in `[0.5, 1)`.
///
/// Privacy map: `epsilon = ln(prob / (1 - prob))` whenever the inputs
/// differ, under max-divergence.
pub fn make_randomized_response_bool(
    prob: f64,
) -> Fallible<Measurement<AtomDomain<bool>, bool, DiscreteDistance, MaxDivergence<f64>>> {
    if !(0.5..1.0).contains(&prob) {
        return Err(Error::InvalidParameter(format!("prob is {prob}, must be in [0.5, 1)")));
    }

    let epsilon = prob.inf_div(1.0.neg_inf_sub(prob)?)?.inf_ln()?;

    Ok(Measurement::new(
        AtomDomain::new(),
        Function::new_fallible(move |arg: &bool| {
            let mut rand = Rand::new()?;
            Ok(if rand.bernoulli(prob)? { *arg } else { !*arg })
        }),
        DiscreteDistance,
        MaxDivergence::new(),
        randomized_response_privacy_map(epsilon),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abcd() -> Vec<String> {
        vec!["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()]
    }

    #[test]
    fn categorical_epsilon_boundary() {
        let meas = make_randomized_response(abcd(), 0.75).unwrap();
        // ln(0.75 * 3 / 0.25) = ln(9).
        assert!(meas.check(&1, &9.0f64.ln()).unwrap());
        assert!(!meas.check(&1, &8.999f64.ln()).unwrap());
        assert_eq!(meas.map(&0).unwrap(), 0.0);
    }

    #[test]
    fn categorical_release_is_a_category() {
        let meas = make_randomized_response(abcd(), 0.75).unwrap();
        let categories = abcd();
        for _ in 0..100 {
            assert!(categories.contains(&meas.invoke(&"A".to_string()).unwrap()));
        }
    }

    #[test]
    fn truth_frequency_tracks_probability() {
        let meas = make_randomized_response(abcd(), 0.75).unwrap();
        let trials = 5_000;
        let truths = (0..trials)
            .filter(|_| meas.invoke(&"B".to_string()).unwrap() == "B")
            .count();
        let freq = truths as f64 / trials as f64;
        // Lies are uniform over the other three categories, so the truth
        // frequency equals prob.
        assert!((freq - 0.75).abs() < 0.05, "frequency was {freq}");
    }

    #[test]
    fn boolean_epsilon_boundary() {
        let meas = make_randomized_response_bool(0.75).unwrap();
        assert!(meas.check(&1, &3.0f64.ln()).unwrap());
        assert!(!meas.check(&1, &2.999f64.ln()).unwrap());
    }

    #[test]
    fn invalid_parameters_fail_at_construction() {
        assert!(make_randomized_response(abcd(), 0.2).is_err());
        assert!(make_randomized_response(abcd(), 1.0).is_err());
        assert!(make_randomized_response(vec!["A".to_string()], 0.75).is_err());
        assert!(
            make_randomized_response(vec!["A".to_string(), "A".to_string()], 0.75).is_err()
        );
        assert!(make_randomized_response_bool(0.4).is_err());
        assert!(make_randomized_response_bool(1.0).is_err());
    }
}
