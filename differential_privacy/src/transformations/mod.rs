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

//! Deterministic transformations with known stability.

use std::collections::HashMap;

use crate::core::{Function, StabilityMap, Transformation};
use crate::domains::{AtomDomain, MapDomain, VectorDomain};
use crate::error::Fallible;
use crate::metrics::{IntDistance, L1Distance, SymmetricDistance};
use crate::traits::{CheckAtom, Hashable, InfCast, Number};

/// Makes a transformation that counts the occurrences of each distinct value
/// in a dataset, producing a map from value to count.
///
/// Stability map: adding or removing one record changes exactly one count by
/// one, so the L1 distance between outputs is bounded by the symmetric
/// distance between inputs.
pub fn make_count_by<TK, TV>(
    input_domain: VectorDomain<AtomDomain<TK>>,
    input_metric: SymmetricDistance,
) -> Fallible<
    Transformation<
        VectorDomain<AtomDomain<TK>>,
        MapDomain<AtomDomain<TK>, AtomDomain<TV>>,
        SymmetricDistance,
        L1Distance<TV>,
    >,
>
where
    TK: Hashable,
    TV: Number + CheckAtom + InfCast<IntDistance>,
{
    Transformation::new(
        input_domain.clone(),
        MapDomain::new(input_domain.element_domain, AtomDomain::new()),
        Function::new(|records: &Vec<TK>| {
            let mut counts = HashMap::new();
            for record in records {
                let count = counts.entry(record.clone()).or_insert_with(TV::zero);
                *count = *count + TV::one();
            }
            counts
        }),
        input_metric,
        L1Distance::new(),
        StabilityMap::new_fallible(|d_in: &IntDistance| TV::inf_cast(*d_in)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_key() {
        let trans = make_count_by::<String, f64>(VectorDomain::default(), SymmetricDistance)
            .unwrap();
        let data: Vec<String> =
            ["A", "A", "B", "A"].iter().map(|s| s.to_string()).collect();
        let counts = trans.invoke(&data).unwrap();
        assert_eq!(counts["A"], 3.0);
        assert_eq!(counts["B"], 1.0);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn stability_is_the_identity_on_the_distance() {
        let trans = make_count_by::<String, f64>(VectorDomain::default(), SymmetricDistance)
            .unwrap();
        assert_eq!(trans.map(&1).unwrap(), 1.0);
        assert_eq!(trans.map(&3).unwrap(), 3.0);
        assert!(trans.check(&1, &1.0).unwrap());
        assert!(!trans.check(&2, &1.0).unwrap());
    }

    #[test]
    fn integer_counts_also_work() {
        let trans = make_count_by::<String, u64>(VectorDomain::default(), SymmetricDistance)
            .unwrap();
        let data: Vec<String> = ["x", "x"].iter().map(|s| s.to_string()).collect();
        assert_eq!(trans.invoke(&data).unwrap()["x"], 2);
        assert_eq!(trans.map(&2).unwrap(), 2);
    }
}
