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

//! The measurement/transformation abstraction.
//!
//! A [`Transformation`] is a deterministic mapping between domains paired with
//! a stability map; a [`Measurement`] is a randomized mapping paired with a
//! privacy map expressed in an output measure. Both own their functions and
//! maps behind shared immutable handles: composition wraps, never mutates.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{Error, Fallible};
use crate::traits::ProductOrd;

/// A set of legal values for data at one point in a pipeline.
///
/// Two domains are compatible only if structurally equal.
pub trait Domain: 'static + Clone + PartialEq + Debug + Send + Sync {
    /// The type of values in the domain.
    type Carrier: 'static;
    /// Tests whether `val` is a member of the domain's value set.
    fn member(&self, val: &Self::Carrier) -> Fallible<bool>;
}

/// A family of distances between two values of a domain, used to bound input
/// sensitivity. Carries only the numeric type of distances.
pub trait Metric: 'static + Default + Clone + PartialEq + Debug + Send + Sync {
    type Distance: 'static;
}

/// A family of distances between output distributions: the privacy-loss
/// vocabulary a measurement's guarantee is expressed in.
pub trait Measure: 'static + Default + Clone + PartialEq + Debug + Send + Sync {
    type Distance: 'static;
}

/// A shared, immutable closure from `&TI` to `TO`.
pub struct Function<TI, TO> {
    function: Arc<dyn Fn(&TI) -> Fallible<TO> + Send + Sync>,
}

impl<TI, TO> Clone for Function<TI, TO> {
    fn clone(&self) -> Self {
        Function { function: self.function.clone() }
    }
}

impl<TI, TO> Function<TI, TO> {
    pub fn new(function: impl Fn(&TI) -> TO + Send + Sync + 'static) -> Self {
        Self::new_fallible(move |arg| Ok(function(arg)))
    }

    pub fn new_fallible(function: impl Fn(&TI) -> Fallible<TO> + Send + Sync + 'static) -> Self {
        Function { function: Arc::new(function) }
    }

    pub fn eval(&self, arg: &TI) -> Fallible<TO> {
        (self.function)(arg)
    }
}

impl<TI: 'static, TO: 'static> Function<TI, TO> {
    /// `self` after `inner`: evaluates `inner` first and feeds its output in.
    pub fn compose<TX: 'static>(&self, inner: &Function<TX, TI>) -> Function<TX, TO> {
        let outer = self.function.clone();
        let inner = inner.function.clone();
        Function::new_fallible(move |arg| outer(&inner(arg)?))
    }
}

/// A monotonic non-decreasing map from an input-metric distance bound to an
/// output-measure privacy-loss bound, evaluated lazily.
pub struct PrivacyMap<MI: Metric, MO: Measure> {
    map: Arc<dyn Fn(&MI::Distance) -> Fallible<MO::Distance> + Send + Sync>,
}

impl<MI: Metric, MO: Measure> Clone for PrivacyMap<MI, MO> {
    fn clone(&self) -> Self {
        PrivacyMap { map: self.map.clone() }
    }
}

impl<MI: Metric, MO: Measure> PrivacyMap<MI, MO> {
    pub fn new(map: impl Fn(&MI::Distance) -> MO::Distance + Send + Sync + 'static) -> Self {
        Self::new_fallible(move |d_in| Ok(map(d_in)))
    }

    pub fn new_fallible(
        map: impl Fn(&MI::Distance) -> Fallible<MO::Distance> + Send + Sync + 'static,
    ) -> Self {
        PrivacyMap { map: Arc::new(map) }
    }

    pub fn eval(&self, d_in: &MI::Distance) -> Fallible<MO::Distance> {
        (self.map)(d_in)
    }
}

/// A monotonic non-decreasing map bounding how output-metric distance grows
/// relative to input-metric distance under a transformation.
pub struct StabilityMap<MI: Metric, MO: Metric> {
    map: Arc<dyn Fn(&MI::Distance) -> Fallible<MO::Distance> + Send + Sync>,
}

impl<MI: Metric, MO: Metric> Clone for StabilityMap<MI, MO> {
    fn clone(&self) -> Self {
        StabilityMap { map: self.map.clone() }
    }
}

impl<MI: Metric, MO: Metric> StabilityMap<MI, MO> {
    pub fn new(map: impl Fn(&MI::Distance) -> MO::Distance + Send + Sync + 'static) -> Self {
        Self::new_fallible(move |d_in| Ok(map(d_in)))
    }

    pub fn new_fallible(
        map: impl Fn(&MI::Distance) -> Fallible<MO::Distance> + Send + Sync + 'static,
    ) -> Self {
        StabilityMap { map: Arc::new(map) }
    }

    pub fn eval(&self, d_in: &MI::Distance) -> Fallible<MO::Distance> {
        (self.map)(d_in)
    }
}

/// A randomized mapping from an input domain into an output type, paired with
/// a privacy map: the unit of release.
///
/// Invariant: for any two inputs at input-metric distance at most `d_in`, the
/// privacy-loss distance between the two output distributions, under the
/// output measure, is at most `privacy_map(d_in)`.
pub struct Measurement<DI: Domain, TO, MI: Metric, MO: Measure> {
    pub input_domain: DI,
    pub function: Function<DI::Carrier, TO>,
    pub input_metric: MI,
    pub output_measure: MO,
    pub privacy_map: PrivacyMap<MI, MO>,
}

impl<DI: Domain, TO, MI: Metric, MO: Measure> Clone for Measurement<DI, TO, MI, MO> {
    fn clone(&self) -> Self {
        Measurement {
            input_domain: self.input_domain.clone(),
            function: self.function.clone(),
            input_metric: self.input_metric.clone(),
            output_measure: self.output_measure.clone(),
            privacy_map: self.privacy_map.clone(),
        }
    }
}

impl<DI: Domain, TO, MI: Metric, MO: Measure> Measurement<DI, TO, MI, MO> {
    pub fn new(
        input_domain: DI,
        function: Function<DI::Carrier, TO>,
        input_metric: MI,
        output_measure: MO,
        privacy_map: PrivacyMap<MI, MO>,
    ) -> Fallible<Self> {
        Ok(Measurement { input_domain, function, input_metric, output_measure, privacy_map })
    }

    /// Evaluates the measurement on `arg`, drawing fresh randomness.
    pub fn invoke(&self, arg: &DI::Carrier) -> Fallible<TO> {
        if !self.input_domain.member(arg)? {
            return Err(Error::DomainError(format!(
                "value is not a member of {:?}",
                self.input_domain
            )));
        }
        self.function.eval(arg)
    }

    /// Evaluates the privacy map at the input-distance bound `d_in`.
    pub fn map(&self, d_in: &MI::Distance) -> Fallible<MO::Distance> {
        self.privacy_map.eval(d_in)
    }
}

impl<DI: Domain, TO, MI: Metric, MO: Measure> Measurement<DI, TO, MI, MO>
where
    MO::Distance: ProductOrd,
{
    /// Is the claimed privacy bound `d_out` valid at input distance `d_in`?
    ///
    /// True iff `map(d_in) <= d_out` under the component-wise order of the
    /// measure's distance type.
    pub fn check(&self, d_in: &MI::Distance, d_out: &MO::Distance) -> Fallible<bool> {
        d_out.product_ge(&self.map(d_in)?)
    }
}

/// A deterministic mapping between domains paired with a stability map; no
/// randomness.
///
/// Invariant: `function` maps members of the input domain to members of the
/// output domain, and `stability_map` soundly bounds the growth of
/// output-metric distance relative to input-metric distance.
pub struct Transformation<DI: Domain, DO: Domain, MI: Metric, MO: Metric> {
    pub input_domain: DI,
    pub output_domain: DO,
    pub function: Function<DI::Carrier, DO::Carrier>,
    pub input_metric: MI,
    pub output_metric: MO,
    pub stability_map: StabilityMap<MI, MO>,
}

impl<DI: Domain, DO: Domain, MI: Metric, MO: Metric> Clone for Transformation<DI, DO, MI, MO> {
    fn clone(&self) -> Self {
        Transformation {
            input_domain: self.input_domain.clone(),
            output_domain: self.output_domain.clone(),
            function: self.function.clone(),
            input_metric: self.input_metric.clone(),
            output_metric: self.output_metric.clone(),
            stability_map: self.stability_map.clone(),
        }
    }
}

impl<DI: Domain, DO: Domain, MI: Metric, MO: Metric> Transformation<DI, DO, MI, MO> {
    pub fn new(
        input_domain: DI,
        output_domain: DO,
        function: Function<DI::Carrier, DO::Carrier>,
        input_metric: MI,
        output_metric: MO,
        stability_map: StabilityMap<MI, MO>,
    ) -> Fallible<Self> {
        Ok(Transformation {
            input_domain,
            output_domain,
            function,
            input_metric,
            output_metric,
            stability_map,
        })
    }

    pub fn invoke(&self, arg: &DI::Carrier) -> Fallible<DO::Carrier> {
        if !self.input_domain.member(arg)? {
            return Err(Error::DomainError(format!(
                "value is not a member of {:?}",
                self.input_domain
            )));
        }
        self.function.eval(arg)
    }

    pub fn map(&self, d_in: &MI::Distance) -> Fallible<MO::Distance> {
        self.stability_map.eval(d_in)
    }
}

impl<DI: Domain, DO: Domain, MI: Metric, MO: Metric> Transformation<DI, DO, MI, MO>
where
    MO::Distance: ProductOrd,
{
    pub fn check(&self, d_in: &MI::Distance, d_out: &MO::Distance) -> Fallible<bool> {
        d_out.product_ge(&self.map(d_in)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::AtomDomain;
    use crate::measures::MaxDivergence;
    use crate::metrics::AbsoluteDistance;

    fn identity_measurement(
    ) -> Measurement<AtomDomain<f64>, f64, AbsoluteDistance<f64>, MaxDivergence<f64>> {
        Measurement::new(
            AtomDomain::new(),
            Function::new(|x: &f64| *x),
            AbsoluteDistance::default(),
            MaxDivergence::default(),
            PrivacyMap::new(|d_in: &f64| *d_in),
        )
        .unwrap()
    }

    #[test]
    fn invoke_rejects_non_members() {
        let meas = identity_measurement();
        assert_eq!(meas.invoke(&1.0).unwrap(), 1.0);
        assert!(matches!(meas.invoke(&f64::NAN), Err(Error::DomainError(_))));
    }

    #[test]
    fn map_is_idempotent() {
        let meas = identity_measurement();
        assert_eq!(meas.map(&2.0).unwrap(), meas.map(&2.0).unwrap());
    }

    #[test]
    fn check_compares_against_the_map() {
        let meas = identity_measurement();
        assert!(meas.check(&1.0, &1.0).unwrap());
        assert!(meas.check(&1.0, &2.0).unwrap());
        assert!(!meas.check(&1.0, &0.5).unwrap());
    }
}
