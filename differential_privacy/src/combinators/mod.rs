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

//! Combinators build new measurements and transformations out of existing
//! ones. Composition wraps the upstream objects' shared handles; it never
//! mutates them, and compatibility is checked before anything is built.

use log::debug;

use crate::core::{
    Domain, Measure, Measurement, Metric, PrivacyMap, StabilityMap, Transformation,
};
use crate::error::{Error, Fallible};
use crate::measures::{
    FixedSmoothedMaxDivergence, MaxDivergence, SmdCurve, SmoothedMaxDivergence,
    ZeroConcentratedDivergence,
};
use crate::traits::Float;

/// Makes a measurement `x -> measurement1(transformation0(x))`.
///
/// The transformation's output space must match the measurement's input
/// space; the privacy map of the result is the composition
/// `d_in -> measurement1.privacy_map(transformation0.stability_map(d_in))`.
pub fn make_chain_mt<DI, DX, TO, MI, MX, MO>(
    measurement1: &Measurement<DX, TO, MX, MO>,
    transformation0: &Transformation<DI, DX, MI, MX>,
) -> Fallible<Measurement<DI, TO, MI, MO>>
where
    DI: Domain,
    DX: Domain,
    TO: 'static,
    MI: Metric,
    MX: Metric,
    MO: Measure,
{
    if transformation0.output_domain != measurement1.input_domain {
        return Err(Error::DomainMismatch(format!(
            "the transformation's output domain {:?} must match the measurement's input domain {:?}",
            transformation0.output_domain, measurement1.input_domain
        )));
    }
    if transformation0.output_metric != measurement1.input_metric {
        return Err(Error::MetricMismatch(format!(
            "the transformation's output metric {:?} must match the measurement's input metric {:?}",
            transformation0.output_metric, measurement1.input_metric
        )));
    }

    let stability_map = transformation0.stability_map.clone();
    let privacy_map = measurement1.privacy_map.clone();
    Measurement::new(
        transformation0.input_domain.clone(),
        measurement1.function.compose(&transformation0.function),
        transformation0.input_metric.clone(),
        measurement1.output_measure.clone(),
        PrivacyMap::new_fallible(move |d_in: &MI::Distance| {
            privacy_map.eval(&stability_map.eval(d_in)?)
        }),
    )
}

/// Makes a transformation `x -> transformation1(transformation0(x))`, with
/// the composed stability map.
pub fn make_chain_tt<DI, DX, DO, MI, MX, MO>(
    transformation1: &Transformation<DX, DO, MX, MO>,
    transformation0: &Transformation<DI, DX, MI, MX>,
) -> Fallible<Transformation<DI, DO, MI, MO>>
where
    DI: Domain,
    DX: Domain,
    DO: Domain,
    MI: Metric,
    MX: Metric,
    MO: Metric,
{
    if transformation0.output_domain != transformation1.input_domain {
        return Err(Error::DomainMismatch(format!(
            "the inner transformation's output domain {:?} must match the outer transformation's input domain {:?}",
            transformation0.output_domain, transformation1.input_domain
        )));
    }
    if transformation0.output_metric != transformation1.input_metric {
        return Err(Error::MetricMismatch(format!(
            "the inner transformation's output metric {:?} must match the outer transformation's input metric {:?}",
            transformation0.output_metric, transformation1.input_metric
        )));
    }

    let stability_map0 = transformation0.stability_map.clone();
    let stability_map1 = transformation1.stability_map.clone();
    Transformation::new(
        transformation0.input_domain.clone(),
        transformation1.output_domain.clone(),
        transformation1.function.compose(&transformation0.function),
        transformation0.input_metric.clone(),
        transformation1.output_metric.clone(),
        StabilityMap::new_fallible(move |d_in: &MI::Distance| {
            stability_map1.eval(&stability_map0.eval(d_in)?)
        }),
    )
}

/// Converts a zCDP measurement into an approximate-DP measurement with a
/// curve-valued privacy map.
///
/// For a rho bound, the curve grants `epsilon(delta) = rho +
/// 2*sqrt(rho*ln(1/delta))` for every delta in (0, 1), rounded away from the
/// caller's favor. The randomized function is unchanged.
pub fn make_zcdp_to_approxdp<DI, TO, MI, Q>(
    measurement: &Measurement<DI, TO, MI, ZeroConcentratedDivergence<Q>>,
) -> Fallible<Measurement<DI, TO, MI, SmoothedMaxDivergence<Q>>>
where
    DI: Domain,
    TO: 'static,
    MI: Metric,
    Q: Float,
{
    let privacy_map = measurement.privacy_map.clone();
    Measurement::new(
        measurement.input_domain.clone(),
        measurement.function.clone(),
        measurement.input_metric.clone(),
        SmoothedMaxDivergence::new(),
        PrivacyMap::new_fallible(move |d_in: &MI::Distance| {
            let rho = privacy_map.eval(d_in)?;
            if rho < Q::zero() {
                return Err(Error::InvalidDistance(format!(
                    "rho is {rho:?}, must be non-negative"
                )));
            }
            Ok(SmdCurve::new(move |delta: &Q| {
                if *delta <= Q::zero() || *delta >= Q::one() {
                    return Err(Error::InvalidDistance(format!(
                        "delta is {delta:?}, must be in (0, 1)"
                    )));
                }
                if rho == Q::zero() {
                    return Ok(Q::zero());
                }
                let two = Q::one() + Q::one();
                let ln_inv_delta = Q::one().inf_div(*delta)?.inf_ln()?;
                rho.inf_add(two.inf_mul(rho.inf_mul(ln_inv_delta)?.inf_sqrt()?)?)
            }))
        }),
    )
}

/// Fixes the delta of a curve-valued measurement, yielding privacy-loss
/// distances of the form `(epsilon, delta)`.
pub fn make_fix_delta<DI, TO, MI, Q>(
    measurement: &Measurement<DI, TO, MI, SmoothedMaxDivergence<Q>>,
    delta: Q,
) -> Fallible<Measurement<DI, TO, MI, FixedSmoothedMaxDivergence<Q>>>
where
    DI: Domain,
    TO: 'static,
    MI: Metric,
    Q: Float,
{
    if delta <= Q::zero() || delta >= Q::one() {
        return Err(Error::InvalidParameter(format!(
            "delta is {delta:?}, must be in (0, 1)"
        )));
    }
    let privacy_map = measurement.privacy_map.clone();
    Measurement::new(
        measurement.input_domain.clone(),
        measurement.function.clone(),
        measurement.input_metric.clone(),
        FixedSmoothedMaxDivergence::new(),
        PrivacyMap::new_fallible(move |d_in: &MI::Distance| {
            let curve = privacy_map.eval(d_in)?;
            Ok((curve.epsilon(&delta)?, delta))
        }),
    )
}

/// Measures under which a joint release of independent measurements composes
/// by adding privacy-loss distances.
pub trait BasicCompositionMeasure: Measure {
    fn compose(&self, d_i: Vec<Self::Distance>) -> Fallible<Self::Distance>;
}

impl<Q: Float> BasicCompositionMeasure for MaxDivergence<Q> {
    fn compose(&self, d_i: Vec<Q>) -> Fallible<Q> {
        d_i.into_iter().try_fold(Q::zero(), |sum, d| sum.inf_add(d))
    }
}

impl<Q: Float> BasicCompositionMeasure for ZeroConcentratedDivergence<Q> {
    fn compose(&self, d_i: Vec<Q>) -> Fallible<Q> {
        d_i.into_iter().try_fold(Q::zero(), |sum, d| sum.inf_add(d))
    }
}

impl<Q: Float> BasicCompositionMeasure for FixedSmoothedMaxDivergence<Q> {
    fn compose(&self, d_i: Vec<(Q, Q)>) -> Fallible<(Q, Q)> {
        d_i.into_iter().try_fold((Q::zero(), Q::zero()), |(eps, del), (e, d)| {
            Ok((eps.inf_add(e)?, del.inf_add(d)?))
        })
    }
}

/// Makes a measurement that releases the results of every given measurement
/// jointly, on the same input.
///
/// All measurements must share input domain, input metric and output
/// measure; the privacy map is the conservatively rounded sum of the member
/// maps, which never underestimates the joint loss.
pub fn make_basic_composition<DI, TO, MI, MO>(
    measurements: &[Measurement<DI, TO, MI, MO>],
) -> Fallible<Measurement<DI, Vec<TO>, MI, MO>>
where
    DI: Domain,
    TO: 'static,
    MI: Metric,
    MO: BasicCompositionMeasure,
{
    let first = measurements
        .first()
        .ok_or_else(|| Error::InvalidParameter("compose at least one measurement".into()))?;
    for meas in &measurements[1..] {
        if meas.input_domain != first.input_domain {
            return Err(Error::DomainMismatch(
                "all composed measurements must share an input domain".into(),
            ));
        }
        if meas.input_metric != first.input_metric {
            return Err(Error::MetricMismatch(
                "all composed measurements must share an input metric".into(),
            ));
        }
        if meas.output_measure != first.output_measure {
            return Err(Error::MeasureMismatch(
                "all composed measurements must share an output measure".into(),
            ));
        }
    }
    debug!("composing {} measurements", measurements.len());

    let functions: Vec<_> = measurements.iter().map(|m| m.function.clone()).collect();
    let maps: Vec<_> = measurements.iter().map(|m| m.privacy_map.clone()).collect();
    let output_measure = first.output_measure.clone();
    let measure = output_measure.clone();

    Measurement::new(
        first.input_domain.clone(),
        crate::core::Function::new_fallible(move |arg: &DI::Carrier| {
            functions.iter().map(|f| f.eval(arg)).collect()
        }),
        first.input_metric.clone(),
        output_measure,
        PrivacyMap::new_fallible(move |d_in: &MI::Distance| {
            let distances =
                maps.iter().map(|map| map.eval(d_in)).collect::<Fallible<Vec<_>>>()?;
            measure.compose(distances)
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::AtomDomain;
    use crate::measurements::{make_gaussian, make_laplace};
    use crate::metrics::AbsoluteDistance;

    fn double_each(
        size: Option<usize>,
    ) -> crate::core::Transformation<
        crate::domains::VectorDomain<AtomDomain<f64>>,
        crate::domains::VectorDomain<AtomDomain<f64>>,
        crate::metrics::L1Distance<f64>,
        crate::metrics::L1Distance<f64>,
    > {
        use crate::core::Function;
        use crate::domains::VectorDomain;
        use crate::metrics::L1Distance;
        use crate::traits::Float;
        let mut domain = VectorDomain::new(AtomDomain::<f64>::new());
        if let Some(size) = size {
            domain = domain.with_size(size);
        }
        Transformation::new(
            domain.clone(),
            domain,
            Function::new(|x: &Vec<f64>| x.iter().map(|v| v * 2.0).collect::<Vec<_>>()),
            L1Distance::new(),
            L1Distance::new(),
            StabilityMap::new_fallible(|d_in: &f64| d_in.inf_mul(2.0)),
        )
        .unwrap()
    }

    #[test]
    fn chain_tt_composes_functions_and_stability() {
        let chained = make_chain_tt(&double_each(None), &double_each(None)).unwrap();
        assert_eq!(chained.invoke(&vec![1.0, 2.0]).unwrap(), vec![4.0, 8.0]);
        // Each stage doubles the L1 distance.
        assert_eq!(chained.map(&1.0).unwrap(), 4.0);
    }

    #[test]
    fn chains_reject_structurally_different_domains() {
        assert!(matches!(
            make_chain_tt(&double_each(Some(2)), &double_each(None)),
            Err(Error::DomainMismatch(_))
        ));

        use crate::domains::VectorDomain;
        use crate::metrics::L1Distance;
        let meas = make_laplace(
            VectorDomain::new(AtomDomain::<f64>::new()).with_size(3),
            L1Distance::new(),
            2.0,
        )
        .unwrap();
        assert!(matches!(
            make_chain_mt(&meas, &double_each(None)),
            Err(Error::DomainMismatch(_))
        ));
    }

    #[test]
    fn chain_mt_composes_the_privacy_map() {
        use crate::domains::VectorDomain;
        use crate::metrics::L1Distance;
        let meas = make_laplace(
            VectorDomain::new(AtomDomain::<f64>::new()),
            L1Distance::new(),
            2.0,
        )
        .unwrap();
        let chained = make_chain_mt(&meas, &double_each(None)).unwrap();
        // Doubling the data doubles the sensitivity before the noise.
        assert_eq!(chained.map(&1.0).unwrap(), 1.0);
        assert!(chained.check(&1.0, &1.0).unwrap());
        assert!(!chained.check(&1.0, &0.99).unwrap());
    }

    #[test]
    fn zcdp_conversion_matches_the_formula() {
        let meas =
            make_gaussian(AtomDomain::<f64>::new(), AbsoluteDistance::new(), 4.0).unwrap();
        let curve = make_zcdp_to_approxdp(&meas).unwrap().map(&1.0).unwrap();
        let rho = 1.0f64 / 32.0;
        let delta = 1e-3f64;
        let expected = rho + 2.0 * (rho * (1.0 / delta).ln()).sqrt();
        let actual = curve.epsilon(&delta).unwrap();
        assert!((actual - expected).abs() < 1e-9);
        assert!(curve.epsilon(&0.0).is_err());
        assert!(curve.epsilon(&1.0).is_err());
    }

    #[test]
    fn curve_epsilon_is_non_increasing_in_delta() {
        let meas =
            make_gaussian(AtomDomain::<f64>::new(), AbsoluteDistance::new(), 10.5).unwrap();
        let curve = make_zcdp_to_approxdp(&meas).unwrap().map(&1.0).unwrap();
        let strict = curve.epsilon(&1e-6).unwrap();
        let loose = curve.epsilon(&1e-3).unwrap();
        assert!(strict > loose);
        assert!(strict > 0.4);
    }

    #[test]
    fn fix_delta_produces_a_checkable_pair() {
        let meas =
            make_gaussian(AtomDomain::<f64>::new(), AbsoluteDistance::new(), 1.0).unwrap();
        let fixed = make_fix_delta(&make_zcdp_to_approxdp(&meas).unwrap(), 1e-5).unwrap();
        let d_out = fixed.map(&1.0).unwrap();
        assert_eq!(d_out.1, 1e-5);
        assert!(fixed.check(&1.0, &d_out).unwrap());
        assert!(!fixed.check(&1.0, &(d_out.0 / 2.0, d_out.1)).unwrap());
    }

    #[test]
    fn fix_delta_rejects_invalid_delta() {
        let meas =
            make_gaussian(AtomDomain::<f64>::new(), AbsoluteDistance::new(), 1.0).unwrap();
        let curve_meas = make_zcdp_to_approxdp(&meas).unwrap();
        assert!(make_fix_delta(&curve_meas, 0.0).is_err());
        assert!(make_fix_delta(&curve_meas, 1.0).is_err());
        assert!(make_fix_delta(&curve_meas, -1e-3).is_err());
    }

    #[test]
    fn basic_composition_sums_epsilons() {
        let meas_a =
            make_laplace(AtomDomain::<f64>::new(), AbsoluteDistance::new(), 2.0).unwrap();
        let meas_b =
            make_laplace(AtomDomain::<f64>::new(), AbsoluteDistance::new(), 4.0).unwrap();
        let composed = make_basic_composition(&[meas_a, meas_b]).unwrap();
        // 1/2 + 1/4, exactly.
        assert_eq!(composed.map(&1.0).unwrap(), 0.75);
        let release = composed.invoke(&100.0).unwrap();
        assert_eq!(release.len(), 2);
    }

    #[test]
    fn composition_rejects_mismatched_domains() {
        use crate::domains::VectorDomain;
        use crate::metrics::L1Distance;
        let sized = make_laplace(
            VectorDomain::new(AtomDomain::<f64>::new()).with_size(2),
            L1Distance::new(),
            2.0,
        )
        .unwrap();
        let unsized_ = make_laplace(
            VectorDomain::new(AtomDomain::<f64>::new()),
            L1Distance::new(),
            2.0,
        )
        .unwrap();
        assert!(matches!(
            make_basic_composition(&[sized, unsized_]),
            Err(Error::DomainMismatch(_))
        ));
    }

    #[test]
    fn composition_requires_at_least_one_measurement() {
        let empty: &[crate::core::Measurement<
            AtomDomain<f64>,
            f64,
            AbsoluteDistance<f64>,
            MaxDivergence<f64>,
        >] = &[];
        assert!(make_basic_composition(empty).is_err());
    }
}
