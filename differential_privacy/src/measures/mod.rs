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

//! Privacy-loss distance families.

use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::Measure;
use crate::error::Fallible;

macro_rules! parametrized_measure {
    ($($(#[$attr:meta])* $name:ident : $distance:ty),+) => {$(
        $(#[$attr])*
        pub struct $name<Q> {
            _marker: PhantomData<Q>,
        }

        impl<Q> $name<Q> {
            pub fn new() -> Self {
                $name { _marker: PhantomData }
            }
        }

        impl<Q> Default for $name<Q> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<Q> Clone for $name<Q> {
            fn clone(&self) -> Self {
                Self::new()
            }
        }

        impl<Q> PartialEq for $name<Q> {
            fn eq(&self, _other: &Self) -> bool {
                true
            }
        }

        impl<Q> Debug for $name<Q> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), std::any::type_name::<Q>())
            }
        }

        impl<Q: 'static + Send + Sync> Measure for $name<Q> {
            type Distance = $distance;
        }
    )+};
}

parametrized_measure!(
    /// Pure differential privacy: privacy loss is a scalar epsilon bounding
    /// the max-divergence between output distributions.
    MaxDivergence: Q,
    /// Approximate differential privacy as a curve: privacy loss is the
    /// function `delta -> epsilon`, evaluated lazily.
    SmoothedMaxDivergence: SmdCurve<Q>,
    /// Approximate differential privacy at a fixed delta: privacy loss is the
    /// pair `(epsilon, delta)`, compared component-wise.
    FixedSmoothedMaxDivergence: (Q, Q),
    /// Zero-concentrated differential privacy: privacy loss is a scalar rho.
    ZeroConcentratedDivergence: Q
);

/// A lazily evaluated `delta -> epsilon` curve: the distance type of
/// [`SmoothedMaxDivergence`].
///
/// `epsilon` is non-increasing in delta. The curve is a shared immutable
/// closure; re-evaluating it at the same delta yields identical results.
pub struct SmdCurve<Q> {
    curve: Arc<dyn Fn(&Q) -> Fallible<Q> + Send + Sync>,
}

impl<Q> Clone for SmdCurve<Q> {
    fn clone(&self) -> Self {
        SmdCurve { curve: self.curve.clone() }
    }
}

impl<Q> Debug for SmdCurve<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SmdCurve({})", std::any::type_name::<Q>())
    }
}

impl<Q> SmdCurve<Q> {
    pub fn new(curve: impl Fn(&Q) -> Fallible<Q> + Send + Sync + 'static) -> Self {
        SmdCurve { curve: Arc::new(curve) }
    }

    /// The smallest epsilon this curve grants at privacy parameter `delta`.
    pub fn epsilon(&self, delta: &Q) -> Fallible<Q> {
        (self.curve)(delta)
    }
}
