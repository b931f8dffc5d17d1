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

//! A differential-privacy computation framework.
//!
//! Measurements transform private data into randomized outputs while carrying
//! a machine-checkable, monotonic bound on the privacy loss incurred. A
//! measurement is built from a domain, a metric bounding input sensitivity
//! and a mechanism constructor; it can then be invoked on data, composed with
//! combinators, or interrogated through its privacy map:
//!
//! ```
//! use differential_privacy::domains::AtomDomain;
//! use differential_privacy::measurements::make_laplace;
//! use differential_privacy::metrics::AbsoluteDistance;
//!
//! # fn main() -> Result<(), differential_privacy::Error> {
//! let measurement = make_laplace(AtomDomain::<f64>::new(), AbsoluteDistance::new(), 10.5)?;
//! let release = measurement.invoke(&100.0)?;
//! assert!(measurement.check(&1.0, &0.096)?);
//! # Ok(())
//! # }
//! ```
//!
//! Rounding policy: privacy maps evaluate with directed float arithmetic that
//! rounds inexact field operations away from the caller's favor (exact
//! results are returned unchanged); `ln` and `exp` use the platform libm at
//! round-to-nearest, within one ulp of the directed bound. Claimed bounds are
//! validated with [`crate::core::Measurement::check`] rather than trusted
//! from floating-point equality.

pub mod calibration;
pub mod combinators;
pub mod core;
pub mod domains;
pub mod error;
pub mod measurements;
pub mod measures;
pub mod metrics;
pub mod samplers;
pub mod traits;
pub mod transformations;

pub use error::{Error, Fallible};
