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

//! Error taxonomy for measurement construction, composition and invocation.

use thiserror::Error;

/// Errors reported by the privacy kernel.
///
/// Construction-time validation is preferred wherever a condition is
/// statically knowable; invocation-time failures are reported to the caller,
/// never substituted with a default.
#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A mechanism was configured with a malformed parameter.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Two components with incompatible domains were composed.
    #[error("domain mismatch: {0}")]
    DomainMismatch(String),

    /// Two components with incompatible metrics were composed.
    #[error("metric mismatch: {0}")]
    MetricMismatch(String),

    /// Two components with incompatible measures were composed.
    #[error("measure mismatch: {0}")]
    MeasureMismatch(String),

    /// An invocation argument is not a member of the declared input domain.
    #[error("input is not a member of the input domain: {0}")]
    DomainError(String),

    /// A distance passed to a map or check is outside the map's domain.
    #[error("invalid distance: {0}")]
    InvalidDistance(String),

    /// The calibration search found no satisfying parameter.
    #[error("no parameter in the searched range satisfies the target bound: {0}")]
    SearchUnsatisfiable(String),

    /// A function evaluation failed.
    #[error("function evaluation failed: {0}")]
    FailedFunction(String),

    /// The random number generator could not be constructed.
    #[error("rng failure: {0}")]
    Rng(String),
}

impl From<rand::Error> for Error {
    fn from(e: rand::Error) -> Self {
        Error::Rng(e.to_string())
    }
}

/// The result type used throughout the kernel.
pub type Fallible<T> = Result<T, Error>;
