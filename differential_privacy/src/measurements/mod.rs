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

//! The mechanism catalog: constructors for concrete measurements.
//!
//! Every constructor validates its parameters eagerly and derives its privacy
//! map analytically from them; nothing is estimated empirically. The discrete
//! mechanisms sample with integer-only rejection algorithms rather than by
//! rounding continuous noise, since rounding a float release can leak
//! information the analytic map does not account for.

mod discrete_gaussian;
mod discrete_laplace;
mod gaussian;
mod geometric;
mod laplace;
mod noisy_threshold;
mod randomized_response;

pub use discrete_gaussian::{make_discrete_gaussian, DiscreteGaussianDomain};
pub use discrete_laplace::{make_discrete_laplace, DiscreteLaplaceDomain};
pub use gaussian::{make_gaussian, GaussianDomain};
pub use geometric::{make_discrete_laplace_linear, make_geometric};
pub use laplace::{make_laplace, LaplaceDomain};
pub use noisy_threshold::make_noisy_threshold;
pub use randomized_response::{make_randomized_response, make_randomized_response_bool};
