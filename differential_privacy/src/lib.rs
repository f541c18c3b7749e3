//
// Copyright 2026 The Project Oak Authors
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

//! Differential privacy primitives used when releasing aggregate statistics.
//!
//! The crate provides noise mechanisms (Laplace, Gaussian and an approximate
//! discrete Gaussian) and the allocator that splits a total privacy budget
//! across the statistics of a single release.

pub mod budget;
pub mod checks;
pub mod noise;
pub mod rand;

pub use budget::{
    allocate, PrivacyBudget, PrivacyBudgetReport, DEFAULT_DELTA, MIN_EPSILON_PER_QUERY,
};
pub use noise::{Mechanism, Noise};

/// Errors returned by the differential privacy primitives.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An epsilon, delta, sensitivity or mechanism argument is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The entropy source could not be initialised.
    #[error("random number generator failure: {0}")]
    Rand(#[from] ::rand::Error),
}

impl Error {
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
