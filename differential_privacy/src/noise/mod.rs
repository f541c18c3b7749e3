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

//! Methods to generate and add noise to data.
//!
//! All statistics of one release must be protected by the same [`Mechanism`],
//! since the composition accounting in [`crate::budget`] assumes a single
//! mechanism family.

use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{rand::Rand, Error};

pub mod gaussian_noise;
pub mod laplace_noise;
mod secure_noise_math;

pub use gaussian_noise::{gaussian_sigma, DiscreteGaussian, Gaussian};
pub use laplace_noise::Laplace;

/// Trait definition for primitives that add noise to data to make it differentially private.
pub trait Noise {
    /// The mechanism family implemented by this instance.
    fn mechanism(&self) -> Mechanism;

    /// Adds noise to the specified f64 `x` so that the output is differentially private for a
    /// query with the given `sensitivity` and privacy parameter `epsilon`.
    fn add_noise_f64(&mut self, x: f64, epsilon: f64, sensitivity: f64) -> crate::Result<f64>;
}

/// Supported noise mechanism families.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
    /// Pure ε-DP. Used for one-off analytics releases.
    #[default]
    Laplace,
    /// (ε, δ)-DP. Reserved for iterative releases with many compositions.
    Gaussian,
    /// Rounded continuous Gaussian noise on integer values.
    DiscreteGaussian,
}

impl Mechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mechanism::Laplace => "laplace",
            Mechanism::Gaussian => "gaussian",
            Mechanism::DiscreteGaussian => "discrete_gaussian",
        }
    }

    /// Builds a noise instance of this mechanism drawing entropy from `rand`.
    ///
    /// `delta` is validated and used only by the Gaussian family.
    pub fn build(&self, delta: f64, rand: Rand) -> crate::Result<Box<dyn Noise>> {
        Ok(match self {
            Mechanism::Laplace => Box::new(Laplace::new_with_rand(rand)),
            Mechanism::Gaussian => Box::new(Gaussian::new_with_rand(delta, rand)?),
            Mechanism::DiscreteGaussian => Box::new(DiscreteGaussian::new_with_rand(delta, rand)?),
        })
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mechanism {
    type Err = Error;

    fn from_str(name: &str) -> crate::Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "laplace" => Ok(Mechanism::Laplace),
            "gaussian" => Ok(Mechanism::Gaussian),
            "discrete_gaussian" | "discrete-gaussian" => Ok(Mechanism::DiscreteGaussian),
            _ => Err(Error::invalid_parameter(format!("unrecognized noise mechanism: {:?}", name))),
        }
    }
}
