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

//! Gaussian mechanisms providing (ε, δ)-differential privacy.

use crate::{
    checks,
    noise::{Mechanism, Noise},
    rand::Rand,
};

/// Returns the standard deviation of the classic Gaussian mechanism:
/// σ = sensitivity · √(2 · ln(1.25 / δ)) / ε.
pub fn gaussian_sigma(epsilon: f64, delta: f64, sensitivity: f64) -> f64 {
    sensitivity * (2.0 * (1.25 / delta).ln()).sqrt() / epsilon
}

fn check_args_gaussian(
    label: &str,
    x: f64,
    epsilon: f64,
    delta: f64,
    sensitivity: f64,
) -> crate::Result<()> {
    checks::check_value(label, x)?;
    checks::check_epsilon(label, epsilon)?;
    checks::check_delta_strict(label, delta)?;
    checks::check_sensitivity(label, sensitivity)?;
    checks::check_scale(label, gaussian_sigma(epsilon, delta, sensitivity))
}

/// Noise instance that adds continuous Gaussian noise.
pub struct Gaussian {
    rand: Rand,
    delta: f64,
}

impl Gaussian {
    pub fn new_with_rand(delta: f64, rand: Rand) -> crate::Result<Self> {
        checks::check_delta_strict("Gaussian::new_with_rand", delta)?;
        Ok(Self { rand, delta })
    }
}

impl Noise for Gaussian {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Gaussian
    }

    fn add_noise_f64(&mut self, x: f64, epsilon: f64, sensitivity: f64) -> crate::Result<f64> {
        check_args_gaussian("add_noise_f64 (Gaussian)", x, epsilon, self.delta, sensitivity)?;
        let sigma = gaussian_sigma(epsilon, self.delta, sensitivity);
        Ok(x + self.rand.gaussian(sigma)?)
    }
}

/// Noise instance that adds integer-valued noise to an integer-rounded input.
///
/// This is an approximation of the discrete Gaussian: a continuous Gaussian
/// sample with the same σ is rounded to the nearest integer. It is not an
/// exact rejection sampler, so callers must not rely on the tail bounds of
/// the exact discrete Gaussian mechanism.
pub struct DiscreteGaussian {
    rand: Rand,
    delta: f64,
}

impl DiscreteGaussian {
    pub fn new_with_rand(delta: f64, rand: Rand) -> crate::Result<Self> {
        checks::check_delta_strict("DiscreteGaussian::new_with_rand", delta)?;
        Ok(Self { rand, delta })
    }

    /// Rounds `x` to the nearest integer (ties to even) and adds rounded Gaussian noise.
    pub fn add_noise_i64(&mut self, x: f64, epsilon: f64, sensitivity: f64) -> crate::Result<i64> {
        let label = "add_noise_i64 (DiscreteGaussian)";
        check_args_gaussian(label, x, epsilon, self.delta, sensitivity)?;
        let sigma = gaussian_sigma(epsilon, self.delta, sensitivity);
        let continuous_noise = self.rand.gaussian(sigma)?;
        let value = x.round_ties_even() as i64;
        let noise = continuous_noise.round_ties_even() as i64;
        Ok(value.saturating_add(noise))
    }
}

impl Noise for DiscreteGaussian {
    fn mechanism(&self) -> Mechanism {
        Mechanism::DiscreteGaussian
    }

    fn add_noise_f64(&mut self, x: f64, epsilon: f64, sensitivity: f64) -> crate::Result<f64> {
        Ok(self.add_noise_i64(x, epsilon, sensitivity)? as f64)
    }
}
