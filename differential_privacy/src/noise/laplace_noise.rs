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

//! Laplace mechanism.
//!
//! The Laplace noise is based on a geometric sampling mechanism that is robust against
//! unintentional privacy leaks due to artifacts of floating point arithmetic. See
//! https://github.com/google/differential-privacy/blob/main/common_docs/Secure_Noise_Generation.pdf
//! for more information.

use crate::{
    checks,
    noise::{secure_noise_math, Mechanism, Noise},
    rand::Rand,
};

/// The granularity paramter determines the resolution of the numerical noise that is
/// being generated relative to the L_1 sensitivity and privacy parameter epsilon.
/// More precisely, the granularity parameter corresponds to the value 2ᵏ described in
/// https://github.com/google/differential-privacy/blob/main/common_docs/Secure_Noise_Generation.pdf.
/// Larger values result in more fine grained noise, but increase the chance of
/// sampling inaccuracies due to overflows. The probability of an overflow is less
/// than 2⁻¹⁰⁰⁰, if the granularity parameter is set to a value of 2⁴⁰ or less.
///
/// This parameter should be a power of 2.
fn granularity_param() -> f64 {
    2.0_f64.powi(40)
}

/// Noise instance that adds zero-centered Laplace noise with scale `sensitivity / epsilon`.
pub struct Laplace {
    rand: Rand,
}

impl Noise for Laplace {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Laplace
    }

    fn add_noise_f64(&mut self, x: f64, epsilon: f64, sensitivity: f64) -> crate::Result<f64> {
        check_args_laplace("add_noise_f64 (Laplace)", x, epsilon, sensitivity)?;
        Ok(self.add_laplace_f64(x, epsilon, sensitivity))
    }
}

impl Laplace {
    pub fn new_with_rand(rand: Rand) -> Self {
        Self { rand }
    }

    /// Adds Laplace noise scaled to the given `epsilon` and `l_1_sensitivity` to specified f64.
    fn add_laplace_f64(&mut self, x: f64, epsilon: f64, l_1_sensitivity: f64) -> f64 {
        let granularity =
            secure_noise_math::ceil_power_of_two((l_1_sensitivity / epsilon) / granularity_param());
        let sample =
            self.two_sided_geometric(granularity * epsilon / (l_1_sensitivity + granularity));
        secure_noise_math::round_to_multiple_of_power_of_two(x, granularity)
            + (sample as f64) * granularity
    }

    /// Draws a sample from a geometric distribution with parameter p = 1 - e^-λ.
    ///
    /// More precisely, it returns the number of Bernoulli trials until the first success where the
    /// success probability is p = 1 - e^-λ. The returned sample is truncated to the max i64
    /// value.
    ///
    /// Note that to ensure that a truncation happens with probability less than 10⁻⁶, λ must be
    /// greater than 2⁻⁵⁹.
    fn geometric(&mut self, lambda: f64) -> i64 {
        // Return truncated sample in the case that the sample exceeds the max i64.
        if self.rand.uniform() > -1.0 * (-1.0 * lambda * (i64::MAX as f64)).exp_m1() {
            return i64::MAX;
        }

        // Perform a binary search for the sample in the interval from 1 to max i64.
        // Each iteration splits the interval in two and randomly keeps either the
        // left or the right subinterval depending on the respective probability of
        // the sample being contained in them. The search ends once the interval only
        // contains a single sample.
        let mut left = 0; // Exclusive bound.
        let mut right = i64::MAX; // Inclusive bound.

        while left + 1 < right {
            // Compute a midpoint that divides the probability mass of the current interval
            // approximately evenly between the left and right subinterval.
            let mut mid = left
                - ((0.5_f64.ln() + (lambda * ((left - right) as f64)).exp().ln_1p()) / lambda)
                    .floor() as i64;
            // Ensure that mid is contained in the search interval. This is a safeguard to
            // account for potential mathematical inaccuracies due to finite precision arithmetic.
            if mid <= left {
                mid = left + 1
            } else if mid >= right {
                mid = right - 1
            }

            // Probability that the sample is at most mid, i.e.,
            //   q = Pr[X ≤ mid | left < X ≤ right]
            // where X denotes the sample. The value of q should be approximately one half.
            let q = (lambda * ((left - mid) as f64)).exp_m1()
                / (lambda * ((left - right) as f64)).exp_m1();
            if self.rand.uniform() <= q {
                right = mid
            } else {
                left = mid
            }
        }
        right
    }

    // Draws a sample from a geometric distribution that is
    // mirrored at 0. The non-negative part of the distribution's PDF matches
    // the PDF of a geometric distribution of parameter p = 1 - e^-λ that is
    // shifted to the left by 1 and scaled accordingly.
    fn two_sided_geometric(&mut self, lambda: f64) -> i64 {
        let mut sample = 0;
        let mut sign = -1;
        // Keep a sample of 0 only if the sign is positive. Otherwise, the
        // probability of 0 would be twice as high as it should be.
        while sample == 0 && sign == -1 {
            sample = self.geometric(lambda) - 1;
            sign = self.rand.sign() as i64;
        }
        sample * sign
    }
}

fn check_args_laplace(label: &str, x: f64, epsilon: f64, sensitivity: f64) -> crate::Result<()> {
    checks::check_value(label, x)?;
    checks::check_epsilon(label, epsilon)?;
    checks::check_sensitivity(label, sensitivity)?;
    checks::check_scale(label, sensitivity / epsilon)
}
