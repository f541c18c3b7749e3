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

//! Checks for differentially private functions.
//!
//! Every check fails with [`Error::InvalidParameter`] rather than clamping the
//! offending value.

use crate::Error;

/// Returns an error if ε is not a finite, strictly positive number.
pub fn check_epsilon(label: &str, epsilon: f64) -> crate::Result<()> {
    if epsilon <= 0.0 || epsilon.is_infinite() || epsilon.is_nan() {
        return Err(Error::invalid_parameter(format!(
            "{}: Epsilon is {}, should be strictly positive (and cannot be infinity or NaN)",
            label, epsilon
        )));
    }
    Ok(())
}

/// Returns an error if δ is not in the open interval (0, 1).
pub fn check_delta_strict(label: &str, delta: f64) -> crate::Result<()> {
    if delta <= 0.0 || delta >= 1.0 || delta.is_nan() {
        return Err(Error::invalid_parameter(format!(
            "{}: Delta is {}, should be in the exclusive interval (0, 1)",
            label, delta
        )));
    }
    Ok(())
}

/// Returns an error if `sensitivity` is nonpositive, +∞ or NaN.
pub fn check_sensitivity(label: &str, sensitivity: f64) -> crate::Result<()> {
    if sensitivity <= 0.0 || sensitivity.is_infinite() || sensitivity.is_nan() {
        return Err(Error::invalid_parameter(format!(
            "{}: Sensitivity is {}, should be strictly positive (and cannot be infinity or NaN)",
            label, sensitivity
        )));
    }
    Ok(())
}

/// Returns an error if the noise `scale` derived from the sensitivity and ε
/// overflowed.
pub fn check_scale(label: &str, scale: f64) -> crate::Result<()> {
    if !scale.is_finite() {
        return Err(Error::invalid_parameter(format!(
            "{}: Noise scale is {}, sensitivity / epsilon must be finite",
            label, scale
        )));
    }
    Ok(())
}

/// Returns an error if `num_queries` is zero.
pub fn check_num_queries(label: &str, num_queries: usize) -> crate::Result<()> {
    if num_queries == 0 {
        return Err(Error::invalid_parameter(format!(
            "{}: Number of queries is 0, should be at least 1",
            label
        )));
    }
    Ok(())
}

/// Returns an error if `value` is NaN or infinite.
pub fn check_value(label: &str, value: f64) -> crate::Result<()> {
    if !value.is_finite() {
        return Err(Error::invalid_parameter(format!(
            "{}: Value is {}, should be a finite number",
            label, value
        )));
    }
    Ok(())
}
