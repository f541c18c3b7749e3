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

//! Canonical decimal formatting of floating point numbers.

use crate::{CanonicalJsonError, Result};

/// Magnitudes below this bound are written with [`SMALL_MAGNITUDE_DECIMALS`]
/// fixed decimals instead of their shortest round-trip digits.
pub const SMALL_MAGNITUDE_BOUND: f64 = 1e-4;

/// Number of decimals kept for magnitudes below [`SMALL_MAGNITUDE_BOUND`].
pub const SMALL_MAGNITUDE_DECIMALS: usize = 15;

/// Formats a finite `f64` as a plain decimal without exponent.
///
/// - Values with a zero fractional part are written as their exact integer
///   value (`6.0` → `6`, `1e20` → `100000000000000000000`).
/// - Values with magnitude below 1e-4 are rounded to 15 decimals, then
///   trailing zeros and a trailing decimal point are stripped
///   (`1e-05` → `0.00001`). A result of negative zero is written as `0`.
/// - All other values are written with their shortest round-trip digits in
///   fixed-point form (`0.1` → `0.1`, `123.456` → `123.456`).
pub fn format_f64(value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(CanonicalJsonError::NonFiniteNumber(value));
    }
    if value == 0.0 {
        return Ok("0".to_string());
    }
    if value.fract() == 0.0 {
        // Fixed precision formatting is exact, so this prints every digit of the integer.
        return Ok(format!("{:.0}", value));
    }
    if value.abs() < SMALL_MAGNITUDE_BOUND {
        let fixed = format!("{:.*}", SMALL_MAGNITUDE_DECIMALS, value);
        let stripped = strip_fraction_zeros(&fixed);
        if stripped == "-0" {
            return Ok("0".to_string());
        }
        return Ok(stripped.to_string());
    }
    Ok(expand_shortest(value))
}

/// Removes trailing zeros of the fractional part and a dangling decimal point.
fn strip_fraction_zeros(fixed: &str) -> &str {
    if !fixed.contains('.') {
        return fixed;
    }
    fixed.trim_end_matches('0').trim_end_matches('.')
}

/// Rewrites the shortest round-trip digits of `value` in positional notation.
fn expand_shortest(value: f64) -> String {
    // `{:e}` yields the shortest digits that round-trip, e.g. "-1.2345e2".
    let scientific = format!("{:e}", value.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i64 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    // Number of digits before the decimal point.
    let point = exponent + 1;
    let mut out = String::with_capacity(digits.len() + 8);
    if value.is_sign_negative() {
        out.push('-');
    }
    if point <= 0 {
        out.push_str("0.");
        out.extend(core::iter::repeat('0').take((-point) as usize));
        out.push_str(digits);
    } else if point as usize >= digits.len() {
        out.push_str(digits);
        out.extend(core::iter::repeat('0').take(point as usize - digits.len()));
    } else {
        let (integer, fraction) = digits.split_at(point as usize);
        out.push_str(integer);
        out.push('.');
        out.push_str(fraction);
    }
    out
}
