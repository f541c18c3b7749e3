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

//! Canonical JSON encoding.
//!
//! Two independent implementations given semantically equal input produce
//! byte-identical output, so a detached signature over the encoding made by
//! one of them can be verified by the other. The encoding is plain JSON with
//! the following normalizations:
//!
//! - object keys are sorted lexicographically at every nesting level;
//! - there is no whitespace between tokens;
//! - floating point values with a zero fractional part are written as
//!   integers;
//! - exponent notation is never written, see [`number::format_f64`].
//!
//! The normalization is explicit and does not depend on the default float
//! formatting of any runtime.

use serde::{ser, Serialize};
use serde_json::{Number, Value};

use crate::finite::FiniteCheckError;

mod finite;
pub mod number;

pub use number::format_f64;

#[derive(thiserror::Error, Debug)]
pub enum CanonicalJsonError {
    #[error("cannot encode non-finite number {0}")]
    NonFiniteNumber(f64),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, CanonicalJsonError>;

/// Serializes `value` and returns its canonical encoding.
///
/// Fails with [`CanonicalJsonError::NonFiniteNumber`] if any float inside
/// `value` is NaN or infinite.
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    finite::check_finite(value).map_err(|err| match err {
        FiniteCheckError::NonFinite(number) => CanonicalJsonError::NonFiniteNumber(number),
        FiniteCheckError::Custom(message) => {
            CanonicalJsonError::Serialization(ser::Error::custom(message))
        }
    })?;
    canonicalize(&serde_json::to_value(value)?)
}

/// Parses JSON text and returns its canonical encoding.
pub fn canonicalize_str(json: &str) -> Result<String> {
    canonicalize(&serde_json::from_str::<Value>(json)?)
}

/// Returns the canonical encoding of a JSON value.
pub fn canonicalize(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(number) => write_number(out, number)?,
        Value::String(string) => write_string(out, string)?,
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_value(out, item)?;
            }
            out.push(']');
        }
        Value::Object(map) => write_entries(out, map.iter())?,
    }
    Ok(())
}

/// Writes an object from `entries` in byte order of their keys, whatever order
/// they arrive in. The order of a `Map` depends on `serde_json` features.
fn write_entries<'a>(
    out: &mut String,
    entries: impl IntoIterator<Item = (&'a String, &'a Value)>,
) -> Result<()> {
    let mut entries: Vec<(&String, &Value)> = entries.into_iter().collect();
    entries.sort_by(|(left, _), (right, _)| left.as_bytes().cmp(right.as_bytes()));

    out.push('{');
    for (index, (key, value)) in entries.into_iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        write_string(out, key)?;
        out.push(':');
        write_value(out, value)?;
    }
    out.push('}');
    Ok(())
}

fn write_number(out: &mut String, number: &Number) -> Result<()> {
    if let Some(integer) = number.as_i64() {
        out.push_str(&integer.to_string());
    } else if let Some(integer) = number.as_u64() {
        out.push_str(&integer.to_string());
    } else if let Some(float) = number.as_f64() {
        out.push_str(&format_f64(float)?);
    }
    Ok(())
}

fn write_string(out: &mut String, string: &str) -> Result<()> {
    // Minimal JSON escaping: quotes, backslashes and control characters.
    out.push_str(&serde_json::to_string(string)?);
    Ok(())
}
