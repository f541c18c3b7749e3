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

//! Privacy-preserving release of aggregate risk metrics.
//!
//! A raw [`metrics::MetricsBundle`] produced by the risk scoring stage is
//! protected with differentially private noise ([`release`]), encoded in a
//! canonical form and signed ([`signing`]), and bound to a hardware quote
//! ([`attestation`]). [`service::process_analytics`] runs the whole pipeline
//! for one request against the process-wide [`context::AnalyticsContext`].

pub mod attestation;
pub mod context;
pub mod metrics;
pub mod release;
pub mod service;
pub mod signing;

use oak_canonical_json::CanonicalJsonError;

#[derive(thiserror::Error, Debug)]
pub enum AnalyticsError {
    /// ε ≤ 0, δ outside (0, 1), an unknown mechanism name or a non-finite metric.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The metrics bundle does not match the known schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The hardware quote could not be obtained. The release itself still completes.
    #[error("attestation quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("signing failed: {0}")]
    SigningFailure(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("canonical encoding failed: {0}")]
    Canonicalization(#[from] CanonicalJsonError),

    #[error("entropy source failure: {0}")]
    Entropy(String),
}

impl From<differential_privacy::Error> for AnalyticsError {
    fn from(error: differential_privacy::Error) -> Self {
        match error {
            differential_privacy::Error::InvalidParameter(message) => {
                AnalyticsError::InvalidParameter(message)
            }
            differential_privacy::Error::Rand(error) => AnalyticsError::Entropy(error.to_string()),
        }
    }
}

pub type Result<T> = core::result::Result<T, AnalyticsError>;
