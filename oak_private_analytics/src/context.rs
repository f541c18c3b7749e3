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

//! Process-wide state shared by all requests.

use serde::Serialize;

use crate::{
    attestation::{QuoteAttestation, QuoteProvider, SigningAttestor, NONCE_SIZE},
    release::ReleaseConfig,
    signing::{Address, SigningIdentity},
    Result,
};

/// Value of `processed_at` when the environment does not provide a timestamp.
pub const UNKNOWN_TIMESTAMP: &str = "unknown";

/// Immutable after construction, so requests read it concurrently without
/// locking.
pub struct AnalyticsContext {
    identity: SigningIdentity,
    quote_provider: Box<dyn QuoteProvider>,
    release_defaults: ReleaseConfig,
    processed_at: String,
}

static_assertions::assert_impl_all!(AnalyticsContext: Send, Sync);

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub tee_available: bool,
}

impl AnalyticsContext {
    pub fn new(identity: SigningIdentity, quote_provider: Box<dyn QuoteProvider>) -> Self {
        Self {
            identity,
            quote_provider,
            release_defaults: ReleaseConfig::default(),
            processed_at: UNKNOWN_TIMESTAMP.to_string(),
        }
    }

    /// Configuration applied to requests that don't override it.
    pub fn with_release_defaults(mut self, release_defaults: ReleaseConfig) -> Self {
        self.release_defaults = release_defaults;
        self
    }

    pub fn with_processed_at(mut self, processed_at: impl Into<String>) -> Self {
        self.processed_at = processed_at.into();
        self
    }

    pub fn signing_address(&self) -> Address {
        self.identity.address()
    }

    pub fn release_defaults(&self) -> &ReleaseConfig {
        &self.release_defaults
    }

    pub fn processed_at(&self) -> &str {
        &self.processed_at
    }

    pub fn attestor(&self) -> SigningAttestor<'_> {
        SigningAttestor::new(&self.identity, self.quote_provider.as_ref())
    }

    pub fn health(&self) -> Health {
        Health { status: "healthy", tee_available: self.quote_provider.is_available() }
    }

    /// Returns a quote over the signing address and `nonce`, outside of any
    /// release.
    pub fn generate_attestation(
        &self,
        nonce: Option<[u8; NONCE_SIZE]>,
    ) -> Result<QuoteAttestation> {
        self.attestor().generate_attestation(nonce)
    }
}
