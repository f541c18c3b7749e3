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

//! Signed attestation of released results.
//!
//! The canonical encoding of a result is signed with the process signing
//! identity, and the signer's address is bound together with a fresh nonce
//! into the report data of a hardware quote. A missing quote does not fail
//! the attestation; it is reported in the record instead.

use std::path::PathBuf;

use anyhow::Context;
use log::{debug, warn};
#[cfg(test)]
use mockall::automock;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    signing::{keccak256, Address, RecoverableSignature, SigningIdentity, ADDRESS_SIZE},
    AnalyticsError, Result,
};

pub const NONCE_SIZE: usize = 32;
pub const REPORT_DATA_SIZE: usize = 64;

/// Number of characters of the canonical message copied into the record.
pub const MESSAGE_PREVIEW_CHARS: usize = 200;

pub const SIGNING_ALGORITHM: &str = "ecdsa";

/// Recorded as the quote error when the attached quote was not produced over
/// the report data of this attestation.
pub const UNBOUND_QUOTE_NOTE: &str = "quote does not bind the signing address and nonce";

/// Source of hardware quotes over caller-chosen report data.
#[cfg_attr(test, automock)]
pub trait QuoteProvider: Send + Sync {
    /// Whether quotes can be requested at all in this environment.
    fn is_available(&self) -> bool;

    /// Returns an opaque quote binding `report_data`.
    fn get_quote(&self, report_data: &[u8; REPORT_DATA_SIZE]) -> anyhow::Result<Vec<u8>>;

    /// Whether the quotes returned by [`QuoteProvider::get_quote`] are
    /// produced over the requested report data.
    fn binds_report_data(&self) -> bool;
}

/// Used outside a trusted execution environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoQuoteProvider;

impl QuoteProvider for NoQuoteProvider {
    fn is_available(&self) -> bool {
        false
    }

    fn get_quote(&self, _report_data: &[u8; REPORT_DATA_SIZE]) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("no quote provider in simulation mode")
    }

    fn binds_report_data(&self) -> bool {
        true
    }
}

/// Serves a quote generated ahead of time and stored in a file.
///
/// The stored quote was produced for whatever report data was supplied when it
/// was generated, so it does not bind the signer of this process. Only meant
/// for development environments.
#[derive(Clone, Debug)]
pub struct FileQuoteProvider {
    path: PathBuf,
}

impl FileQuoteProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QuoteProvider for FileQuoteProvider {
    fn is_available(&self) -> bool {
        self.path.is_file()
    }

    fn get_quote(&self, _report_data: &[u8; REPORT_DATA_SIZE]) -> anyhow::Result<Vec<u8>> {
        std::fs::read(&self.path)
            .with_context(|| format!("couldn't read quote from {}", self.path.display()))
    }

    fn binds_report_data(&self) -> bool {
        false
    }
}

/// Returns the report data binding `address` and `nonce`: the address padded
/// with zeros on the right to 32 bytes, followed by the nonce.
pub fn report_data(address: &Address, nonce: &[u8; NONCE_SIZE]) -> [u8; REPORT_DATA_SIZE] {
    let mut data = [0u8; REPORT_DATA_SIZE];
    data[..ADDRESS_SIZE].copy_from_slice(address.as_bytes());
    data[REPORT_DATA_SIZE - NONCE_SIZE..].copy_from_slice(nonce);
    data
}

pub fn generate_nonce() -> Result<[u8; NONCE_SIZE]> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.try_fill_bytes(&mut nonce).map_err(|err| AnalyticsError::Entropy(err.to_string()))?;
    Ok(nonce)
}

/// Proof that a released result was signed by an identity living inside the
/// attested environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttestationRecord {
    /// Hex-encoded quote, `null` when no quote could be obtained.
    pub intel_quote: Option<String>,
    /// Hex-encoded 32-byte nonce bound in the quote's report data.
    pub nonce: String,
    pub request_nonce: String,
    /// Personal message signature over the canonical result.
    pub signature: RecoverableSignature,
    pub signing_address: Address,
    pub signing_algo: String,
    /// `0x`-prefixed Keccak-256 of the canonical result.
    pub result_hash: String,
    pub message_preview: String,
    /// Why `intel_quote` is missing, or [`UNBOUND_QUOTE_NOTE`] when the
    /// attached quote cannot be checked against `expected_report_data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_error: Option<String>,
}

impl AttestationRecord {
    pub fn nonce_bytes(&self) -> Result<[u8; NONCE_SIZE]> {
        let mut nonce = [0u8; NONCE_SIZE];
        hex::decode_to_slice(&self.nonce, &mut nonce)
            .map_err(|err| AnalyticsError::InvalidParameter(format!("invalid nonce: {err}")))?;
        Ok(nonce)
    }

    /// The report data a quote in this record is expected to bind.
    pub fn expected_report_data(&self) -> Result<[u8; REPORT_DATA_SIZE]> {
        Ok(report_data(&self.signing_address, &self.nonce_bytes()?))
    }
}

/// A bare quote for the signing identity, requested outside of a release.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuoteAttestation {
    pub intel_quote: String,
    pub nonce: String,
    pub signing_address: Address,
}

pub struct SigningAttestor<'a> {
    identity: &'a SigningIdentity,
    quote_provider: &'a dyn QuoteProvider,
}

impl<'a> SigningAttestor<'a> {
    pub fn new(identity: &'a SigningIdentity, quote_provider: &'a dyn QuoteProvider) -> Self {
        Self { identity, quote_provider }
    }

    /// Attests `result` under a fresh nonce.
    pub fn attest<T: Serialize + ?Sized>(&self, result: &T) -> Result<AttestationRecord> {
        self.attest_with_nonce(result, generate_nonce()?)
    }

    pub fn attest_with_nonce<T: Serialize + ?Sized>(
        &self,
        result: &T,
        nonce: [u8; NONCE_SIZE],
    ) -> Result<AttestationRecord> {
        let message = oak_canonical_json::to_canonical_string(result)?;
        let address = self.identity.address();
        let preview: String = message.chars().take(MESSAGE_PREVIEW_CHARS).collect();
        debug!("signing message (first {} chars): {}", MESSAGE_PREVIEW_CHARS, preview);
        debug!("signing address: {}, message length: {}", address, message.len());

        let (intel_quote, quote_error) =
            match self.request_quote(&report_data(&address, &nonce)) {
                Ok(quote) if self.quote_provider.binds_report_data() => {
                    (Some(hex::encode(quote)), None)
                }
                Ok(quote) => {
                    warn!("attaching a stored quote: {}", UNBOUND_QUOTE_NOTE);
                    (Some(hex::encode(quote)), Some(UNBOUND_QUOTE_NOTE.to_string()))
                }
                Err(err) => {
                    warn!("continuing without a quote: {}", err);
                    (None, Some(err.to_string()))
                }
            };

        // Unlike the quote, a signature is mandatory.
        let signature = self.identity.sign_personal_message(message.as_bytes())?;
        let nonce = hex::encode(nonce);
        Ok(AttestationRecord {
            intel_quote,
            request_nonce: nonce.clone(),
            nonce,
            signature,
            signing_address: address,
            signing_algo: SIGNING_ALGORITHM.to_string(),
            result_hash: format!("0x{}", hex::encode(keccak256(message.as_bytes()))),
            message_preview: preview,
            quote_error,
        })
    }

    /// Requests a quote binding the signing address and `nonce`, or a fresh
    /// nonce if none is given. Fails if no quote can be obtained.
    pub fn generate_attestation(
        &self,
        nonce: Option<[u8; NONCE_SIZE]>,
    ) -> Result<QuoteAttestation> {
        let nonce = match nonce {
            Some(nonce) => nonce,
            None => generate_nonce()?,
        };
        let address = self.identity.address();
        let quote = self.request_quote(&report_data(&address, &nonce))?;
        if !self.quote_provider.binds_report_data() {
            warn!("returning a stored quote: {}", UNBOUND_QUOTE_NOTE);
        }
        Ok(QuoteAttestation {
            intel_quote: hex::encode(quote),
            nonce: hex::encode(nonce),
            signing_address: address,
        })
    }

    fn request_quote(&self, report_data: &[u8; REPORT_DATA_SIZE]) -> Result<Vec<u8>> {
        if !self.quote_provider.is_available() {
            return Err(AnalyticsError::QuoteUnavailable("TEE not available".to_string()));
        }
        self.quote_provider
            .get_quote(report_data)
            .map_err(|err| AnalyticsError::QuoteUnavailable(format!("{err:#}")))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use googletest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::signing::recover_signer;

    const NONCE: [u8; NONCE_SIZE] = [0xab; NONCE_SIZE];

    fn available_provider(quote: Vec<u8>) -> MockQuoteProvider {
        let mut provider = MockQuoteProvider::new();
        provider.expect_is_available().return_const(true);
        provider.expect_get_quote().returning(move |_| Ok(quote.clone()));
        provider.expect_binds_report_data().return_const(true);
        provider
    }

    #[test]
    fn report_data_layout() {
        let address = Address::from([0x11; ADDRESS_SIZE]);
        let data = report_data(&address, &NONCE);
        assert_that!(&data[..20], eq(&[0x11u8; 20][..]));
        assert_that!(&data[20..32], eq(&[0x00u8; 12][..]));
        assert_that!(&data[32..], eq(&NONCE[..]));
    }

    #[test]
    fn quote_binds_address_and_nonce() {
        let identity = SigningIdentity::generate();
        let expected = report_data(&identity.address(), &NONCE);
        let mut provider = MockQuoteProvider::new();
        provider.expect_is_available().return_const(true);
        provider
            .expect_get_quote()
            .withf(move |data| *data == expected)
            .times(1)
            .returning(|_| Ok(vec![0xde, 0xad]));
        provider.expect_binds_report_data().return_const(true);

        let record = SigningAttestor::new(&identity, &provider)
            .attest_with_nonce(&json!({"mean_risk": 0.5}), NONCE)
            .unwrap();
        assert_that!(record.intel_quote, some(eq("dead")));
        assert_that!(record.quote_error, none());
        assert_that!(record.expected_report_data().unwrap(), eq(expected));
    }

    #[test]
    fn record_fields() {
        let identity = SigningIdentity::generate();
        let provider = available_provider(vec![1, 2, 3]);
        let result = json!({"b": 2.0, "a": {"d": 1.5, "c": true}});
        let record =
            SigningAttestor::new(&identity, &provider).attest_with_nonce(&result, NONCE).unwrap();

        let message = r#"{"a":{"c":true,"d":1.5},"b":2}"#;
        assert_that!(record.nonce, eq(&hex::encode(NONCE)));
        assert_that!(record.request_nonce, eq(&record.nonce));
        assert_that!(record.signing_address, eq(identity.address()));
        assert_that!(record.signing_algo, eq("ecdsa"));
        assert_that!(record.message_preview, eq(message));
        assert_that!(
            record.result_hash,
            eq(&format!("0x{}", hex::encode(keccak256(message.as_bytes()))))
        );
        assert_that!(
            recover_signer(message.as_bytes(), &record.signature).unwrap(),
            eq(identity.address())
        );
    }

    #[test]
    fn missing_quote_is_not_fatal() {
        let identity = SigningIdentity::generate();
        let mut provider = MockQuoteProvider::new();
        provider.expect_is_available().return_const(true);
        provider.expect_get_quote().returning(|_| Err(anyhow::anyhow!("device busy")));

        let record =
            SigningAttestor::new(&identity, &provider).attest(&json!({"x": 1})).unwrap();
        assert_that!(record.intel_quote, none());
        assert_that!(record.quote_error, some(contains_substring("device busy")));
        assert_that!(
            recover_signer(b"{\"x\":1}", &record.signature).unwrap(),
            eq(identity.address())
        );
    }

    #[test]
    fn unavailable_provider_is_not_called() {
        let identity = SigningIdentity::generate();
        let mut provider = MockQuoteProvider::new();
        provider.expect_is_available().return_const(false);
        provider.expect_get_quote().never();

        let record =
            SigningAttestor::new(&identity, &provider).attest(&json!({"x": 1})).unwrap();
        assert_that!(record.intel_quote, none());
        assert_that!(record.quote_error, some(contains_substring("TEE not available")));
    }

    #[test]
    fn null_quote_is_serialized() {
        let identity = SigningIdentity::generate();
        let record = SigningAttestor::new(&identity, &NoQuoteProvider)
            .attest_with_nonce(&json!({}), NONCE)
            .unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert_that!(value.get("intel_quote"), some(eq(&serde_json::Value::Null)));
        let parsed: AttestationRecord = serde_json::from_value(value).unwrap();
        assert_that!(parsed, eq(&record));
    }

    #[test]
    fn preview_is_truncated() {
        let identity = SigningIdentity::generate();
        let long = "é".repeat(500);
        let record = SigningAttestor::new(&identity, &NoQuoteProvider)
            .attest_with_nonce(&json!({ "text": long }), NONCE)
            .unwrap();
        assert_that!(record.message_preview.chars().count(), eq(MESSAGE_PREVIEW_CHARS));
        assert_that!(record.message_preview, starts_with("{\"text\":\"é"));
    }

    #[test]
    fn standalone_attestation_requires_a_quote() {
        let identity = SigningIdentity::generate();
        let result = SigningAttestor::new(&identity, &NoQuoteProvider).generate_attestation(None);
        assert_that!(matches!(result, Err(AnalyticsError::QuoteUnavailable(_))), eq(true));

        let provider = available_provider(vec![0x42]);
        let attestation = SigningAttestor::new(&identity, &provider)
            .generate_attestation(Some(NONCE))
            .unwrap();
        assert_that!(attestation.intel_quote, eq("42"));
        assert_that!(attestation.nonce, eq(&hex::encode(NONCE)));
        assert_that!(attestation.signing_address, eq(identity.address()));
    }

    #[test]
    fn file_quote_provider_reads_stored_quote() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x01, 0x02, 0x03]).unwrap();
        let provider = FileQuoteProvider::new(file.path());
        assert_that!(provider.is_available(), eq(true));
        assert_that!(provider.get_quote(&[0; REPORT_DATA_SIZE]).unwrap(), eq(&vec![1, 2, 3]));

        let missing = FileQuoteProvider::new(file.path().with_extension("missing"));
        assert_that!(missing.is_available(), eq(false));
        assert_that!(missing.get_quote(&[0; REPORT_DATA_SIZE]).is_err(), eq(true));
    }

    #[test]
    fn stored_quote_is_flagged_as_unbound() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xca, 0xfe]).unwrap();
        let provider = FileQuoteProvider::new(file.path());
        let identity = SigningIdentity::generate();

        let record = SigningAttestor::new(&identity, &provider)
            .attest_with_nonce(&json!({"mean_risk": 0.5}), NONCE)
            .unwrap();
        assert_that!(record.intel_quote, some(eq("cafe")));
        assert_that!(record.quote_error, some(eq(UNBOUND_QUOTE_NOTE)));
        let value = serde_json::to_value(&record).unwrap();
        assert_that!(
            value.get("quote_error"),
            some(eq(&serde_json::Value::from(UNBOUND_QUOTE_NOTE)))
        );
    }

    #[test]
    fn nonces_are_fresh() {
        assert_that!(generate_nonce().unwrap(), not(eq(generate_nonce().unwrap())));
    }
}
