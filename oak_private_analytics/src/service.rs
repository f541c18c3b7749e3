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

//! Request-level pipeline: release, sign and attest.

use differential_privacy::{rand::Rand, Mechanism, PrivacyBudgetReport};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    attestation::AttestationRecord,
    context::AnalyticsContext,
    metrics::MetricsBundle,
    release::MetricsReleaser,
    signing::{keccak256, verify_signature, Address},
    AnalyticsError, Result,
};

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct AnalyticsRequest {
    pub metrics: MetricsBundle,
    /// Total ε for this release; the context default when absent.
    #[serde(default)]
    pub epsilon: Option<f64>,
    /// One of `laplace`, `gaussian` or `discrete_gaussian`.
    #[serde(default)]
    pub mechanism: Option<String>,
    /// Echo the unprotected input in the result. This discloses the exact
    /// metrics and voids the privacy guarantee; only for debugging.
    #[serde(default)]
    pub include_raw_metrics: bool,
}

impl AnalyticsRequest {
    pub fn new(metrics: MetricsBundle) -> Self {
        Self { metrics, ..Default::default() }
    }
}

/// The signed part of a response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalyticsResult {
    pub risk_metrics: MetricsBundle,
    pub privacy_budget: PrivacyBudgetReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_metrics: Option<MetricsBundle>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalyticsResponse {
    pub result: AnalyticsResult,
    pub attestation: AttestationRecord,
    pub processed_at: String,
}

/// Releases the request's metrics under differential privacy and attests the
/// result with the context's signing identity.
pub fn process_analytics(
    context: &AnalyticsContext,
    request: &AnalyticsRequest,
    rand: Rand,
) -> Result<AnalyticsResponse> {
    let mut config = context.release_defaults().clone().with_metadata(false);
    if let Some(epsilon) = request.epsilon {
        config.epsilon = epsilon;
    }
    if let Some(name) = &request.mechanism {
        config.mechanism = Some(name.parse::<Mechanism>()?);
    }

    let released = MetricsReleaser::new(config).release(&request.metrics, rand)?;
    let result = AnalyticsResult {
        risk_metrics: released.metrics,
        privacy_budget: released.privacy_budget.report(),
        raw_metrics: request.include_raw_metrics.then(|| request.metrics.clone()),
    };
    let attestation = context.attestor().attest(&result)?;
    info!(
        "released {} statistics signed by {} (quote {})",
        result.privacy_budget.num_queries_released,
        attestation.signing_address,
        if attestation.intel_quote.is_some() { "attached" } else { "absent" }
    );
    Ok(AnalyticsResponse {
        result,
        attestation,
        processed_at: context.processed_at().to_string(),
    })
}

/// Checks a serialized [`AnalyticsResponse`]: the result hash and the
/// signature must both match the canonical encoding of `result`.
///
/// Returns the address of the signer. Whether that address is bound to a
/// trusted environment is decided by verifying the quote, which is out of
/// scope here.
pub fn verify_response(response: &Value) -> Result<Address> {
    let result = response
        .get("result")
        .ok_or_else(|| AnalyticsError::InvalidParameter("response has no result".to_string()))?;
    let attestation: AttestationRecord = response
        .get("attestation")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|err| AnalyticsError::InvalidParameter(format!("invalid attestation: {err}")))?
        .ok_or_else(|| {
            AnalyticsError::InvalidParameter("response has no attestation".to_string())
        })?;

    let message = oak_canonical_json::canonicalize(result)?;
    let hash = format!("0x{}", hex::encode(keccak256(message.as_bytes())));
    if !hash.eq_ignore_ascii_case(&attestation.result_hash) {
        return Err(AnalyticsError::InvalidSignature(format!(
            "result hash mismatch: computed {hash}, attested {}",
            attestation.result_hash
        )));
    }
    let address = &attestation.signing_address;
    if !verify_signature(message.as_bytes(), &attestation.signature, address)? {
        return Err(AnalyticsError::InvalidSignature(format!(
            "signature was not produced by {}",
            attestation.signing_address
        )));
    }
    Ok(attestation.signing_address)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use googletest::prelude::*;
    use oak_canonical_json::CanonicalJsonError;

    use super::*;
    use crate::{
        attestation::{MockQuoteProvider, NoQuoteProvider},
        release::ReleaseConfig,
        signing::SigningIdentity,
    };

    fn sample_metrics() -> MetricsBundle {
        MetricsBundle {
            mean_risk: Some(0.42),
            median_risk: Some(0.4),
            high_risk_percentage: Some(25.0),
            low_risk_percentage: Some(50.0),
            medium_risk_percentage: Some(25.0),
            avg_credit_score: Some(702.5),
            risk_by_age_group: Some(BTreeMap::from([
                ("18-30".to_string(), 0.5),
                ("31-50".to_string(), 0.35),
            ])),
            total_customers: 100,
            ..Default::default()
        }
    }

    fn simulated_context() -> AnalyticsContext {
        AnalyticsContext::new(SigningIdentity::generate(), Box::new(NoQuoteProvider))
    }

    #[test]
    fn response_verifies() {
        let context = simulated_context();
        let response =
            process_analytics(&context, &AnalyticsRequest::new(sample_metrics()), Rand::seeded(1))
                .unwrap();
        let value = serde_json::to_value(&response).unwrap();
        assert_that!(verify_response(&value).unwrap(), eq(context.signing_address()));
    }

    #[test]
    fn response_survives_text_round_trip() {
        let context = simulated_context();
        let response =
            process_analytics(&context, &AnalyticsRequest::new(sample_metrics()), Rand::seeded(2))
                .unwrap();
        let text = serde_json::to_string_pretty(&response).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_that!(verify_response(&value).unwrap(), eq(context.signing_address()));
    }

    #[test]
    fn tampered_result_is_rejected() {
        let context = simulated_context();
        let response =
            process_analytics(&context, &AnalyticsRequest::new(sample_metrics()), Rand::seeded(3))
                .unwrap();
        let mut value = serde_json::to_value(&response).unwrap();
        value["result"]["risk_metrics"]["total_customers"] = Value::from(101);
        assert_that!(
            matches!(verify_response(&value), Err(AnalyticsError::InvalidSignature(_))),
            eq(true)
        );
    }

    #[test]
    fn forged_hash_is_rejected() {
        let context = simulated_context();
        let response =
            process_analytics(&context, &AnalyticsRequest::new(sample_metrics()), Rand::seeded(4))
                .unwrap();
        let mut value = serde_json::to_value(&response).unwrap();
        value["result"]["risk_metrics"]["total_customers"] = Value::from(101);
        let message = oak_canonical_json::canonicalize(&value["result"]).unwrap();
        value["attestation"]["result_hash"] =
            Value::from(format!("0x{}", hex::encode(keccak256(message.as_bytes()))));
        assert_that!(
            matches!(verify_response(&value), Err(AnalyticsError::InvalidSignature(_))),
            eq(true)
        );
    }

    #[test]
    fn malformed_response_is_rejected() {
        let missing = serde_json::json!({"attestation": null});
        assert_that!(
            matches!(verify_response(&missing), Err(AnalyticsError::InvalidParameter(_))),
            eq(true)
        );
        let unattested = serde_json::json!({"result": {}, "attestation": {"nonce": "00"}});
        assert_that!(
            matches!(verify_response(&unattested), Err(AnalyticsError::InvalidParameter(_))),
            eq(true)
        );
    }

    #[test]
    fn privacy_budget_is_reported() {
        let response = process_analytics(
            &simulated_context(),
            &AnalyticsRequest::new(sample_metrics()),
            Rand::seeded(5),
        )
        .unwrap();
        let budget = &response.result.privacy_budget;
        // 6 scalars and 2 age groups.
        assert_that!(budget.num_queries, eq(8));
        assert_that!(budget.num_queries_released, eq(8));
        assert_that!(budget.epsilon_per_query, eq(0.25));
        assert_that!(budget.total_epsilon_simple, eq(2.0));
        assert_that!(budget.mechanism, eq(Mechanism::Laplace));
    }

    #[test]
    fn metadata_and_raw_metrics_are_not_released_by_default() {
        let response = process_analytics(
            &simulated_context(),
            &AnalyticsRequest::new(sample_metrics()),
            Rand::seeded(6),
        )
        .unwrap();
        let value = serde_json::to_value(&response).unwrap();
        assert_that!(value["result"].get("raw_metrics").is_none(), eq(true));
        assert_that!(value["result"]["risk_metrics"].get("_num_queries").is_none(), eq(true));
        assert_that!(value["processed_at"].as_str(), some(eq("unknown")));
    }

    #[test]
    fn raw_metrics_on_request() {
        let request = AnalyticsRequest {
            include_raw_metrics: true,
            ..AnalyticsRequest::new(sample_metrics())
        };
        let response =
            process_analytics(&simulated_context(), &request, Rand::seeded(7)).unwrap();
        assert_that!(response.result.raw_metrics, some(eq(&sample_metrics())));
    }

    #[test]
    fn request_overrides() {
        let request = AnalyticsRequest {
            epsilon: Some(8.0),
            mechanism: Some("Gaussian".to_string()),
            ..AnalyticsRequest::new(sample_metrics())
        };
        let response =
            process_analytics(&simulated_context(), &request, Rand::seeded(8)).unwrap();
        assert_that!(response.result.privacy_budget.epsilon_per_query, eq(1.0));
        assert_that!(response.result.privacy_budget.mechanism, eq(Mechanism::Gaussian));
    }

    #[test]
    fn invalid_requests_fail_before_signing() {
        for request in [
            AnalyticsRequest { epsilon: Some(0.0), ..AnalyticsRequest::new(sample_metrics()) },
            AnalyticsRequest {
                mechanism: Some("exponential".to_string()),
                ..AnalyticsRequest::new(sample_metrics())
            },
        ] {
            let mut provider = MockQuoteProvider::new();
            provider.expect_is_available().never();
            provider.expect_get_quote().never();
            let context = AnalyticsContext::new(SigningIdentity::generate(), Box::new(provider));
            let result = process_analytics(&context, &request, Rand::seeded(9));
            assert_that!(matches!(result, Err(AnalyticsError::InvalidParameter(_))), eq(true));
        }
    }

    #[test]
    fn overflowing_budget_totals_are_not_signed() {
        let small =
            MetricsBundle { mean_risk: Some(0.5), total_customers: 100, ..Default::default() };
        let split = AnalyticsRequest { epsilon: Some(1e308), ..AnalyticsRequest::new(small) };
        let unsplit =
            AnalyticsRequest { epsilon: Some(1e308), ..AnalyticsRequest::new(sample_metrics()) };
        for (request, split_budget) in [(split, true), (unsplit, false)] {
            let mut provider = MockQuoteProvider::new();
            provider.expect_is_available().never();
            provider.expect_get_quote().never();
            let context = AnalyticsContext::new(SigningIdentity::generate(), Box::new(provider))
                .with_release_defaults(ReleaseConfig::default().with_split_budget(split_budget));
            let result = process_analytics(&context, &request, Rand::seeded(11));
            assert_that!(
                matches!(
                    result,
                    Err(AnalyticsError::Canonicalization(CanonicalJsonError::NonFiniteNumber(_)))
                ),
                eq(true)
            );
        }
    }

    #[test]
    fn quote_is_attached_when_available() {
        let mut provider = MockQuoteProvider::new();
        provider.expect_is_available().return_const(true);
        provider.expect_get_quote().times(1).returning(|_| Ok(vec![0x04, 0x00]));
        provider.expect_binds_report_data().return_const(true);
        let context = AnalyticsContext::new(SigningIdentity::generate(), Box::new(provider))
            .with_processed_at("2026-10-18T12:00:00Z");
        let response =
            process_analytics(&context, &AnalyticsRequest::new(sample_metrics()), Rand::seeded(10))
                .unwrap();
        assert_that!(response.attestation.intel_quote, some(eq("0400")));
        assert_that!(response.processed_at, eq("2026-10-18T12:00:00Z"));
    }

    #[test]
    fn request_parses_from_json() {
        let request: AnalyticsRequest = serde_json::from_str(
            r#"{"metrics": {"mean_risk": 0.3, "total_customers": 12}, "epsilon": 1.5}"#,
        )
        .unwrap();
        assert_that!(request.epsilon, some(eq(1.5)));
        assert_that!(request.metrics.total_customers, eq(12));
        assert_that!(request.include_raw_metrics, eq(false));
    }
}
