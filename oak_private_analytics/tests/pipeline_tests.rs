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

use std::collections::BTreeMap;

use differential_privacy::{rand::Rand, Mechanism, DEFAULT_DELTA, MIN_EPSILON_PER_QUERY};
use googletest::prelude::*;
use oak_private_analytics::{
    attestation::NoQuoteProvider,
    context::AnalyticsContext,
    metrics::{KeyedMetric, MetricsBundle, ScalarMetric},
    release::{MetricsReleaser, ReleaseConfig},
    service::{process_analytics, verify_response, AnalyticsRequest},
    signing::{recover_signer, SigningIdentity},
};
use proptest::prelude::*;

fn testdata_metrics() -> MetricsBundle {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/metrics.json");
    MetricsBundle::from_json(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn single_mean_scenario() {
    let bundle = MetricsBundle { mean_risk: Some(0.5), total_customers: 100, ..Default::default() };
    let releaser = MetricsReleaser::new(ReleaseConfig::default());

    let samples: Vec<f64> = (0..2_000)
        .map(|seed| releaser.release(&bundle, Rand::seeded(seed)).unwrap())
        .map(|released| released.metrics.mean_risk.unwrap())
        .collect();
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let mean_abs_deviation =
        samples.iter().map(|sample| (sample - 0.5).abs()).sum::<f64>() / samples.len() as f64;

    // Laplace(0, b) with b = 0.01 / 2.0 has E|X| = b.
    assert_that!(mean, near(0.5, 0.001));
    assert_that!(mean_abs_deviation, near(0.005, 0.0005));
}

#[test]
fn twenty_queries_scenario() {
    let category = |prefix: &str, count: usize| -> BTreeMap<String, f64> {
        (0..count).map(|i| (format!("{prefix}{i}"), 0.5)).collect()
    };
    let mut bundle = MetricsBundle { total_customers: 1_000, ..Default::default() };
    for metric in ScalarMetric::ALL {
        bundle.set_scalar(metric, Some(0.5));
    }
    bundle.set_keyed(KeyedMetric::RiskByAgeGroup, Some(category("age", 6)));
    bundle.set_keyed(KeyedMetric::RiskByIncomeBracket, Some(category("income", 6)));
    assert_that!(bundle.count_queries(), eq(20));

    let released = MetricsReleaser::new(ReleaseConfig::default().with_epsilon(1.0))
        .release(&bundle, Rand::seeded(20))
        .unwrap();
    let budget = released.privacy_budget;
    let factor = (2.0 * 20.0 * (1.0 / DEFAULT_DELTA).ln()).sqrt();
    let expected = MIN_EPSILON_PER_QUERY.max(1.0 / factor);
    assert_that!(budget.advanced_composition, eq(true));
    assert_that!(budget.epsilon_per_query, eq(expected));
    assert_that!(budget.epsilon_per_query, eq(MIN_EPSILON_PER_QUERY));
}

#[test]
fn full_bundle_release_is_attested() {
    let context = AnalyticsContext::new(SigningIdentity::generate(), Box::new(NoQuoteProvider))
        .with_processed_at("2026-10-18T09:30:00Z");
    let response =
        process_analytics(&context, &AnalyticsRequest::new(testdata_metrics()), Rand::seeded(1))
            .unwrap();

    assert_that!(response.result.privacy_budget.num_queries, eq(22));
    assert_that!(response.result.risk_metrics.total_customers, eq(200));
    assert_that!(response.attestation.intel_quote, none());
    assert_that!(response.attestation.quote_error, some(contains_substring("TEE not available")));

    let text = serde_json::to_string(&response).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_that!(verify_response(&value).unwrap(), eq(context.signing_address()));
}

#[test]
fn mutated_message_recovers_a_different_signer() {
    let context = AnalyticsContext::new(SigningIdentity::generate(), Box::new(NoQuoteProvider));
    let response =
        process_analytics(&context, &AnalyticsRequest::new(testdata_metrics()), Rand::seeded(2))
            .unwrap();
    let result = serde_json::to_value(&response.result).unwrap();
    let message = oak_canonical_json::canonicalize(&result).unwrap().into_bytes();
    let signature = response.attestation.signature;
    assert_that!(recover_signer(&message, &signature).unwrap(), eq(context.signing_address()));

    for i in (0..message.len()).step_by(7) {
        let mut mutated = message.clone();
        mutated[i] = mutated[i].wrapping_add(1);
        if let Ok(address) = recover_signer(&mutated, &signature) {
            assert_that!(address, not(eq(context.signing_address())));
        }
    }
}

#[test]
fn unknown_fields_are_a_schema_mismatch() {
    let error = MetricsBundle::from_json(r#"{"mean_risk": 0.5, "customer_ids": [1, 2]}"#)
        .unwrap_err()
        .to_string();
    assert_that!(error, contains_substring("schema mismatch"));
}

fn bundle_strategy() -> impl Strategy<Value = MetricsBundle> {
    (
        -10.0_f64..10.0,
        -500.0_f64..500.0,
        -500.0_f64..500.0,
        0.0_f64..2_000.0,
        proptest::collection::btree_map("[a-z]{1,6}", -5.0_f64..5.0, 0..4),
        0_u64..10_000,
    )
        .prop_map(|(risk, high, low, credit, by_age, total_customers)| MetricsBundle {
            mean_risk: Some(risk),
            median_risk: Some(risk / 2.0),
            high_risk_percentage: Some(high),
            low_risk_percentage: Some(low),
            avg_credit_score: Some(credit),
            risk_by_age_group: Some(by_age),
            total_customers,
            ..Default::default()
        })
}

fn mechanism_strategy() -> impl Strategy<Value = Mechanism> {
    prop_oneof![
        Just(Mechanism::Laplace),
        Just(Mechanism::Gaussian),
        Just(Mechanism::DiscreteGaussian),
    ]
}

proptest! {
    #[test]
    fn released_values_stay_in_range(
        bundle in bundle_strategy(),
        mechanism in mechanism_strategy(),
        epsilon in 0.01_f64..10.0,
        seed: u64,
    ) {
        let config = ReleaseConfig::default().with_epsilon(epsilon).with_mechanism(Some(mechanism));
        let released = MetricsReleaser::new(config).release(&bundle, Rand::seeded(seed)).unwrap();
        let metrics = released.metrics;

        let mean = metrics.mean_risk.unwrap();
        prop_assert!((0.0..=1.0).contains(&mean));
        let median = metrics.median_risk.unwrap();
        prop_assert!((0.0..=1.0).contains(&median));
        let percentages = [metrics.high_risk_percentage, metrics.low_risk_percentage];
        for percentage in percentages.into_iter().flatten() {
            prop_assert!((0.0..=100.0).contains(&percentage));
        }
        let credit = metrics.avg_credit_score.unwrap();
        prop_assert!((300.0..=850.0).contains(&credit));
        for value in metrics.risk_by_age_group.unwrap().values() {
            prop_assert!((0.0..=1.0).contains(value));
        }
        prop_assert_eq!(metrics.total_customers, bundle.total_customers);
    }
}
