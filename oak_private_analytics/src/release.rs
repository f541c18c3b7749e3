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

//! Differentially private release of a [`MetricsBundle`].

use std::collections::BTreeMap;

use differential_privacy::{allocate, rand::Rand, Mechanism, Noise, PrivacyBudget, DEFAULT_DELTA};
use log::{debug, info};
use serde::Serialize;

use crate::{
    metrics::{KeyedMetric, MetricsBundle, ScalarMetric, SensitivityRule},
    Result,
};

/// Total ε of a release when the caller does not pick one.
pub const DEFAULT_EPSILON: f64 = 2.0;

/// Parameters of one release.
#[derive(Clone, Debug, PartialEq)]
pub struct ReleaseConfig {
    /// Total privacy budget, or the per-statistic budget if `split_budget` is false.
    pub epsilon: f64,
    pub delta: f64,
    pub split_budget: bool,
    /// Explicit mechanism; Laplace when absent.
    pub mechanism: Option<Mechanism>,
    /// Attach `_num_queries`, `_epsilon_per_query` and `_mechanism` to the released metrics.
    pub include_metadata: bool,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            delta: DEFAULT_DELTA,
            split_budget: true,
            mechanism: None,
            include_metadata: false,
        }
    }
}

impl ReleaseConfig {
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_split_budget(mut self, split_budget: bool) -> Self {
        self.split_budget = split_budget;
        self
    }

    pub fn with_mechanism(mut self, mechanism: Option<Mechanism>) -> Self {
        self.mechanism = mechanism;
        self
    }

    pub fn with_metadata(mut self, include_metadata: bool) -> Self {
        self.include_metadata = include_metadata;
        self
    }
}

/// Composition-tracking fields attached to released metrics on request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReleaseMetadata {
    #[serde(rename = "_num_queries")]
    pub num_queries: usize,
    #[serde(rename = "_epsilon_per_query")]
    pub epsilon_per_query: f64,
    #[serde(rename = "_mechanism")]
    pub mechanism: Mechanism,
}

/// Noised and clamped metrics together with the budget that produced them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReleasedBundle {
    #[serde(flatten)]
    pub metrics: MetricsBundle,
    #[serde(flatten)]
    pub metadata: Option<ReleaseMetadata>,
    #[serde(skip)]
    pub privacy_budget: PrivacyBudget,
}

/// Applies noise to every field of a bundle, with a single mechanism and a
/// single per-statistic ε for the whole release.
pub struct MetricsReleaser {
    config: ReleaseConfig,
}

impl MetricsReleaser {
    pub fn new(config: ReleaseConfig) -> Self {
        Self { config }
    }

    /// Releases `bundle`, drawing noise from `rand`.
    pub fn release(&self, bundle: &MetricsBundle, rand: Rand) -> Result<ReleasedBundle> {
        let record_count = bundle.record_count();
        let num_queries = bundle.count_queries();
        let mechanism = self.config.mechanism.unwrap_or_default();
        let budget = allocate(
            self.config.epsilon,
            num_queries,
            self.config.delta,
            self.config.split_budget,
            mechanism,
        )?;
        let mut noise = mechanism.build(self.config.delta, rand)?;
        info!(
            "releasing {} statistics over {} records with {} at epsilon {} per query",
            num_queries, record_count, mechanism, budget.epsilon_per_query
        );

        let mut released = MetricsBundle {
            total_customers: bundle.total_customers,
            ..Default::default()
        };
        for metric in ScalarMetric::ALL {
            if let Some(value) = bundle.scalar(metric) {
                let noisy = release_value(
                    noise.as_mut(),
                    metric.sensitivity_rule(),
                    value,
                    record_count,
                    budget.epsilon_per_query,
                )?;
                debug!("released {}", metric.name());
                released.set_scalar(metric, Some(noisy));
            }
        }
        for metric in KeyedMetric::ALL {
            if let Some(values) = bundle.keyed(metric) {
                let rule = metric.sensitivity_rule();
                let mut noisy_values = BTreeMap::new();
                for (category, value) in values {
                    let noisy = release_value(
                        noise.as_mut(),
                        rule,
                        *value,
                        record_count,
                        budget.epsilon_per_query,
                    )?;
                    noisy_values.insert(category.clone(), noisy);
                }
                debug!("released {} ({} categories)", metric.name(), noisy_values.len());
                released.set_keyed(metric, Some(noisy_values));
            }
        }

        let metadata = self.config.include_metadata.then(|| ReleaseMetadata {
            num_queries: budget.num_queries,
            epsilon_per_query: budget.epsilon_per_query,
            mechanism: budget.mechanism,
        });
        Ok(ReleasedBundle { metrics: released, metadata, privacy_budget: budget })
    }
}

fn release_value(
    noise: &mut dyn Noise,
    rule: SensitivityRule,
    value: f64,
    record_count: u64,
    epsilon: f64,
) -> Result<f64> {
    let sensitivity = rule.kind.sensitivity(record_count);
    let noisy = noise.add_noise_f64(value, epsilon, sensitivity)?;
    Ok(rule.range.clamp(noisy))
}
