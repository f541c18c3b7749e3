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

//! Privacy budget allocation across the statistics of a single release.
//!
//! A release of `k` statistics either spends the full budget on each of them
//! or splits it evenly. When the even split falls under
//! [`MIN_EPSILON_PER_QUERY`] the allocator switches to an advanced
//! composition estimate, which hands each query more than the naive share.
//! The requested total is then an accounting figure rather than a hard
//! per-query ceiling.

use log::debug;
use serde::Serialize;

use crate::{checks, noise::Mechanism};

/// Smallest per-query ε handed to a noise mechanism when the budget is split.
pub const MIN_EPSILON_PER_QUERY: f64 = 0.1;

/// Default δ for the Gaussian family and for composition accounting.
pub const DEFAULT_DELTA: f64 = 1e-5;

/// The resolved budget of one release.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PrivacyBudget {
    /// The total ε requested by the caller.
    pub total_epsilon: f64,
    pub delta: f64,
    /// The single mechanism used by every statistic of the release.
    pub mechanism: Mechanism,
    pub num_queries: usize,
    /// Derived by [`allocate`], never supplied by a caller.
    pub epsilon_per_query: f64,
    /// Whether the advanced composition estimate replaced the naive split.
    pub advanced_composition: bool,
}

/// Composition accounting for a release, as reported to the caller.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PrivacyBudgetReport {
    pub epsilon_per_query: f64,
    pub num_queries: usize,
    /// Sequential composition: ε per query × number of queries.
    pub total_epsilon_simple: f64,
    /// Advanced composition: √(2k · ln(1/δ)) × ε per query.
    pub total_epsilon_advanced: f64,
    pub delta: f64,
    pub mechanism: Mechanism,
    pub num_queries_released: usize,
}

/// Returns √(2k · ln(1/δ)), the advanced composition factor for `k` queries.
pub fn composition_factor(num_queries: usize, delta: f64) -> f64 {
    (2.0 * num_queries as f64 * (1.0 / delta).ln()).sqrt()
}

/// Computes the ε handed to the noise mechanism for each of `num_queries` statistics.
pub fn allocate(
    total_epsilon: f64,
    num_queries: usize,
    delta: f64,
    split_budget: bool,
    mechanism: Mechanism,
) -> crate::Result<PrivacyBudget> {
    const LABEL: &str = "allocate";
    checks::check_epsilon(LABEL, total_epsilon)?;
    checks::check_num_queries(LABEL, num_queries)?;
    checks::check_delta_strict(LABEL, delta)?;

    let mut advanced_composition = false;
    let epsilon_per_query = if !split_budget {
        total_epsilon
    } else {
        let naive = total_epsilon / num_queries as f64;
        if naive >= MIN_EPSILON_PER_QUERY {
            naive
        } else {
            advanced_composition = true;
            let factor = composition_factor(num_queries, delta);
            let epsilon = MIN_EPSILON_PER_QUERY.max(total_epsilon / factor);
            debug!(
                "naive split {} is below {}, advanced composition (factor {}) gives {} per query",
                naive, MIN_EPSILON_PER_QUERY, factor, epsilon
            );
            epsilon
        }
    };

    Ok(PrivacyBudget {
        total_epsilon,
        delta,
        mechanism,
        num_queries,
        epsilon_per_query,
        advanced_composition,
    })
}

impl PrivacyBudget {
    pub fn report(&self) -> PrivacyBudgetReport {
        PrivacyBudgetReport {
            epsilon_per_query: self.epsilon_per_query,
            num_queries: self.num_queries,
            total_epsilon_simple: self.epsilon_per_query * self.num_queries as f64,
            total_epsilon_advanced: composition_factor(self.num_queries, self.delta)
                * self.epsilon_per_query,
            delta: self.delta,
            mechanism: self.mechanism,
            num_queries_released: self.num_queries,
        }
    }
}
