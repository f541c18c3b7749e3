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

//! The fixed schema of released risk metrics and its sensitivity table.
//!
//! Every releasable field is a variant of [`ScalarMetric`] or
//! [`KeyedMetric`]; the sensitivity rule of each variant is an exhaustive
//! `match`, so a field without a rule cannot compile. Unknown fields in
//! serialized bundles are rejected when parsing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AnalyticsError, Result};

/// Raw aggregate metrics produced by the risk scoring stage.
///
/// `total_customers` is the record count. It is released unmodified, so the
/// exact count is disclosed; noise is never added to it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_risk: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median_risk: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_risk_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_risk_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium_risk_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_risk: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_credit_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_default_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_by_age_group: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_by_income_bracket: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_by_employment_status: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_score_distribution: Option<BTreeMap<String, f64>>,

    #[serde(default)]
    pub total_customers: u64,
}

/// Metrics holding a single number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarMetric {
    MeanRisk,
    MedianRisk,
    HighRiskPercentage,
    LowRiskPercentage,
    MediumRiskPercentage,
    StdRisk,
    AvgCreditScore,
    EstimatedDefaultRate,
}

/// Metrics holding a number per category label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyedMetric {
    RiskByAgeGroup,
    RiskByIncomeBracket,
    RiskByEmploymentStatus,
    CreditScoreDistribution,
}

/// How the contribution of one record bounds the change of a statistic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SensitivityKind {
    /// A mean (or similar) over values in [0, 1]: 1 / n.
    UnitMean,
    /// A percentage of records: 100 / n.
    Percentage,
    /// A mean credit score over [300, 850]: 550 / n.
    CreditScore,
}

impl SensitivityKind {
    /// Returns the sensitivity for a dataset of `record_count` records (at least 1).
    pub fn sensitivity(&self, record_count: u64) -> f64 {
        let n = record_count.max(1) as f64;
        let bound = match self {
            SensitivityKind::UnitMean => 1.0,
            SensitivityKind::Percentage => 100.0,
            SensitivityKind::CreditScore => CREDIT_SCORE_RANGE.max - CREDIT_SCORE_RANGE.min,
        };
        bound / n
    }
}

/// Closed interval a released value is clamped to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

pub const UNIT_RANGE: ValueRange = ValueRange { min: 0.0, max: 1.0 };
pub const PERCENTAGE_RANGE: ValueRange = ValueRange { min: 0.0, max: 100.0 };
pub const CREDIT_SCORE_RANGE: ValueRange = ValueRange { min: 300.0, max: 850.0 };
pub const NON_NEGATIVE_RANGE: ValueRange = ValueRange { min: 0.0, max: f64::INFINITY };

/// Sensitivity and output domain of one field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensitivityRule {
    pub kind: SensitivityKind,
    pub range: ValueRange,
}

impl SensitivityRule {
    const fn new(kind: SensitivityKind, range: ValueRange) -> Self {
        Self { kind, range }
    }
}

impl ScalarMetric {
    pub const ALL: [ScalarMetric; 8] = [
        ScalarMetric::MeanRisk,
        ScalarMetric::MedianRisk,
        ScalarMetric::HighRiskPercentage,
        ScalarMetric::LowRiskPercentage,
        ScalarMetric::MediumRiskPercentage,
        ScalarMetric::StdRisk,
        ScalarMetric::AvgCreditScore,
        ScalarMetric::EstimatedDefaultRate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScalarMetric::MeanRisk => "mean_risk",
            ScalarMetric::MedianRisk => "median_risk",
            ScalarMetric::HighRiskPercentage => "high_risk_percentage",
            ScalarMetric::LowRiskPercentage => "low_risk_percentage",
            ScalarMetric::MediumRiskPercentage => "medium_risk_percentage",
            ScalarMetric::StdRisk => "std_risk",
            ScalarMetric::AvgCreditScore => "avg_credit_score",
            ScalarMetric::EstimatedDefaultRate => "estimated_default_rate",
        }
    }

    pub fn sensitivity_rule(&self) -> SensitivityRule {
        use SensitivityKind::*;
        match self {
            ScalarMetric::MeanRisk | ScalarMetric::MedianRisk => {
                SensitivityRule::new(UnitMean, UNIT_RANGE)
            }
            ScalarMetric::HighRiskPercentage
            | ScalarMetric::LowRiskPercentage
            | ScalarMetric::MediumRiskPercentage
            | ScalarMetric::EstimatedDefaultRate => {
                SensitivityRule::new(Percentage, PERCENTAGE_RANGE)
            }
            // A standard deviation has no natural upper bound.
            ScalarMetric::StdRisk => SensitivityRule::new(UnitMean, NON_NEGATIVE_RANGE),
            ScalarMetric::AvgCreditScore => SensitivityRule::new(CreditScore, CREDIT_SCORE_RANGE),
        }
    }
}

impl KeyedMetric {
    pub const ALL: [KeyedMetric; 4] = [
        KeyedMetric::RiskByAgeGroup,
        KeyedMetric::RiskByIncomeBracket,
        KeyedMetric::RiskByEmploymentStatus,
        KeyedMetric::CreditScoreDistribution,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            KeyedMetric::RiskByAgeGroup => "risk_by_age_group",
            KeyedMetric::RiskByIncomeBracket => "risk_by_income_bracket",
            KeyedMetric::RiskByEmploymentStatus => "risk_by_employment_status",
            KeyedMetric::CreditScoreDistribution => "credit_score_distribution",
        }
    }

    pub fn sensitivity_rule(&self) -> SensitivityRule {
        match self {
            KeyedMetric::RiskByAgeGroup
            | KeyedMetric::RiskByIncomeBracket
            | KeyedMetric::RiskByEmploymentStatus => {
                SensitivityRule::new(SensitivityKind::UnitMean, UNIT_RANGE)
            }
            KeyedMetric::CreditScoreDistribution => {
                SensitivityRule::new(SensitivityKind::Percentage, PERCENTAGE_RANGE)
            }
        }
    }
}

impl MetricsBundle {
    /// Parses a bundle, rejecting fields outside the schema.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|error| AnalyticsError::SchemaMismatch(error.to_string()))
    }

    /// Record count used for sensitivity calibration, clamped to at least 1.
    pub fn record_count(&self) -> u64 {
        self.total_customers.max(1)
    }

    pub fn scalar(&self, metric: ScalarMetric) -> Option<f64> {
        *self.scalar_slot(metric)
    }

    pub fn set_scalar(&mut self, metric: ScalarMetric, value: Option<f64>) {
        *self.scalar_slot_mut(metric) = value;
    }

    pub fn keyed(&self, metric: KeyedMetric) -> Option<&BTreeMap<String, f64>> {
        self.keyed_slot(metric).as_ref()
    }

    pub fn set_keyed(&mut self, metric: KeyedMetric, values: Option<BTreeMap<String, f64>>) {
        *self.keyed_slot_mut(metric) = values;
    }

    /// Number of statistics released from this bundle: one per present
    /// scalar field plus one per category of every present keyed field.
    /// Never less than 1.
    pub fn count_queries(&self) -> usize {
        let scalars =
            ScalarMetric::ALL.iter().filter(|metric| self.scalar(**metric).is_some()).count();
        let keyed: usize = KeyedMetric::ALL
            .iter()
            .filter_map(|metric| self.keyed(*metric))
            .map(BTreeMap::len)
            .sum();
        (scalars + keyed).max(1)
    }

    fn scalar_slot(&self, metric: ScalarMetric) -> &Option<f64> {
        match metric {
            ScalarMetric::MeanRisk => &self.mean_risk,
            ScalarMetric::MedianRisk => &self.median_risk,
            ScalarMetric::HighRiskPercentage => &self.high_risk_percentage,
            ScalarMetric::LowRiskPercentage => &self.low_risk_percentage,
            ScalarMetric::MediumRiskPercentage => &self.medium_risk_percentage,
            ScalarMetric::StdRisk => &self.std_risk,
            ScalarMetric::AvgCreditScore => &self.avg_credit_score,
            ScalarMetric::EstimatedDefaultRate => &self.estimated_default_rate,
        }
    }

    fn scalar_slot_mut(&mut self, metric: ScalarMetric) -> &mut Option<f64> {
        match metric {
            ScalarMetric::MeanRisk => &mut self.mean_risk,
            ScalarMetric::MedianRisk => &mut self.median_risk,
            ScalarMetric::HighRiskPercentage => &mut self.high_risk_percentage,
            ScalarMetric::LowRiskPercentage => &mut self.low_risk_percentage,
            ScalarMetric::MediumRiskPercentage => &mut self.medium_risk_percentage,
            ScalarMetric::StdRisk => &mut self.std_risk,
            ScalarMetric::AvgCreditScore => &mut self.avg_credit_score,
            ScalarMetric::EstimatedDefaultRate => &mut self.estimated_default_rate,
        }
    }

    fn keyed_slot(&self, metric: KeyedMetric) -> &Option<BTreeMap<String, f64>> {
        match metric {
            KeyedMetric::RiskByAgeGroup => &self.risk_by_age_group,
            KeyedMetric::RiskByIncomeBracket => &self.risk_by_income_bracket,
            KeyedMetric::RiskByEmploymentStatus => &self.risk_by_employment_status,
            KeyedMetric::CreditScoreDistribution => &self.credit_score_distribution,
        }
    }

    fn keyed_slot_mut(&mut self, metric: KeyedMetric) -> &mut Option<BTreeMap<String, f64>> {
        match metric {
            KeyedMetric::RiskByAgeGroup => &mut self.risk_by_age_group,
            KeyedMetric::RiskByIncomeBracket => &mut self.risk_by_income_bracket,
            KeyedMetric::RiskByEmploymentStatus => &mut self.risk_by_employment_status,
            KeyedMetric::CreditScoreDistribution => &mut self.credit_score_distribution,
        }
    }
}
