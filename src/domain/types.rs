//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - read from the experiment config
//! - produced by the evaluation driver
//! - exported to CSV/JSON

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// Logistic family used to map raw predictions onto the MOS scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum CurveType {
    /// `(β1-β2) / (1 + exp(-(x-β3)/β4)) + β2`
    #[default]
    #[serde(rename = "logistic_4params")]
    #[value(name = "logistic_4params")]
    Logistic4,
    /// `β1 (0.5 - 1/(1 + exp(β2 (x-β3)))) + β4 x + β5`
    #[serde(rename = "logistic_5params")]
    #[value(name = "logistic_5params")]
    Logistic5,
}

impl CurveType {
    pub const ALL: [CurveType; 2] = [CurveType::Logistic4, CurveType::Logistic5];

    pub fn name(self) -> &'static str {
        match self {
            CurveType::Logistic4 => "logistic_4params",
            CurveType::Logistic5 => "logistic_5params",
        }
    }

    pub fn param_count(self) -> usize {
        match self {
            CurveType::Logistic4 => 4,
            CurveType::Logistic5 => 5,
        }
    }
}

impl fmt::Display for CurveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CurveType {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CurveType::ALL
            .into_iter()
            .find(|c| c.name() == s.trim())
            .ok_or_else(|| EvalError::InvalidCurveType(s.to_string()))
    }
}

/// Dataset metadata: how the stimulus rows are laid out.
///
/// Rows are grouped by content: content `c` owns rows
/// `[c * num_distortions, (c + 1) * num_distortions)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub name: String,
    pub num_contents: usize,
    pub num_distortions: usize,
}

impl DatasetMeta {
    pub fn new(name: impl Into<String>, num_contents: usize, num_distortions: usize) -> Self {
        Self {
            name: name.into(),
            num_contents,
            num_distortions,
        }
    }

    pub fn expected_rows(&self) -> usize {
        self.num_contents * self.num_distortions
    }
}

/// PLCC / SROCC / RMSE for a single fold and target dataset.
///
/// A metric the fold could not produce is NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldMetrics {
    pub plcc: f64,
    pub srocc: f64,
    pub rmse: f64,
}

impl FoldMetrics {
    pub const MISSING: FoldMetrics = FoldMetrics {
        plcc: f64::NAN,
        srocc: f64::NAN,
        rmse: f64::NAN,
    };

    pub fn is_complete(&self) -> bool {
        self.plcc.is_finite() && self.srocc.is_finite() && self.rmse.is_finite()
    }
}

/// NaN-ignoring mean and population standard deviation across folds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
}

/// One line of the performance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub dataset: String,
    pub model: String,
    pub plcc: MetricSummary,
    pub srocc: MetricSummary,
    pub rmse: MetricSummary,
}

/// Per-fold metrics for one (model, target dataset) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldRecord {
    pub model: String,
    pub fold: usize,
    /// Content indices held out for testing in this fold.
    pub test_contents: Vec<usize>,
    pub target: String,
    pub metrics: FoldMetrics,
}

/// Everything produced while one dataset served as the training set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub training_dataset: String,
    pub rows: Vec<ReportRow>,
    pub folds: Vec<FoldRecord>,
}
