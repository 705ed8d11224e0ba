use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::models::{DEFAULT_TREES, ForestRegressor, KnnRegressor, LinearRegressor};

/// A regression algorithm that can be trained on `(features, targets)`.
///
/// `fit` returns a fresh, independently owned predictor, so folds never share
/// model state and can run in parallel.
pub trait Regressor: Send + Sync {
    /// Label used in reports (e.g. `LinearRegression`).
    fn name(&self) -> &str;

    fn fit(
        &self,
        features: &DMatrix<f64>,
        targets: &DVector<f64>,
    ) -> Result<Box<dyn Predictor>, EvalError>;
}

/// A trained model.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: &DMatrix<f64>) -> Result<DVector<f64>, EvalError>;
}

/// Declarative model choice, as written in the experiment config or on the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelSpec {
    /// Ordinary least squares with intercept.
    Linear,
    /// L2-regularised least squares (intercept not penalised).
    Ridge {
        #[serde(default = "default_alpha")]
        alpha: f64,
    },
    /// k-nearest-neighbours mean, Euclidean distance.
    Knn {
        #[serde(default = "default_k")]
        k: usize,
    },
    /// Bagged regression trees, averaged.
    Forest {
        #[serde(default = "default_trees")]
        trees: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_depth: Option<usize>,
        #[serde(default)]
        seed: u64,
    },
}

fn default_alpha() -> f64 {
    1.0
}

fn default_k() -> usize {
    5
}

fn default_trees() -> usize {
    DEFAULT_TREES
}

impl ModelSpec {
    pub fn build(&self) -> Box<dyn Regressor> {
        match self {
            ModelSpec::Linear => Box::new(LinearRegressor::ols()),
            ModelSpec::Ridge { alpha } => Box::new(LinearRegressor::ridge(*alpha)),
            ModelSpec::Knn { k } => Box::new(KnnRegressor::new(*k)),
            ModelSpec::Forest {
                trees,
                max_depth,
                seed,
            } => Box::new(ForestRegressor::new(*trees, *max_depth, *seed)),
        }
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        match self {
            ModelSpec::Linear => Ok(()),
            ModelSpec::Ridge { alpha } if alpha.is_finite() && *alpha >= 0.0 => Ok(()),
            ModelSpec::Ridge { alpha } => Err(EvalError::config(format!(
                "ridge alpha must be finite and >= 0, got {alpha}"
            ))),
            ModelSpec::Knn { k } if *k > 0 => Ok(()),
            ModelSpec::Knn { .. } => Err(EvalError::config("knn requires k >= 1")),
            ModelSpec::Forest { trees: 0, .. } => {
                Err(EvalError::config("forest requires trees >= 1"))
            }
            ModelSpec::Forest { .. } => Ok(()),
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSpec::Linear => write!(f, "linear"),
            ModelSpec::Ridge { alpha } => write!(f, "ridge:{alpha}"),
            ModelSpec::Knn { k } => write!(f, "knn:{k}"),
            ModelSpec::Forest { trees, .. } => write!(f, "forest:{trees}"),
        }
    }
}

/// Parse `linear`, `ridge[:alpha]`, `knn[:k]`, `forest[:trees]`.
impl FromStr for ModelSpec {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s.as_str(), None),
        };

        let spec = match (kind, arg) {
            ("linear", None) => ModelSpec::Linear,
            ("ridge", None) => ModelSpec::Ridge { alpha: default_alpha() },
            ("ridge", Some(a)) => ModelSpec::Ridge {
                alpha: a
                    .parse()
                    .map_err(|_| EvalError::config(format!("invalid ridge alpha '{a}'")))?,
            },
            ("knn", None) => ModelSpec::Knn { k: default_k() },
            ("knn", Some(k)) => ModelSpec::Knn {
                k: k
                    .parse()
                    .map_err(|_| EvalError::config(format!("invalid knn k '{k}'")))?,
            },
            ("forest", arg) => ModelSpec::Forest {
                trees: match arg {
                    Some(n) => n
                        .parse()
                        .map_err(|_| EvalError::config(format!("invalid forest size '{n}'")))?,
                    None => default_trees(),
                },
                max_depth: None,
                seed: 0,
            },
            _ => {
                return Err(EvalError::config(format!(
                    "unknown model '{s}' (expected linear, ridge[:alpha], knn[:k], forest[:trees])"
                )));
            }
        };
        spec.validate()?;
        Ok(spec)
    }
}

pub(crate) fn check_training_set(
    features: &DMatrix<f64>,
    targets: &DVector<f64>,
) -> Result<(), EvalError> {
    if features.nrows() == 0 {
        return Err(EvalError::empty_partition("no training samples"));
    }
    if features.nrows() != targets.len() {
        return Err(EvalError::model(format!(
            "{} feature rows but {} targets",
            features.nrows(),
            targets.len()
        )));
    }
    if features.iter().chain(targets.iter()).any(|v| !v.is_finite()) {
        return Err(EvalError::model("training data contains non-finite values"));
    }
    Ok(())
}

pub(crate) fn check_feature_width(
    features: &DMatrix<f64>,
    expected: usize,
) -> Result<(), EvalError> {
    if features.ncols() != expected {
        return Err(EvalError::model(format!(
            "model was trained on {expected} predictors, got {}",
            features.ncols()
        )));
    }
    Ok(())
}
