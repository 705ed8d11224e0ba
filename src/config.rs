//! Experiment configuration (TOML).
//!
//! ```toml
//! ratio = 0.2
//! curve = "logistic_4params"
//! parallel = true
//! output_dir = "results"
//! models = [{ kind = "linear" }, { kind = "knn", k = 5 }]
//!
//! [[datasets]]
//! name = "D1"
//! num_contents = 8
//! num_distortions = 12
//! objective = "D1/obj.csv"
//! subjective = "D1/subj.csv"
//! hidden_references = [0, 13]
//! ```
//!
//! Relative paths resolve against the directory holding the config file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{CurveType, DatasetMeta};
use crate::error::EvalError;
use crate::eval::{DEFAULT_TEST_RATIO, DatasetInput, DatasetSource, EvalSettings};
use crate::fit::{DEFAULT_MAX_EVALUATIONS, SolverOptions};
use crate::io::{read_objective_csv, read_subjective_csv};
use crate::models::ModelSpec;

/// Environment variable naming the config used when `--config` is absent.
pub const CONFIG_ENV: &str = "MXV_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    #[serde(default = "default_ratio")]
    pub ratio: f64,
    #[serde(default)]
    pub curve: CurveType,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: usize,
    /// Write `summary.json` next to the per-dataset reports.
    #[serde(default)]
    pub summary_json: bool,
    #[serde(default = "default_models")]
    pub models: Vec<ModelSpec>,
    pub datasets: Vec<DatasetConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub name: String,
    pub num_contents: usize,
    pub num_distortions: usize,
    pub objective: PathBuf,
    pub subjective: PathBuf,
    /// 0-based subjective rows to drop (hidden references).
    #[serde(default)]
    pub hidden_references: Vec<usize>,
}

fn default_ratio() -> f64 {
    DEFAULT_TEST_RATIO
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_max_evaluations() -> usize {
    DEFAULT_MAX_EVALUATIONS
}

fn default_models() -> Vec<ModelSpec> {
    vec![ModelSpec::Knn { k: 5 }]
}

impl ExperimentConfig {
    /// Read, parse, resolve paths and validate.
    pub fn load(path: &Path) -> Result<Self, EvalError> {
        let text = fs::read_to_string(path).map_err(|e| {
            EvalError::config(format!("Failed to read config '{}': {e}", path.display()))
        })?;
        let mut config = Self::parse(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base);
        config.validate()?;
        debug!(path = %path.display(), datasets = config.datasets.len(), "config loaded");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, EvalError> {
        toml::from_str(text).map_err(|e| EvalError::config(format!("Invalid config: {e}")))
    }

    pub fn to_toml(&self) -> Result<String, EvalError> {
        toml::to_string_pretty(self)
            .map_err(|e| EvalError::config(format!("Failed to encode config: {e}")))
    }

    /// Make relative paths absolute with respect to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.output_dir);
        for ds in &mut self.datasets {
            join(&mut ds.objective);
            join(&mut ds.subjective);
        }
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        if !(self.ratio.is_finite() && (0.0..=1.0).contains(&self.ratio)) {
            return Err(EvalError::config(format!(
                "ratio must be within [0, 1], got {}",
                self.ratio
            )));
        }
        if self.max_evaluations == 0 {
            return Err(EvalError::config("max_evaluations must be > 0"));
        }
        if self.models.is_empty() {
            return Err(EvalError::config("at least one regression model is required"));
        }
        for model in &self.models {
            model.validate()?;
        }
        if self.datasets.is_empty() {
            return Err(EvalError::config("at least one dataset is required"));
        }

        let mut seen = HashSet::new();
        for ds in &self.datasets {
            if ds.name.trim().is_empty() {
                return Err(EvalError::config("dataset name must not be empty"));
            }
            // Names become report directories under `output_dir`.
            if ds.name.contains(['/', '\\']) || ds.name == "." || ds.name == ".." {
                return Err(EvalError::config(format!(
                    "dataset name '{}' must not contain path separators or be '.'/'..'",
                    ds.name
                )));
            }
            if !seen.insert(ds.name.as_str()) {
                return Err(EvalError::config(format!("duplicate dataset name '{}'", ds.name)));
            }
            if ds.num_distortions == 0 {
                return Err(EvalError::config(format!(
                    "dataset '{}': num_distortions must be > 0",
                    ds.name
                )));
            }
            if ds.num_contents == 0 {
                return Err(EvalError::config(format!(
                    "dataset '{}': num_contents must be > 0",
                    ds.name
                )));
            }
        }
        Ok(())
    }

    pub fn settings(&self) -> EvalSettings {
        EvalSettings {
            ratio: self.ratio,
            curve: self.curve,
            solver: SolverOptions {
                max_evaluations: self.max_evaluations,
                ..SolverOptions::default()
            },
            parallel: self.parallel,
        }
    }

    /// Read every dataset's score sheets. A dataset whose sheets cannot be read
    /// carries its error; alignment is left to the driver.
    pub fn load_sources(&self) -> Vec<DatasetInput> {
        self.datasets
            .iter()
            .map(|ds| DatasetInput {
                name: ds.name.clone(),
                source: ds.load(),
            })
            .collect()
    }
}

impl DatasetConfig {
    pub fn meta(&self) -> DatasetMeta {
        DatasetMeta::new(self.name.clone(), self.num_contents, self.num_distortions)
    }

    pub fn load(&self) -> Result<DatasetSource, EvalError> {
        let objective = read_objective_csv(&self.objective)?;
        let subjective = read_subjective_csv(&self.subjective, &self.hidden_references)?;
        debug!(
            dataset = %self.name,
            stimuli = objective.stimuli.len(),
            predictors = objective.predictors.len(),
            "score sheets read"
        );
        Ok(DatasetSource {
            meta: self.meta(),
            objective,
            subjective,
        })
    }
}
