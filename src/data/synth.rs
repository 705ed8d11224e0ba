//! Synthetic experiment generation.
//!
//! Produces, per dataset, an objective sheet and a subjective sheet that follow
//! the content-major layout, plus a ready-to-run `experiment.toml`.
//!
//! Model used for the scores:
//! - each distortion level `d` has a latent quality falling linearly from 5 to 1
//! - each content adds a small random offset
//! - MOS = quality + content offset + noise, clamped to [1, 5]
//! - predictor `j` = `a_j * quality + b_j + noise_j` with per-dataset random gains

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use tracing::info;

use crate::config::{DatasetConfig, ExperimentConfig};
use crate::domain::CurveType;
use crate::error::EvalError;
use crate::eval::DEFAULT_TEST_RATIO;
use crate::fit::DEFAULT_MAX_EVALUATIONS;
use crate::models::ModelSpec;

#[derive(Debug, Clone, PartialEq)]
pub struct SynthSpec {
    pub datasets: usize,
    pub num_contents: usize,
    pub num_distortions: usize,
    pub predictors: usize,
    pub seed: u64,
    /// Probability that any predictor cell is written as an empty (NaN) cell.
    pub nan_fraction: f64,
    /// Prefix every content block of the subjective sheet with a hidden reference row.
    pub hidden_references: bool,
    /// MOS noise standard deviation.
    pub noise: f64,
}

impl Default for SynthSpec {
    fn default() -> Self {
        Self {
            datasets: 2,
            num_contents: 6,
            num_distortions: 5,
            predictors: 3,
            seed: 42,
            nan_fraction: 0.0,
            hidden_references: false,
            noise: 0.2,
        }
    }
}

/// One generated dataset, in memory.
#[derive(Debug, Clone)]
pub struct SynthDataset {
    pub name: String,
    pub stimuli: Vec<String>,
    /// Row-major predictor values (`stimuli.len()` × `predictors`).
    pub objective: Vec<Vec<f64>>,
    /// Subjective rows including any hidden references.
    pub subjective: Vec<(String, f64)>,
    pub hidden_references: Vec<usize>,
}

impl SynthSpec {
    pub fn validate(&self) -> Result<(), EvalError> {
        if self.datasets == 0
            || self.num_contents == 0
            || self.num_distortions == 0
            || self.predictors == 0
        {
            return Err(EvalError::invalid_input(
                "datasets, contents, distortions and predictors must all be > 0",
            ));
        }
        if !(0.0..1.0).contains(&self.nan_fraction) {
            return Err(EvalError::invalid_input(format!(
                "nan fraction must be within [0, 1), got {}",
                self.nan_fraction
            )));
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(EvalError::invalid_input("noise must be finite and >= 0"));
        }
        Ok(())
    }
}

/// Generate dataset `index` (named `D{index + 1}`). Deterministic for a given spec.
pub fn generate_dataset(spec: &SynthSpec, index: usize) -> Result<SynthDataset, EvalError> {
    spec.validate()?;

    let mut rng = StdRng::seed_from_u64(spec.seed.wrapping_add(index as u64));
    let unit = Normal::new(0.0, 1.0)
        .map_err(|e| EvalError::invalid_input(format!("Noise distribution error: {e}")))?;

    let name = format!("D{}", index + 1);
    let gains: Vec<(f64, f64, f64)> = (0..spec.predictors)
        .map(|_| {
            let a = rng.gen_range(0.5..2.0) * if rng.gen_bool(0.3) { -1.0 } else { 1.0 };
            let b = rng.gen_range(-1.0..1.0);
            let sigma = rng.gen_range(0.05..0.4);
            (a, b, sigma)
        })
        .collect();

    let nd = spec.num_distortions;
    let mut stimuli = Vec::with_capacity(spec.num_contents * nd);
    let mut objective = Vec::with_capacity(spec.num_contents * nd);
    let mut subjective = Vec::new();
    let mut hidden_references = Vec::new();

    for c in 0..spec.num_contents {
        let offset = 0.3 * unit.sample(&mut rng);

        if spec.hidden_references {
            hidden_references.push(subjective.len());
            subjective.push((format!("{name}_c{c:02}_ref"), 5.0));
        }

        for d in 0..nd {
            let quality = if nd == 1 {
                3.0
            } else {
                5.0 - 4.0 * d as f64 / (nd - 1) as f64
            };
            let id = format!("{name}_c{c:02}_d{d:02}");

            let row = gains
                .iter()
                .map(|&(a, b, sigma)| {
                    if spec.nan_fraction > 0.0 && rng.r#gen::<f64>() < spec.nan_fraction {
                        f64::NAN
                    } else {
                        a * quality + b + sigma * unit.sample(&mut rng)
                    }
                })
                .collect();

            let mos = (quality + offset + spec.noise * unit.sample(&mut rng)).clamp(1.0, 5.0);
            stimuli.push(id.clone());
            objective.push(row);
            subjective.push((id, mos));
        }
    }

    Ok(SynthDataset {
        name,
        stimuli,
        objective,
        subjective,
        hidden_references,
    })
}

/// Write every dataset plus `experiment.toml` under `out_dir`; returns the config path.
pub fn write_experiment(spec: &SynthSpec, out_dir: &Path) -> Result<PathBuf, EvalError> {
    spec.validate()?;
    fs::create_dir_all(out_dir)?;

    let mut datasets = Vec::with_capacity(spec.datasets);
    for index in 0..spec.datasets {
        let ds = generate_dataset(spec, index)?;
        let dir = out_dir.join(&ds.name);
        fs::create_dir_all(&dir)?;
        write_objective(&dir.join("obj.csv"), &ds, spec.predictors)?;
        write_subjective(&dir.join("subj.csv"), &ds)?;
        info!(dataset = %ds.name, stimuli = ds.stimuli.len(), "synthetic dataset written");

        datasets.push(DatasetConfig {
            objective: PathBuf::from(&ds.name).join("obj.csv"),
            subjective: PathBuf::from(&ds.name).join("subj.csv"),
            name: ds.name,
            num_contents: spec.num_contents,
            num_distortions: spec.num_distortions,
            hidden_references: ds.hidden_references,
        });
    }

    let config = ExperimentConfig {
        ratio: DEFAULT_TEST_RATIO,
        curve: CurveType::Logistic4,
        parallel: false,
        output_dir: PathBuf::from("results"),
        max_evaluations: DEFAULT_MAX_EVALUATIONS,
        summary_json: true,
        models: vec![ModelSpec::Linear, ModelSpec::Knn { k: 5 }],
        datasets,
    };
    let path = out_dir.join("experiment.toml");
    fs::write(&path, config.to_toml()?)?;
    Ok(path)
}

fn write_objective(path: &Path, ds: &SynthDataset, predictors: usize) -> Result<(), EvalError> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    let header =
        std::iter::once("stimulus".to_string()).chain((1..=predictors).map(|j| format!("p{j}")));
    writer.write_record(header)?;
    for (id, row) in ds.stimuli.iter().zip(&ds.objective) {
        let cells = row
            .iter()
            .map(|v| if v.is_finite() { format!("{v:.6}") } else { String::new() });
        writer.write_record(std::iter::once(id.clone()).chain(cells))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_subjective(path: &Path, ds: &SynthDataset) -> Result<(), EvalError> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    writer.write_record(["stimulus", "MOS"])?;
    for (id, mos) in &ds.subjective {
        writer.write_record([id.clone(), format!("{mos:.4}")])?;
    }
    writer.flush()?;
    Ok(())
}
