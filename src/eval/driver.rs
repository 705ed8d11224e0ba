//! Evaluation driver: dataset rotation × model × fold × target.
//!
//! For each dataset used as the training set:
//! 1) load and align every dataset (fatal only for the dataset that fails)
//! 2) enumerate content partitions of the training dataset
//! 3) per fold: fit a fresh model on the train side, score the test side, then
//!    score every other dataset with the same fitted model
//! 4) reduce each (model, target) column of fold metrics to mean/std, NaN-aware
//!
//! Fold-level failures (curve fit, empty side, model error) become NaN metrics
//! and never abort the run.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::{
    CurveType, Dataset, DatasetMeta, FoldMetrics, FoldRecord, MetricSummary, ObjectiveTable,
    ReportRow, RunReport, SubjectiveTable,
};
use crate::error::EvalError;
use crate::eval::partition::generate_partitions;
use crate::eval::samples::{Samples, extract_samples};
use crate::fit::{SolverOptions, fit_curve_with};
use crate::math::{nan_mean_std, pearson, rmse, spearman};
use crate::models::{Predictor, Regressor};

/// Fraction of contents held out per fold unless configured otherwise.
pub const DEFAULT_TEST_RATIO: f64 = 0.2;

/// Knobs shared by every fold of a run.
#[derive(Debug, Clone, Copy)]
pub struct EvalSettings {
    pub ratio: f64,
    pub curve: CurveType,
    pub solver: SolverOptions,
    /// Evaluate folds on the rayon pool.
    pub parallel: bool,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_TEST_RATIO,
            curve: CurveType::Logistic4,
            solver: SolverOptions::default(),
            parallel: false,
        }
    }
}

/// Raw, not yet aligned score tables for one dataset.
#[derive(Debug, Clone)]
pub struct DatasetSource {
    pub meta: DatasetMeta,
    pub objective: ObjectiveTable,
    pub subjective: SubjectiveTable,
}

impl DatasetSource {
    /// Check stimulus order and layout, consuming the raw tables.
    pub fn into_dataset(self) -> Result<Dataset, EvalError> {
        Dataset::align(self.meta, self.objective, self.subjective)
    }
}

/// One configured dataset: its raw tables, or the error hit while reading them.
#[derive(Debug)]
pub struct DatasetInput {
    pub name: String,
    pub source: Result<DatasetSource, EvalError>,
}

impl From<DatasetSource> for DatasetInput {
    fn from(source: DatasetSource) -> Self {
        Self {
            name: source.meta.name.clone(),
            source: Ok(source),
        }
    }
}

/// Outcome of one training-dataset rotation.
#[derive(Debug)]
pub struct RunOutcome {
    pub training_dataset: String,
    pub result: Result<RunReport, EvalError>,
}

/// A dataset as seen from a rotation: usable data, or just its name.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub name: &'a str,
    pub data: Option<&'a Dataset>,
}

/// Run every rotation: each source serves once as the training dataset.
pub fn evaluate_all(
    sources: &[DatasetSource],
    models: &[Box<dyn Regressor>],
    settings: &EvalSettings,
) -> Vec<RunOutcome> {
    let inputs = sources.iter().cloned().map(DatasetInput::from).collect();
    evaluate_inputs(inputs, models, settings)
}

/// Like [`evaluate_all`], but a dataset may already have failed to load.
///
/// A dataset that failed to load or align loses its own rotation and shows
/// up as NaN rows in every other rotation.
pub fn evaluate_inputs(
    inputs: Vec<DatasetInput>,
    models: &[Box<dyn Regressor>],
    settings: &EvalSettings,
) -> Vec<RunOutcome> {
    let mut names = Vec::with_capacity(inputs.len());
    let mut datasets = Vec::with_capacity(inputs.len());
    let mut errors = Vec::with_capacity(inputs.len());
    for input in inputs {
        match input.source.and_then(DatasetSource::into_dataset) {
            Ok(ds) => {
                datasets.push(Some(ds));
                errors.push(None);
            }
            Err(e) => {
                warn!(dataset = %input.name, error = %e, "dataset unusable");
                datasets.push(None);
                errors.push(Some(e));
            }
        }
        names.push(input.name);
    }

    let targets: Vec<Target<'_>> = names
        .iter()
        .zip(datasets.iter())
        .map(|(name, d)| Target {
            name: name.as_str(),
            data: d.as_ref(),
        })
        .collect();

    let mut outcomes = Vec::with_capacity(names.len());
    for (idx, name) in names.iter().enumerate() {
        info!(dataset = %name, "training dataset");
        let result = match errors[idx].take() {
            Some(err) => Err(err),
            None => evaluate_rotation(idx, &targets, models, settings),
        };
        if let Err(e) = &result {
            warn!(dataset = %name, error = %e, "rotation aborted");
        }
        outcomes.push(RunOutcome {
            training_dataset: name.clone(),
            result,
        });
    }
    outcomes
}

/// Evaluate every model with `targets[train_idx]` as the training dataset.
///
/// Report rows follow `targets` order within each model.
pub fn evaluate_rotation(
    train_idx: usize,
    targets: &[Target<'_>],
    models: &[Box<dyn Regressor>],
    settings: &EvalSettings,
) -> Result<RunReport, EvalError> {
    let train_target = targets.get(train_idx).ok_or_else(|| {
        EvalError::invalid_input(format!("training index {train_idx} out of range"))
    })?;
    let train = train_target.data.ok_or_else(|| {
        EvalError::invalid_input(format!("dataset '{}' is not available", train_target.name))
    })?;

    let partitions = generate_partitions(train.meta.num_contents, settings.ratio)?;
    info!(
        dataset = %train.name(),
        folds = partitions.len(),
        ratio = settings.ratio,
        "partitions generated"
    );

    // Rotation order: training dataset first, then the others in configured order.
    let rotation: Vec<usize> = std::iter::once(train_idx)
        .chain((0..targets.len()).filter(|&i| i != train_idx))
        .collect();

    // Cross-dataset samples do not depend on the fold; extract them once.
    let cross: Vec<Option<Samples>> = rotation[1..]
        .iter()
        .map(|&i| cross_samples(&targets[i]))
        .collect();

    let mut rows = Vec::with_capacity(models.len() * targets.len());
    let mut folds = Vec::new();

    for model in models {
        info!(dataset = %train.name(), model = model.name(), "regression model");

        let run = |fold: usize| {
            let test = &partitions.test[fold];
            let train_contents = &partitions.train[fold];
            debug!(model = model.name(), fold = fold + 1, "fold");
            run_fold(model.as_ref(), train, test, train_contents, &cross, settings)
        };
        let per_fold: Vec<Vec<FoldMetrics>> = if settings.parallel {
            (0..partitions.len()).into_par_iter().map(run).collect()
        } else {
            (0..partitions.len()).map(run).collect()
        };

        let incomplete = per_fold.iter().flatten().filter(|m| !m.is_complete()).count();
        if incomplete > 0 {
            info!(
                dataset = %train.name(),
                model = model.name(),
                incomplete,
                total = per_fold.len() * rotation.len(),
                "fold metrics with NaN entries"
            );
        }

        for (fold, metrics) in per_fold.iter().enumerate() {
            for (slot, &target_idx) in rotation.iter().enumerate() {
                folds.push(FoldRecord {
                    model: model.name().to_string(),
                    fold: fold + 1,
                    test_contents: partitions.test[fold].clone(),
                    target: targets[target_idx].name.to_string(),
                    metrics: metrics[slot],
                });
            }
        }

        // Emit rows in configured dataset order, not rotation order.
        for (target_idx, target) in targets.iter().enumerate() {
            let slot = rotation
                .iter()
                .position(|&i| i == target_idx)
                .unwrap_or_default();
            let column: Vec<FoldMetrics> = per_fold.iter().map(|m| m[slot]).collect();
            rows.push(aggregate(target.name, model.name(), &column));
        }
    }

    Ok(RunReport {
        training_dataset: train.name().to_string(),
        rows,
        folds,
    })
}

/// Reduce one (model, target) column of fold metrics.
pub fn aggregate(dataset: &str, model: &str, folds: &[FoldMetrics]) -> ReportRow {
    let summarize = |pick: fn(&FoldMetrics) -> f64| {
        let values: Vec<f64> = folds.iter().map(pick).collect();
        let (mean, std) = nan_mean_std(&values);
        MetricSummary { mean, std }
    };
    ReportRow {
        dataset: dataset.to_string(),
        model: model.to_string(),
        plcc: summarize(|m| m.plcc),
        srocc: summarize(|m| m.srocc),
        rmse: summarize(|m| m.rmse),
    }
}

/// Predict, rescale onto the MOS scale, and score one sample set.
pub fn score_samples(
    predictor: &dyn Predictor,
    samples: &Samples,
    settings: &EvalSettings,
) -> Result<FoldMetrics, EvalError> {
    if samples.is_empty() {
        return Err(EvalError::empty_partition("no test samples"));
    }
    let raw = predictor.predict(&samples.features)?;
    let fit = fit_curve_with(
        raw.as_slice(),
        samples.targets.as_slice(),
        settings.curve,
        &settings.solver,
    )?;
    let truth = samples.targets.as_slice();
    Ok(FoldMetrics {
        plcc: pearson(&fit.fitted, truth),
        srocc: spearman(&fit.fitted, truth),
        rmse: rmse(&fit.fitted, truth),
    })
}

fn cross_samples(target: &Target<'_>) -> Option<Samples> {
    let ds = target.data?;
    match extract_samples(
        &ds.objective,
        &ds.subjective,
        &ds.all_contents(),
        ds.meta.num_distortions,
    ) {
        Ok(samples) => {
            if samples.dropped > 0 {
                debug!(dataset = %ds.name(), dropped = samples.dropped, "non-finite rows removed");
            }
            Some(samples)
        }
        Err(e) => {
            warn!(dataset = %ds.name(), error = %e, "cross-dataset extraction failed");
            None
        }
    }
}

/// Metrics for one fold, indexed by rotation slot (0 = within-dataset).
fn run_fold(
    model: &dyn Regressor,
    train: &Dataset,
    test_contents: &[usize],
    train_contents: &[usize],
    cross: &[Option<Samples>],
    settings: &EvalSettings,
) -> Vec<FoldMetrics> {
    let mut out = vec![FoldMetrics::MISSING; 1 + cross.len()];
    let nd = train.meta.num_distortions;

    let test = extract_samples(&train.objective, &train.subjective, test_contents, nd);
    let train_samples = extract_samples(&train.objective, &train.subjective, train_contents, nd);
    let train_samples = match train_samples {
        Ok(s) if !s.is_empty() => s,
        Ok(_) => {
            warn!(model = model.name(), test = ?test_contents, "empty training partition");
            return out;
        }
        Err(e) => {
            warn!(model = model.name(), error = %e, "training extraction failed");
            return out;
        }
    };

    let predictor = match model.fit(&train_samples.features, &train_samples.targets) {
        Ok(p) => p,
        Err(e) => {
            warn!(model = model.name(), test = ?test_contents, error = %e, "model fit failed");
            return out;
        }
    };

    out[0] = test
        .and_then(|samples| score_samples(predictor.as_ref(), &samples, settings))
        .unwrap_or_else(|e| {
            warn!(
                model = model.name(),
                dataset = %train.name(),
                test = ?test_contents,
                error = %e,
                "within-dataset fold left as NaN"
            );
            FoldMetrics::MISSING
        });

    for (slot, samples) in cross.iter().enumerate() {
        let Some(samples) = samples else { continue };
        out[slot + 1] = score_samples(predictor.as_ref(), samples, settings).unwrap_or_else(|e| {
            warn!(model = model.name(), error = %e, "cross-dataset fold left as NaN");
            FoldMetrics::MISSING
        });
    }

    out
}
