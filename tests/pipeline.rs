use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use nalgebra::{DMatrix, DVector};
use pretty_assertions::assert_eq;

use mos_xval::app::pipeline::run_experiment;
use mos_xval::config::ExperimentConfig;
use mos_xval::data::{SynthSpec, write_experiment};
use mos_xval::domain::{DatasetMeta, FoldMetrics, ObjectiveTable, SubjectiveTable};
use mos_xval::error::EvalError;
use mos_xval::eval::{DatasetSource, EvalSettings, evaluate_all};
use mos_xval::models::{ModelSpec, Predictor, Regressor};

fn logistic4(x: f64) -> f64 {
    let (b1, b2, b3, b4) = (5.0, 1.0, 2.5, 1.0);
    (b1 - b2) / (1.0 + (-(x - b3) / b4).exp()) + b2
}

fn source(
    name: &str,
    contents: usize,
    distortions: usize,
    f: impl Fn(usize, usize) -> (f64, f64),
) -> DatasetSource {
    let mut stimuli = Vec::new();
    let mut x = Vec::new();
    let mut y = Vec::new();
    for c in 0..contents {
        for d in 0..distortions {
            let (xi, yi) = f(c, d);
            stimuli.push(format!("{name}_c{c}_d{d}"));
            x.push(xi);
            y.push(yi);
        }
    }
    DatasetSource {
        meta: DatasetMeta::new(name, contents, distortions),
        objective: ObjectiveTable {
            stimuli: stimuli.clone(),
            predictors: vec!["p1".to_string()],
            scores: DMatrix::from_column_slice(x.len(), 1, &x),
        },
        subjective: SubjectiveTable {
            stimuli,
            mos: DVector::from_vec(y),
        },
    }
}

fn same_metric(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

fn same_metrics(a: &FoldMetrics, b: &FoldMetrics) -> bool {
    same_metric(a.plcc, b.plcc) && same_metric(a.srocc, b.srocc) && same_metric(a.rmse, b.rmse)
}

#[test]
fn perfect_predictor_scores_perfectly() {
    let ds = source("D1", 4, 6, |c, d| {
        let x = d as f64 + 0.1 * c as f64;
        (x, logistic4(x))
    });
    let settings = EvalSettings {
        ratio: 0.25,
        ..EvalSettings::default()
    };
    let models = vec![ModelSpec::Linear.build()];
    let outcomes = evaluate_all(&[ds], &models, &settings);

    let report = outcomes[0].result.as_ref().unwrap();
    assert_eq!(report.folds.len(), 4);
    let row = &report.rows[0];
    assert_eq!(row.dataset, "D1");
    assert_eq!(row.model, "LinearRegression");
    assert!((row.plcc.mean - 1.0).abs() < 1e-6, "plcc {}", row.plcc.mean);
    assert!((row.srocc.mean - 1.0).abs() < 1e-9, "srocc {}", row.srocc.mean);
    assert!(row.rmse.mean < 1e-4, "rmse {}", row.rmse.mean);
}

/// Counts `fit` calls so tests can assert nothing was trained.
struct CountingRegressor {
    fits: Arc<AtomicUsize>,
}

impl Regressor for CountingRegressor {
    fn name(&self) -> &str {
        "Counting"
    }

    fn fit(
        &self,
        features: &DMatrix<f64>,
        targets: &DVector<f64>,
    ) -> Result<Box<dyn Predictor>, EvalError> {
        self.fits.fetch_add(1, Ordering::SeqCst);
        ModelSpec::Linear.build().fit(features, targets)
    }
}

#[test]
fn misaligned_dataset_fails_before_any_fit() {
    let mut ds = source("D1", 3, 2, |c, d| (d as f64 + c as f64, d as f64));
    ds.subjective.stimuli.swap(0, 1);

    let fits = Arc::new(AtomicUsize::new(0));
    let models: Vec<Box<dyn Regressor>> = vec![Box::new(CountingRegressor { fits: fits.clone() })];
    let outcomes = evaluate_all(&[ds], &models, &EvalSettings::default());

    assert!(matches!(outcomes[0].result, Err(EvalError::Alignment { .. })));
    assert_eq!(fits.load(Ordering::SeqCst), 0);
}

#[test]
fn misaligned_dataset_only_loses_its_own_rotation() {
    let good = source("A", 4, 3, |c, d| (d as f64 + 0.2 * c as f64, 1.0 + d as f64));
    let mut bad = source("B", 3, 3, |c, d| (d as f64 + c as f64, d as f64));
    bad.subjective.stimuli.swap(2, 4);

    let models = vec![ModelSpec::Linear.build()];
    let outcomes = evaluate_all(&[good, bad], &models, &EvalSettings::default());

    let a = outcomes[0].result.as_ref().unwrap();
    assert_eq!(a.rows.len(), 2);
    assert!(a.rows[1].plcc.mean.is_nan());
    assert!(outcomes[1].result.is_err());
}

#[test]
fn three_contents_two_distortions_end_to_end() {
    let ds = source("D1", 3, 2, |c, d| {
        let x = 1.0 + d as f64 * 2.0 + 0.3 * c as f64;
        (x, 1.5 + 2.0 * d as f64 + 0.1 * c as f64)
    });
    let settings = EvalSettings {
        ratio: 1.0 / 3.0,
        ..EvalSettings::default()
    };
    let models = vec![ModelSpec::Linear.build()];
    let outcomes = evaluate_all(&[ds], &models, &settings);
    let report = outcomes[0].result.as_ref().unwrap();

    assert_eq!(report.folds.len(), 3);
    let tests: Vec<Vec<usize>> = report.folds.iter().map(|f| f.test_contents.clone()).collect();
    assert_eq!(tests, vec![vec![0], vec![1], vec![2]]);

    let row = &report.rows[0];
    for v in [
        row.plcc.mean,
        row.plcc.std,
        row.srocc.mean,
        row.srocc.std,
        row.rmse.mean,
        row.rmse.std,
    ] {
        assert!(v.is_finite());
    }
}

/// Predicts a constant whenever the first stimulus (x = 0) is absent from
/// training, otherwise behaves like OLS.
struct ConstantWithoutOrigin;

struct ConstantPredictor(f64);

impl Predictor for ConstantPredictor {
    fn predict(&self, features: &DMatrix<f64>) -> Result<DVector<f64>, EvalError> {
        Ok(DVector::from_element(features.nrows(), self.0))
    }
}

impl Regressor for ConstantWithoutOrigin {
    fn name(&self) -> &str {
        "ConstantWithoutOrigin"
    }

    fn fit(
        &self,
        features: &DMatrix<f64>,
        targets: &DVector<f64>,
    ) -> Result<Box<dyn Predictor>, EvalError> {
        if features.iter().any(|v| *v == 0.0) {
            ModelSpec::Linear.build().fit(features, targets)
        } else {
            Ok(Box::new(ConstantPredictor(2.5)))
        }
    }
}

#[test]
fn failed_curve_fit_leaves_only_that_fold_nan() {
    let ds = source("D1", 4, 3, |c, d| {
        let x = d as f64 + 0.5 * c as f64;
        (x, logistic4(x))
    });
    let settings = EvalSettings {
        ratio: 0.25,
        ..EvalSettings::default()
    };
    let models: Vec<Box<dyn Regressor>> = vec![Box::new(ConstantWithoutOrigin)];
    let outcomes = evaluate_all(&[ds], &models, &settings);
    let report = outcomes[0].result.as_ref().unwrap();

    assert_eq!(report.folds.len(), 4);
    // Fold 1 holds out content 0, so training never sees x = 0.
    assert_eq!(report.folds[0].test_contents, vec![0]);
    assert!(report.folds[0].metrics.plcc.is_nan());
    assert!(report.folds[0].metrics.srocc.is_nan());
    assert!(report.folds[1..].iter().all(|f| f.metrics.is_complete()));

    let row = &report.rows[0];
    let kept: Vec<f64> = report.folds[1..].iter().map(|f| f.metrics.plcc).collect();
    let expected = kept.iter().sum::<f64>() / kept.len() as f64;
    assert!((row.plcc.mean - expected).abs() < 1e-12);
    assert!(row.srocc.mean.is_finite());
}

#[test]
fn cross_dataset_samples_drop_non_finite_rows() {
    let train = source("A", 4, 4, |c, d| {
        let x = d as f64 + 0.2 * c as f64;
        (x, logistic4(x))
    });
    let mut cross = source("B", 3, 4, |c, d| {
        let x = 0.5 + d as f64 + 0.3 * c as f64;
        (x, logistic4(x))
    });
    cross.objective.scores[(1, 0)] = f64::NAN;
    cross.objective.scores[(6, 0)] = f64::INFINITY;

    let models = vec![ModelSpec::Linear.build()];
    let outcomes = evaluate_all(&[train, cross], &models, &EvalSettings::default());
    let report = outcomes[0].result.as_ref().unwrap();

    let to_b: Vec<&FoldMetrics> = report
        .folds
        .iter()
        .filter(|f| f.target == "B")
        .map(|f| &f.metrics)
        .collect();
    assert!(!to_b.is_empty());
    assert!(to_b.iter().all(|m| m.is_complete()));

    let row = report.rows.iter().find(|r| r.dataset == "B").unwrap();
    assert!(row.plcc.mean.is_finite());
    assert!(row.rmse.mean.is_finite());
}

#[test]
fn parallel_and_serial_runs_agree() {
    let ds = source("D1", 5, 4, |c, d| {
        let x = d as f64 + 0.15 * c as f64;
        (x, logistic4(x) + 0.05 * ((c * 7 + d * 3) % 5) as f64)
    });
    let models = vec![ModelSpec::Linear.build(), ModelSpec::Knn { k: 3 }.build()];
    let serial = evaluate_all(std::slice::from_ref(&ds), &models, &EvalSettings::default());
    let parallel = evaluate_all(
        &[ds],
        &models,
        &EvalSettings {
            parallel: true,
            ..EvalSettings::default()
        },
    );

    let s = serial[0].result.as_ref().unwrap();
    let p = parallel[0].result.as_ref().unwrap();
    assert_eq!(s.folds.len(), p.folds.len());
    for (a, b) in s.folds.iter().zip(&p.folds) {
        assert_eq!(a.fold, b.fold);
        assert_eq!(a.model, b.model);
        assert_eq!(a.test_contents, b.test_contents);
        assert!(same_metrics(&a.metrics, &b.metrics), "{a:?} vs {b:?}");
    }
    for (a, b) in s.rows.iter().zip(&p.rows) {
        assert!(same_metric(a.plcc.mean, b.plcc.mean));
        assert!(same_metric(a.rmse.std, b.rmse.std));
    }
}

#[test]
fn synthetic_experiment_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let spec = SynthSpec {
        datasets: 2,
        num_contents: 5,
        num_distortions: 4,
        nan_fraction: 0.05,
        hidden_references: true,
        ..SynthSpec::default()
    };
    let config_path = write_experiment(&spec, dir.path()).unwrap();

    let config = ExperimentConfig::load(&config_path).unwrap();
    assert_eq!(config.datasets.len(), 2);
    assert_eq!(config.datasets[0].hidden_references, vec![0, 5, 10, 15, 20]);

    let run = run_experiment(&config).unwrap();
    assert!(run.failures.is_empty(), "{:?}", run.failures);
    assert_eq!(run.reports.len(), 2);

    let perf = fs::read_to_string(dir.path().join("results/D1/perf.csv")).unwrap();
    let lines: Vec<&str> = perf.lines().collect();
    assert_eq!(
        lines[0],
        "dataset,regModel,PLCCavg,PLCCstd,SROCCavg,SROCCstd,RMSEavg,RMSEstd"
    );
    // 2 models x 2 target datasets.
    assert_eq!(lines.len(), 5);
    assert!(lines[1].starts_with("D1,LinearRegression,"));
    assert!(lines[2].starts_with("D2,LinearRegression,"));
    assert!(lines[3].starts_with("D1,KNN,"));

    let folds = fs::read_to_string(dir.path().join("results/D2/folds.csv")).unwrap();
    // C(5,1) folds x 2 models x 2 targets, plus header.
    assert_eq!(folds.lines().count(), 1 + 5 * 2 * 2);

    let summary: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("results/summary.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(summary["reports"].as_array().map(|r| r.len()), Some(2));
    assert_eq!(summary["curve"], "logistic_4params");
}

#[test]
fn unreadable_sheet_only_loses_its_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let spec = SynthSpec {
        datasets: 3,
        num_contents: 4,
        num_distortions: 3,
        ..SynthSpec::default()
    };
    let config_path = write_experiment(&spec, dir.path()).unwrap();
    fs::write(dir.path().join("D3/obj.csv"), "stimulus,p1\nD3_c00_d00,oops\n").unwrap();

    let config = ExperimentConfig::load(&config_path).unwrap();
    let run = run_experiment(&config).unwrap();

    assert_eq!(run.reports.len(), 2);
    assert_eq!(run.failures.len(), 1);
    assert_eq!(run.failures[0].0, "D3");
    assert!(matches!(run.failures[0].1, EvalError::InvalidInput(_)));

    let perf = fs::read_to_string(dir.path().join("results/D1/perf.csv")).unwrap();
    assert!(perf.lines().any(|l| l == "D3,LinearRegression,,,,,,"), "{perf}");
    assert!(!dir.path().join("results/D3").exists());

    let summary: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("results/summary.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(summary["failures"][0]["training_dataset"], "D3");
}
