//! Shared "experiment pipeline" logic used by the `run` command and the integration tests.
//!
//! config -> read score sheets -> every dataset rotation -> CSV/JSON exports
//!
//! The command handler then only deals with presentation.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::config::ExperimentConfig;
use crate::domain::RunReport;
use crate::error::EvalError;
use crate::eval::{EvalSettings, evaluate_inputs};
use crate::io::{ExportPaths, FailedRun, Summary, write_run_report, write_summary_json};
use crate::models::Regressor;

/// All outputs of a single `mxv run`.
#[derive(Debug)]
pub struct ExperimentOutput {
    pub settings: EvalSettings,
    pub reports: Vec<RunReport>,
    /// Rotations that aborted, with the reason.
    pub failures: Vec<(String, EvalError)>,
    pub exports: Vec<ExportPaths>,
    pub summary: Option<PathBuf>,
}

/// Execute the full experiment described by `config` and write its reports.
///
/// A dataset whose sheets cannot be read or aligned only loses its own
/// rotation. Invalid config and failed report writes abort the run.
pub fn run_experiment(config: &ExperimentConfig) -> Result<ExperimentOutput, EvalError> {
    config.validate()?;

    let sources = config.load_sources();
    let models: Vec<Box<dyn Regressor>> = config.models.iter().map(|m| m.build()).collect();
    let settings = config.settings();
    info!(
        datasets = sources.len(),
        models = models.len(),
        ratio = settings.ratio,
        curve = %settings.curve,
        "experiment started"
    );

    let outcomes = evaluate_inputs(sources, &models, &settings);

    fs::create_dir_all(&config.output_dir)?;
    let mut reports = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    let mut exports = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(report) => {
                let paths = write_run_report(&config.output_dir, &report)?;
                info!(
                    dataset = %report.training_dataset,
                    path = %paths.report.display(),
                    "report written"
                );
                exports.push(paths);
                reports.push(report);
            }
            Err(e) => failures.push((outcome.training_dataset, e)),
        }
    }

    let summary = if config.summary_json {
        let path = config.output_dir.join("summary.json");
        let failed = failures
            .iter()
            .map(|(name, e)| FailedRun {
                training_dataset: name.clone(),
                error: e.to_string(),
            })
            .collect();
        let summary = Summary::new(settings.ratio, settings.curve, &reports, failed);
        write_summary_json(&path, &summary)?;
        Some(path)
    } else {
        None
    };

    Ok(ExperimentOutput {
        settings,
        reports,
        failures,
        exports,
        summary,
    })
}
