//! Export run reports to CSV/JSON.
//!
//! Layout under the output directory:
//!
//! - `<training dataset>/perf.csv`: one row per (model, target dataset)
//! - `<training dataset>/folds.csv`: one row per (model, fold, target dataset)
//! - `summary.json`: every run report plus a generation timestamp (optional)
//!
//! Non-finite metrics are written as empty CSV cells so spreadsheets treat them as blanks.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{CurveType, FoldRecord, ReportRow, RunReport};
use crate::error::EvalError;

pub const REPORT_HEADER: [&str; 8] = [
    "dataset", "regModel", "PLCCavg", "PLCCstd", "SROCCavg", "SROCCstd", "RMSEavg", "RMSEstd",
];

pub const FOLDS_HEADER: [&str; 7] = [
    "model",
    "fold",
    "test_contents",
    "target",
    "plcc",
    "srocc",
    "rmse",
];

/// Files written for one training dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub report: PathBuf,
    pub folds: PathBuf,
}

/// Write `perf.csv` and `folds.csv` for one run under `out_dir/<training dataset>/`.
pub fn write_run_report(out_dir: &Path, report: &RunReport) -> Result<ExportPaths, EvalError> {
    let dir = out_dir.join(&report.training_dataset);
    fs::create_dir_all(&dir)?;

    let paths = ExportPaths {
        report: dir.join("perf.csv"),
        folds: dir.join("folds.csv"),
    };
    write_report_csv(File::create(&paths.report)?, &report.rows)?;
    write_folds_csv(File::create(&paths.folds)?, &report.folds)?;
    Ok(paths)
}

pub fn write_report_csv<W: Write>(out: W, rows: &[ReportRow]) -> Result<(), EvalError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(REPORT_HEADER)?;
    for row in rows {
        writer.write_record([
            row.dataset.clone(),
            row.model.clone(),
            cell(row.plcc.mean),
            cell(row.plcc.std),
            cell(row.srocc.mean),
            cell(row.srocc.std),
            cell(row.rmse.mean),
            cell(row.rmse.std),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_folds_csv<W: Write>(out: W, folds: &[FoldRecord]) -> Result<(), EvalError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(FOLDS_HEADER)?;
    for f in folds {
        let contents = f
            .test_contents
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writer.write_record([
            f.model.clone(),
            f.fold.to_string(),
            contents,
            f.target.clone(),
            cell(f.metrics.plcc),
            cell(f.metrics.srocc),
            cell(f.metrics.rmse),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Rotation that could not be evaluated at all.
#[derive(Debug, Clone, Serialize)]
pub struct FailedRun {
    pub training_dataset: String,
    pub error: String,
}

/// JSON summary of a whole experiment. Non-finite metrics serialize as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct Summary<'a> {
    pub tool: &'static str,
    pub generated_at: DateTime<Utc>,
    pub ratio: f64,
    pub curve: CurveType,
    pub reports: &'a [RunReport],
    pub failures: Vec<FailedRun>,
}

impl<'a> Summary<'a> {
    pub fn new(
        ratio: f64,
        curve: CurveType,
        reports: &'a [RunReport],
        failures: Vec<FailedRun>,
    ) -> Self {
        Self {
            tool: "mxv",
            generated_at: Utc::now(),
            ratio,
            curve,
            reports,
            failures,
        }
    }
}

pub fn write_summary_json(path: &Path, summary: &Summary<'_>) -> Result<(), EvalError> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, summary)?;
    out.flush()?;
    Ok(())
}

fn cell(v: f64) -> String {
    if v.is_finite() { v.to_string() } else { String::new() }
}
