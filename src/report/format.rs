//! Formatted terminal output.
//!
//! Formatting lives here so the evaluation code stays free of presentation
//! concerns and output changes stay localized.

use crate::domain::{MetricSummary, ReportRow, RunReport};
use crate::eval::{EvalSettings, Partitions};

/// Header plus the report table for one training dataset.
pub fn format_run_summary(report: &RunReport, settings: &EvalSettings) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== mxv - trained on {} ===\n", report.training_dataset));
    out.push_str(&format!(
        "Ratio: {} | Curve: {} | Folds: {}\n\n",
        settings.ratio,
        settings.curve,
        fold_count(report)
    ));
    out.push_str(&format_report_table(&report.rows));
    out
}

pub fn format_report_table(rows: &[ReportRow]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<16} {:<20} {:>17} {:>17} {:>17}\n",
            "dataset", "model", "PLCC", "SROCC", "RMSE"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<16} {:-<20} {:-<17} {:-<17} {:-<17}\n",
            "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:<16} {:<20} {:>17} {:>17} {:>17}\n",
                truncate(&r.dataset, 16),
                truncate(&r.model, 20),
                fmt_summary(r.plcc),
                fmt_summary(r.srocc),
                fmt_summary(r.rmse),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// One line per fold: `fold  test=[..]  train=[..]`.
pub fn format_partitions(n: usize, ratio: f64, partitions: &Partitions) -> String {
    let mut out = format!("n={n} ratio={ratio} folds={}\n", partitions.len());
    for (i, (test, train)) in partitions.iter().enumerate() {
        out.push_str(&format!("{:>4}  test={test:?}  train={train:?}\n", i + 1));
    }
    out
}

fn fold_count(report: &RunReport) -> usize {
    report.folds.iter().map(|f| f.fold).max().unwrap_or(0)
}

fn fmt_summary(s: MetricSummary) -> String {
    if s.mean.is_finite() {
        format!("{:.4} ± {:.4}", s.mean, s.std)
    } else {
        "n/a".to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
