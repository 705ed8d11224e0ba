//! Command-line parsing for the `mxv` cross-validation tool.
//!
//! The goal of this module is to keep **argument parsing** separate from
//! **command dispatch** (`app`) and from the evaluation code.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::CurveType;
use crate::models::ModelSpec;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "mxv",
    version,
    about = "Cross-dataset cross-validation of MOS regression models"
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every dataset rotation from an experiment config and write reports.
    Run(RunArgs),
    /// Print the train/test content splits for `n` contents.
    Partitions(PartitionArgs),
    /// Generate a synthetic experiment (CSV sheets + experiment.toml).
    Synth(SynthArgs),
}

/// Options for `mxv run`. Flags override values from the config file.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Experiment config (TOML). Falls back to `MXV_CONFIG`.
    #[arg(short, long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Fraction of contents held out per fold.
    #[arg(long)]
    pub ratio: Option<f64>,

    /// Logistic curve used to map predictions onto the MOS scale.
    #[arg(long, value_enum)]
    pub curve: Option<CurveType>,

    /// Regression model: linear, ridge[:alpha], knn[:k], forest[:trees].
    /// Repeatable; replaces the config list.
    #[arg(short, long = "model", value_name = "SPEC")]
    pub models: Vec<ModelSpec>,

    /// Evaluate folds in parallel.
    #[arg(long)]
    pub parallel: bool,

    /// Output directory for reports.
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Function-evaluation cap for each curve fit.
    #[arg(long)]
    pub max_evaluations: Option<usize>,

    /// Also write summary.json.
    #[arg(long)]
    pub json: bool,
}

/// Options for `mxv partitions`.
#[derive(Debug, Args, Clone)]
pub struct PartitionArgs {
    /// Number of contents.
    pub n: usize,

    /// Fraction of contents held out per fold.
    #[arg(long, default_value_t = crate::eval::DEFAULT_TEST_RATIO)]
    pub ratio: f64,
}

/// Options for `mxv synth`.
#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Directory that receives the datasets and experiment.toml.
    #[arg(short, long, value_name = "DIR")]
    pub out: PathBuf,

    /// Number of datasets.
    #[arg(long, default_value_t = 2)]
    pub datasets: usize,

    /// Contents per dataset.
    #[arg(long, default_value_t = 6)]
    pub contents: usize,

    /// Distortions per content.
    #[arg(long, default_value_t = 5)]
    pub distortions: usize,

    /// Predictor columns per dataset.
    #[arg(long, default_value_t = 3)]
    pub predictors: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Probability of blanking a predictor cell.
    #[arg(long, default_value_t = 0.0)]
    pub nan_fraction: f64,

    /// MOS noise standard deviation.
    #[arg(long, default_value_t = 0.2)]
    pub noise: f64,

    /// Add a hidden reference row per content to the subjective sheets.
    #[arg(long)]
    pub hidden_references: bool,
}
