//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - sets up logging
//! - runs experiments, lists partitions, or generates synthetic data
//! - prints reports

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, PartitionArgs, RunArgs, SynthArgs};
use crate::config::{CONFIG_ENV, ExperimentConfig};
use crate::data::{SynthSpec, write_experiment};
use crate::error::AppError;
use crate::eval::generate_partitions;

pub mod pipeline;

/// Entry point for the `mxv` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Partitions(args) => handle_partitions(args),
        Command::Synth(args) => handle_synth(args),
    }
}

/// `RUST_LOG` wins over `-v`/`-q` when set.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let path = config_path(&args)?;
    let mut config = ExperimentConfig::load(&path)?;
    apply_overrides(&mut config, &args);

    let run = pipeline::run_experiment(&config)?;

    for report in &run.reports {
        println!("{}", crate::report::format_run_summary(report, &run.settings));
    }
    for paths in &run.exports {
        println!("wrote {} and {}", paths.report.display(), paths.folds.display());
    }
    if let Some(path) = &run.summary {
        println!("wrote {}", path.display());
    }

    for (name, err) in &run.failures {
        warn!(dataset = %name, error = %err, "no report for this training dataset");
    }
    // Partial success still exits 0; only a run with no usable rotation fails.
    if run.reports.is_empty() {
        if let Some((_, err)) = run.failures.into_iter().next() {
            return Err(err.into());
        }
    }
    Ok(())
}

fn handle_partitions(args: PartitionArgs) -> Result<(), AppError> {
    let partitions = generate_partitions(args.n, args.ratio)?;
    print!("{}", crate::report::format_partitions(args.n, args.ratio, &partitions));
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let spec = SynthSpec {
        datasets: args.datasets,
        num_contents: args.contents,
        num_distortions: args.distortions,
        predictors: args.predictors,
        seed: args.seed,
        nan_fraction: args.nan_fraction,
        hidden_references: args.hidden_references,
        noise: args.noise,
    };
    let path = write_experiment(&spec, &args.out)?;
    info!(path = %path.display(), "synthetic experiment ready");
    println!("{}", path.display());
    Ok(())
}

fn config_path(args: &RunArgs) -> Result<PathBuf, AppError> {
    if let Some(path) = &args.config {
        return Ok(path.clone());
    }
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
        _ => Err(AppError::new(
            2,
            format!("No experiment config given. Pass --config or set {CONFIG_ENV}."),
        )),
    }
}

/// Command-line flags take precedence over the config file.
pub fn apply_overrides(config: &mut ExperimentConfig, args: &RunArgs) {
    if let Some(ratio) = args.ratio {
        config.ratio = ratio;
    }
    if let Some(curve) = args.curve {
        config.curve = curve;
    }
    if !args.models.is_empty() {
        config.models = args.models.clone();
    }
    if args.parallel {
        config.parallel = true;
    }
    if let Some(out) = &args.out {
        config.output_dir = out.clone();
    }
    if let Some(max) = args.max_evaluations {
        config.max_evaluations = max;
    }
    if args.json {
        config.summary_json = true;
    }
}
