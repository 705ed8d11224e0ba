//! `mos-xval` library crate.
//!
//! Cross-dataset cross-validation of regression models that fuse objective
//! quality predictors into a single score for mean opinion score (MOS)
//! prediction.
//!
//! The binary (`mxv`) is a thin wrapper around this library so that:
//!
//! - the evaluation pipeline is testable without spawning processes
//! - regression strategies and curve fitting are reusable on their own

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod eval;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
