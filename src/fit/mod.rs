//! Curve fitting.
//!
//! Responsibilities:
//!
//! - logistic families: initial guesses, evaluation, Jacobians (`logistic`)
//! - bounded Levenberg–Marquardt solver (`lm`)
//! - the public rescaling entry points used by the evaluation driver (`curve`)

pub mod curve;
pub mod lm;
pub mod logistic;

pub use curve::*;
pub use lm::{DEFAULT_MAX_EVALUATIONS, LmFit, SolverOptions, levenberg_marquardt};
