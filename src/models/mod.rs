//! Regression strategies that fuse predictor columns into one quality score.
//!
//! Every strategy implements the same two-step capability (`Regressor::fit`
//! returning an owned `Predictor`) so the evaluation driver never needs to know
//! which algorithm it is running.

pub mod forest;
pub mod knn;
pub mod linear;
pub mod regressor;

pub use forest::*;
pub use knn::*;
pub use linear::*;
pub use regressor::*;
