//! Mathematical utilities: least squares and correlation statistics.

pub mod ols;
pub mod stats;

pub use ols::*;
pub use stats::*;
