//! Reporting utilities: formatted terminal output of run reports.

pub mod format;

pub use format::*;
