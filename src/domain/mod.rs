//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums (`CurveType`) and dataset layout (`DatasetMeta`)
//! - aligned score data (`Dataset`, built from `ObjectiveTable` + `SubjectiveTable`)
//! - evaluation outputs (`FoldMetrics`, `ReportRow`, `RunReport`)

pub mod dataset;
pub mod types;

pub use dataset::*;
pub use types::*;
