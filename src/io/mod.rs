//! Input/output helpers.
//!
//! - CSV ingest of objective/subjective score sheets (`ingest`)
//! - report exports (CSV/JSON) (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
