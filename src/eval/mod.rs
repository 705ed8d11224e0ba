//! Cross-validation pipeline.
//!
//! - `partition`: combinatorial content splits
//! - `samples`: partition → cleaned feature/target samples
//! - `driver`: fit → predict → rescale → score loop and metric aggregation

pub mod driver;
pub mod partition;
pub mod samples;

pub use driver::*;
pub use partition::*;
pub use samples::*;
