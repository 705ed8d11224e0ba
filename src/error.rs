//! Error types.
//!
//! - `EvalError` is the library error: every evaluation stage returns it, and the
//!   driver decides whether a given kind is fatal or degrades into NaN metrics.
//! - `AppError` is the binary boundary error carrying a process exit code.

use thiserror::Error;

/// Errors produced by the evaluation pipeline.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Objective and subjective stimulus orderings disagree.
    #[error("Stimulus order mismatch in dataset '{dataset}': {detail}")]
    Alignment { dataset: String, detail: String },

    /// Stimulus count does not match `num_contents * num_distortions`.
    #[error(
        "Dataset '{dataset}' has {rows} stimuli, expected {expected} ({num_contents} contents x {num_distortions} distortions)"
    )]
    DatasetShape {
        dataset: String,
        rows: usize,
        expected: usize,
        num_contents: usize,
        num_distortions: usize,
    },

    /// The nonlinear solver failed to produce a usable fit.
    #[error("Curve fit failed: {0}")]
    CurveFit(String),

    /// Unknown curve family selector.
    #[error("Invalid curve type '{0}': expected logistic_4params or logistic_5params")]
    InvalidCurveType(String),

    /// A fold has no samples on one side.
    #[error("Empty partition: {0}")]
    EmptyPartition(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    pub fn curve_fit(msg: impl Into<String>) -> Self {
        Self::CurveFit(msg.into())
    }

    pub fn empty_partition(msg: impl Into<String>) -> Self {
        Self::EmptyPartition(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether a fold may absorb this error as NaN metrics and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EvalError::CurveFit(_) | EvalError::EmptyPartition(_) | EvalError::Model(_)
        )
    }

    /// Exit code used when this error reaches the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            EvalError::Alignment { .. } | EvalError::DatasetShape { .. } => 3,
            EvalError::CurveFit(_) | EvalError::EmptyPartition(_) | EvalError::Model(_) => 4,
            _ => 2,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<EvalError> for AppError {
    fn from(err: EvalError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
