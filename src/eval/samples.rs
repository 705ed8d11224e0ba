//! Partition → sample extraction with data cleaning.
//!
//! Rows are laid out content-major: content `c` owns rows
//! `[c * num_distortions, (c + 1) * num_distortions)`. After gathering, any row
//! with a NaN or infinite predictor is dropped from features and targets
//! together, using a keep-mask so relative order is preserved.

use nalgebra::{DMatrix, DVector};

use crate::error::EvalError;

/// Cleaned features/targets for one side of a fold.
#[derive(Debug, Clone)]
pub struct Samples {
    pub features: DMatrix<f64>,
    pub targets: DVector<f64>,
    /// Source row index of each kept sample.
    pub rows: Vec<usize>,
    /// Rows gathered but removed for non-finite predictors.
    pub dropped: usize,
}

impl Samples {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Row indices covered by `contents`, in partition order.
pub fn content_rows(contents: &[usize], num_distortions: usize) -> Vec<usize> {
    contents
        .iter()
        .flat_map(|&c| c * num_distortions..(c + 1) * num_distortions)
        .collect()
}

pub fn extract_samples(
    objective: &DMatrix<f64>,
    subjective: &DVector<f64>,
    contents: &[usize],
    num_distortions: usize,
) -> Result<Samples, EvalError> {
    if objective.nrows() != subjective.len() {
        return Err(EvalError::invalid_input(format!(
            "{} objective rows but {} subjective values",
            objective.nrows(),
            subjective.len()
        )));
    }

    let gathered = content_rows(contents, num_distortions);
    if let Some(&bad) = gathered.iter().find(|&&r| r >= objective.nrows()) {
        return Err(EvalError::invalid_input(format!(
            "row {bad} is out of range for {} stimuli",
            objective.nrows()
        )));
    }

    let keep: Vec<bool> = gathered
        .iter()
        .map(|&r| objective.row(r).iter().all(|v| v.is_finite()))
        .collect();
    let rows: Vec<usize> = gathered
        .iter()
        .zip(keep.iter())
        .filter_map(|(&r, &k)| k.then_some(r))
        .collect();

    Ok(Samples {
        features: objective.select_rows(rows.iter()),
        targets: subjective.select_rows(rows.iter()),
        dropped: gathered.len() - rows.len(),
        rows,
    })
}
