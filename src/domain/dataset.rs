//! Aligned objective/subjective data for one dataset.
//!
//! A `Dataset` can only be built through [`Dataset::align`], which checks that
//! both score sources list the same stimuli in the same order and that the row
//! count matches the dataset's content/distortion layout.

use nalgebra::{DMatrix, DVector};

use crate::domain::DatasetMeta;
use crate::error::EvalError;

/// Objective predictor scores: one row per stimulus, one column per predictor.
#[derive(Debug, Clone)]
pub struct ObjectiveTable {
    pub stimuli: Vec<String>,
    pub predictors: Vec<String>,
    pub scores: DMatrix<f64>,
}

/// Subjective ratings: one MOS value per stimulus.
#[derive(Debug, Clone)]
pub struct SubjectiveTable {
    pub stimuli: Vec<String>,
    pub mos: DVector<f64>,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub meta: DatasetMeta,
    pub stimuli: Vec<String>,
    pub objective: DMatrix<f64>,
    pub subjective: DVector<f64>,
}

impl Dataset {
    pub fn align(
        meta: DatasetMeta,
        objective: ObjectiveTable,
        subjective: SubjectiveTable,
    ) -> Result<Self, EvalError> {
        if let Some(detail) = first_mismatch(&objective.stimuli, &subjective.stimuli) {
            return Err(EvalError::Alignment {
                dataset: meta.name.clone(),
                detail,
            });
        }

        let rows = objective.stimuli.len();
        if objective.scores.nrows() != rows || subjective.mos.len() != rows {
            return Err(EvalError::invalid_input(format!(
                "Dataset '{}': {} stimulus ids but {} objective rows and {} MOS values",
                meta.name,
                rows,
                objective.scores.nrows(),
                subjective.mos.len()
            )));
        }
        if rows != meta.expected_rows() || meta.num_distortions == 0 {
            return Err(EvalError::DatasetShape {
                dataset: meta.name.clone(),
                rows,
                expected: meta.expected_rows(),
                num_contents: meta.num_contents,
                num_distortions: meta.num_distortions,
            });
        }

        Ok(Self {
            meta,
            stimuli: objective.stimuli,
            objective: objective.scores,
            subjective: subjective.mos,
        })
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Every content index, i.e. the whole dataset as one partition.
    pub fn all_contents(&self) -> Vec<usize> {
        (0..self.meta.num_contents).collect()
    }
}

fn first_mismatch(objective: &[String], subjective: &[String]) -> Option<String> {
    if let Some((idx, (o, s))) = objective
        .iter()
        .zip(subjective.iter())
        .enumerate()
        .find(|(_, (o, s))| o != s)
    {
        return Some(format!(
            "row {idx}: objective has '{o}', subjective has '{s}'"
        ));
    }
    if objective.len() != subjective.len() {
        return Some(format!(
            "objective lists {} stimuli, subjective lists {}",
            objective.len(),
            subjective.len()
        ));
    }
    None
}
