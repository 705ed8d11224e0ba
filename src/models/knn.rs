//! k-nearest-neighbours regression (uniform weights, Euclidean distance).

use nalgebra::{DMatrix, DVector};

use crate::error::EvalError;
use crate::models::{Predictor, Regressor, check_feature_width, check_training_set};

#[derive(Debug, Clone)]
pub struct KnnRegressor {
    name: String,
    k: usize,
}

impl KnnRegressor {
    pub fn new(k: usize) -> Self {
        let name = if k == 5 {
            "KNN".to_string()
        } else {
            format!("KNN(k={k})")
        };
        Self { name, k: k.max(1) }
    }
}

/// KNN keeps its training set; prediction averages the `k` closest targets.
#[derive(Debug, Clone)]
pub struct KnnPredictor {
    k: usize,
    features: DMatrix<f64>,
    targets: DVector<f64>,
}

impl Regressor for KnnRegressor {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(
        &self,
        features: &DMatrix<f64>,
        targets: &DVector<f64>,
    ) -> Result<Box<dyn Predictor>, EvalError> {
        check_training_set(features, targets)?;
        Ok(Box::new(KnnPredictor {
            // Small training folds use every sample rather than failing.
            k: self.k.min(features.nrows()),
            features: features.clone(),
            targets: targets.clone(),
        }))
    }
}

impl Predictor for KnnPredictor {
    fn predict(&self, features: &DMatrix<f64>) -> Result<DVector<f64>, EvalError> {
        check_feature_width(features, self.features.ncols())?;

        let mut out = DVector::<f64>::zeros(features.nrows());
        let mut dist: Vec<(f64, usize)> = Vec::with_capacity(self.features.nrows());
        for (i, query) in features.row_iter().enumerate() {
            dist.clear();
            dist.extend(
                self.features
                    .row_iter()
                    .enumerate()
                    .map(|(j, train)| (squared_distance(train.iter(), query.iter()), j)),
            );
            // Ties broken by training order so results are deterministic.
            dist.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let sum: f64 = dist[..self.k].iter().map(|&(_, j)| self.targets[j]).sum();
            out[i] = sum / self.k as f64;
        }
        Ok(out)
    }
}

fn squared_distance<'a>(
    a: impl Iterator<Item = &'a f64>,
    b: impl Iterator<Item = &'a f64>,
) -> f64 {
    a.zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
