//! Linear regression (ordinary least squares and ridge).
//!
//! Both variants solve one augmented least squares problem with the shared SVD
//! solver:
//!
//! ```text
//! [ 1  X        ] [b0]   [y]
//! [ 0  sqrt(α)I ] [b ] = [0]
//! ```
//!
//! With `α = 0` the penalty rows are omitted and this is plain OLS.

use nalgebra::{DMatrix, DVector};

use crate::error::EvalError;
use crate::math::solve_least_squares;
use crate::models::{Predictor, Regressor, check_feature_width, check_training_set};

#[derive(Debug, Clone)]
pub struct LinearRegressor {
    name: String,
    alpha: f64,
}

impl LinearRegressor {
    pub fn ols() -> Self {
        Self {
            name: "LinearRegression".to_string(),
            alpha: 0.0,
        }
    }

    pub fn ridge(alpha: f64) -> Self {
        let name = if alpha == 1.0 {
            "Ridge".to_string()
        } else {
            format!("Ridge(alpha={alpha})")
        };
        Self { name, alpha }
    }
}

/// Fitted intercept + coefficients.
#[derive(Debug, Clone)]
pub struct LinearPredictor {
    pub intercept: f64,
    pub coefficients: DVector<f64>,
}

impl Regressor for LinearRegressor {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(
        &self,
        features: &DMatrix<f64>,
        targets: &DVector<f64>,
    ) -> Result<Box<dyn Predictor>, EvalError> {
        check_training_set(features, targets)?;

        let (n, p) = features.shape();
        let penalty_rows = if self.alpha > 0.0 { p } else { 0 };

        let mut design = DMatrix::<f64>::zeros(n + penalty_rows, p + 1);
        design.view_mut((0, 0), (n, 1)).fill(1.0);
        design.view_mut((0, 1), (n, p)).copy_from(features);
        let root = self.alpha.sqrt();
        for j in 0..penalty_rows {
            design[(n + j, j + 1)] = root;
        }

        let mut rhs = DVector::<f64>::zeros(n + penalty_rows);
        rhs.rows_mut(0, n).copy_from(targets);

        let beta = solve_least_squares(&design, &rhs)
            .ok_or_else(|| EvalError::model(format!("{}: least squares solve failed", self.name)))?;

        Ok(Box::new(LinearPredictor {
            intercept: beta[0],
            coefficients: beta.rows(1, p).into_owned(),
        }))
    }
}

impl Predictor for LinearPredictor {
    fn predict(&self, features: &DMatrix<f64>) -> Result<DVector<f64>, EvalError> {
        check_feature_width(features, self.coefficients.len())?;
        Ok(features * &self.coefficients + DVector::from_element(features.nrows(), self.intercept))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> (DMatrix<f64>, DVector<f64>) {
        // y = 1 + 2 a - 0.5 b
        let x = DMatrix::from_row_slice(
            5,
            2,
            &[0.0, 1.0, 1.0, 0.0, 2.0, 3.0, 3.0, 1.0, 4.0, 5.0],
        );
        let y = DVector::from_iterator(5, x.row_iter().map(|r| 1.0 + 2.0 * r[0] - 0.5 * r[1]));
        (x, y)
    }

    #[test]
    fn ols_recovers_exact_coefficients() {
        let (x, y) = toy();
        let model = LinearRegressor::ols().fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-9);
        }
    }

    #[test]
    fn ridge_shrinks_coefficients() {
        let (x, y) = toy();
        let ols = LinearRegressor::ols().fit(&x, &y).unwrap();
        let ridge = LinearRegressor::ridge(10.0).fit(&x, &y).unwrap();

        // Predict at the origin and both unit vectors to read back the coefficients.
        let query = DMatrix::from_row_slice(3, 2, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        let coef_norm = |m: &dyn Predictor| {
            let p = m.predict(&query).unwrap();
            ((p[1] - p[0]).powi(2) + (p[2] - p[0]).powi(2)).sqrt()
        };
        assert!(coef_norm(ridge.as_ref()) < coef_norm(ols.as_ref()));
    }

    #[test]
    fn rejects_wrong_feature_width() {
        let (x, y) = toy();
        let model = LinearRegressor::ols().fit(&x, &y).unwrap();
        let err = model.predict(&DMatrix::zeros(2, 3)).unwrap_err();
        assert!(matches!(err, EvalError::Model(_)));
    }

    #[test]
    fn empty_training_set_is_an_empty_partition() {
        let err = LinearRegressor::ols()
            .fit(&DMatrix::zeros(0, 2), &DVector::zeros(0))
            .err()
            .unwrap();
        assert!(matches!(err, EvalError::EmptyPartition(_)));
    }
}
