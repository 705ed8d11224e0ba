//! Logistic rescaling of raw predictions onto the MOS scale.
//!
//! Objective predictors (and regressors built on them) rarely produce scores on
//! the subjective scale, so before scoring each fold the predictions are passed
//! through a monotone logistic fitted against the ground-truth MOS.

use crate::domain::CurveType;
use crate::error::EvalError;
use crate::fit::lm::{SolverOptions, levenberg_marquardt};
use crate::fit::logistic::{initial_betas, predict};

/// A fitted logistic mapping plus its predictions on the fitting inputs.
#[derive(Debug, Clone)]
pub struct CurveFit {
    pub curve: CurveType,
    pub betas: Vec<f64>,
    /// `ŷ` for each input `x`, same order.
    pub fitted: Vec<f64>,
    pub sse: f64,
    pub evaluations: usize,
}

/// Rescale `x` onto the scale of `y` with the given curve family.
pub fn fit_curve(x: &[f64], y: &[f64], curve: CurveType) -> Result<Vec<f64>, EvalError> {
    fit_curve_with(x, y, curve, &SolverOptions::default()).map(|fit| fit.fitted)
}

/// Same as [`fit_curve`] with the family given by name (`logistic_4params` / `logistic_5params`).
pub fn fit_curve_named(x: &[f64], y: &[f64], curve: &str) -> Result<Vec<f64>, EvalError> {
    let curve: CurveType = curve.parse()?;
    fit_curve(x, y, curve)
}

/// Fit with explicit solver options and return the full fit.
pub fn fit_curve_with(
    x: &[f64],
    y: &[f64],
    curve: CurveType,
    opts: &SolverOptions,
) -> Result<CurveFit, EvalError> {
    if x.len() != y.len() {
        return Err(EvalError::invalid_input(format!(
            "curve fit needs equal lengths, got {} predictions and {} targets",
            x.len(),
            y.len()
        )));
    }
    if x.is_empty() {
        return Err(EvalError::empty_partition("no samples to fit a curve on"));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(EvalError::curve_fit("non-finite prediction or target value"));
    }

    let init = initial_betas(curve, x, y);
    let lm = levenberg_marquardt(curve, x, y, &init, opts)?;

    let fitted: Vec<f64> = x.iter().map(|&xi| predict(curve, xi, &lm.betas)).collect();
    if fitted.iter().any(|v| !v.is_finite()) {
        return Err(EvalError::curve_fit(format!(
            "{curve} fit produced non-finite predictions"
        )));
    }

    Ok(CurveFit {
        curve,
        betas: lm.betas,
        fitted,
        sse: lm.sse,
        evaluations: lm.evaluations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{pearson, rmse};

    #[test]
    fn four_param_round_trip_has_near_zero_rmse() {
        let truth = [4.6, 1.1, 52.0, 9.0];
        // Unevenly spaced raw scores, not sorted.
        let x: Vec<f64> = (0..30).map(|i| ((i * 37) % 30) as f64 * 3.5 + 5.0).collect();
        let y: Vec<f64> = x.iter().map(|&v| predict(CurveType::Logistic4, v, &truth)).collect();

        let fitted = fit_curve(&x, &y, CurveType::Logistic4).unwrap();
        assert_eq!(fitted.len(), x.len());
        assert!(rmse(&fitted, &y) < 1e-6, "rmse={}", rmse(&fitted, &y));
    }

    #[test]
    fn five_param_fit_tracks_linear_data() {
        let x: Vec<f64> = (0..21).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 0.5 * v + 3.0).collect();

        let fit = fit_curve_with(&x, &y, CurveType::Logistic5, &SolverOptions::default()).unwrap();
        assert_eq!(fit.fitted.len(), x.len());
        assert!(pearson(&fit.fitted, &y) > 0.99);

        let init = initial_betas(CurveType::Logistic5, &x, &y);
        let init_pred: Vec<f64> = x
            .iter()
            .map(|&v| predict(CurveType::Logistic5, v, &init))
            .collect();
        assert!(rmse(&fit.fitted, &y) <= rmse(&init_pred, &y));
    }

    #[test]
    fn unknown_curve_name_is_rejected() {
        let err = fit_curve_named(&[1.0, 2.0], &[1.0, 2.0], "logistic_2params").unwrap_err();
        assert!(matches!(err, EvalError::InvalidCurveType(_)));
        assert!(fit_curve_named(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.5], "logistic_4params").is_ok());
    }

    #[test]
    fn empty_input_is_an_empty_partition() {
        let err = fit_curve(&[], &[], CurveType::Logistic4).unwrap_err();
        assert!(matches!(err, EvalError::EmptyPartition(_)));
    }

    #[test]
    fn constant_predictions_fail_to_fit() {
        // std(x) = 0 makes the 4-param initial slope degenerate.
        let err = fit_curve(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0], CurveType::Logistic4).unwrap_err();
        assert!(matches!(err, EvalError::CurveFit(_)), "{err:?}");
    }

    #[test]
    fn two_points_fit_exactly() {
        let fitted = fit_curve(&[1.0, 2.0], &[3.0, 4.0], CurveType::Logistic4).unwrap();
        assert!(rmse(&fitted, &[3.0, 4.0]) < 1e-6);
    }

    #[test]
    fn mismatched_lengths_are_invalid_input() {
        let err = fit_curve(&[1.0, 2.0], &[1.0], CurveType::Logistic4).unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));
    }
}
