//! Levenberg–Marquardt solver for the logistic families.
//!
//! Each iteration solves the damped Gauss–Newton step
//!
//! ```text
//! minimize ||J δ - r||^2 + λ ||D δ||^2
//! ```
//!
//! as the stacked least squares problem `[J; sqrt(λ) D] δ = [r; 0]` with the
//! SVD solver from `math::ols`. `D` holds the running maximum of the Jacobian
//! column norms (Marquardt scaling), and `λ` follows Nielsen's update rule.
//!
//! Termination mirrors MINPACK's tests: relative cost reduction (`ftol`),
//! relative step size (`xtol`), gradient size (`gtol`). Exceeding the function
//! evaluation budget is an error, never a silent partial fit.

use nalgebra::{DMatrix, DVector};

use crate::domain::CurveType;
use crate::error::EvalError;
use crate::fit::logistic::{fill_jacobian_row, predict};
use crate::math::solve_least_squares;

/// Default function evaluation budget.
pub const DEFAULT_MAX_EVALUATIONS: usize = 20_000;

/// Below this (relative to `||y||^2`) the residual is treated as exact.
const EXACT_FIT: f64 = 1e-30;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e32;

#[derive(Debug, Clone, Copy)]
pub struct SolverOptions {
    pub max_evaluations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 1e-14,
        }
    }
}

/// Converged solver state.
#[derive(Debug, Clone)]
pub struct LmFit {
    pub betas: Vec<f64>,
    /// Sum of squared residuals at `betas`.
    pub sse: f64,
    pub evaluations: usize,
}

/// Fit `curve` to `(x, y)` starting from `init`.
pub fn levenberg_marquardt(
    curve: CurveType,
    x: &[f64],
    y: &[f64],
    init: &[f64],
    opts: &SolverOptions,
) -> Result<LmFit, EvalError> {
    let n = x.len();
    let m = curve.param_count();
    if init.len() != m {
        return Err(EvalError::invalid_input(format!(
            "{curve} expects {m} initial parameters, got {}",
            init.len()
        )));
    }
    if init.iter().any(|b| !b.is_finite()) {
        return Err(EvalError::curve_fit(format!(
            "non-finite initial parameters for {curve}: {init:?}"
        )));
    }

    let mut betas = DVector::from_row_slice(init);
    let mut resid = residuals(curve, x, y, betas.as_slice());
    let mut sse = resid.norm_squared();
    let mut evaluations = 1usize;
    if !sse.is_finite() {
        return Err(EvalError::curve_fit(format!(
            "initial guess for {curve} produces non-finite predictions"
        )));
    }

    let y_scale = y.iter().map(|v| v * v).sum::<f64>().max(1.0);
    let mut jac = DMatrix::<f64>::zeros(n, m);
    let mut scale = vec![0.0_f64; m];
    let mut lambda = LAMBDA_INIT;
    let mut nu = 2.0;

    loop {
        if sse <= EXACT_FIT * y_scale {
            return Ok(LmFit {
                betas: betas.iter().copied().collect(),
                sse,
                evaluations,
            });
        }

        fill_jacobian(curve, x, betas.as_slice(), &mut jac);
        if jac.iter().any(|v| !v.is_finite()) {
            return Err(EvalError::curve_fit(format!("non-finite Jacobian for {curve}")));
        }

        let grad = jac.transpose() * &resid;
        if grad.amax() <= opts.gtol {
            return Ok(LmFit {
                betas: betas.iter().copied().collect(),
                sse,
                evaluations,
            });
        }

        update_scale(&jac, &mut scale);

        // Inner loop: shrink the trust region until a step lowers the cost.
        loop {
            if evaluations >= opts.max_evaluations {
                return Err(EvalError::curve_fit(format!(
                    "{curve} did not converge within {} function evaluations",
                    opts.max_evaluations
                )));
            }
            if lambda > LAMBDA_MAX {
                return Err(EvalError::curve_fit(format!(
                    "{curve} stalled: damping grew without reducing the residual"
                )));
            }

            let Some(delta) = damped_step(&jac, &resid, &scale, lambda) else {
                lambda *= nu;
                nu *= 2.0;
                continue;
            };

            let trial = &betas + &delta;
            let trial_resid = residuals(curve, x, y, trial.as_slice());
            let trial_sse = trial_resid.norm_squared();
            evaluations += 1;

            let step_small = delta.norm() <= opts.xtol * (betas.norm() + opts.xtol);

            if trial_sse.is_finite() && trial_sse < sse {
                let predicted_sse = (&resid - &jac * &delta).norm_squared();
                let actual = sse - trial_sse;
                let predicted = (sse - predicted_sse).max(f64::MIN_POSITIVE);
                let rho = actual / predicted;

                let actual_rel = actual / sse;
                let predicted_rel = predicted / sse;

                betas = trial;
                resid = trial_resid;
                sse = trial_sse;

                lambda *= (1.0_f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3));
                nu = 2.0;

                if (actual_rel <= opts.ftol && predicted_rel <= opts.ftol) || step_small {
                    return Ok(LmFit {
                        betas: betas.iter().copied().collect(),
                        sse,
                        evaluations,
                    });
                }
                break;
            }

            if step_small {
                // No representable step improves the fit: we are at the minimum.
                return Ok(LmFit {
                    betas: betas.iter().copied().collect(),
                    sse,
                    evaluations,
                });
            }
            lambda *= nu;
            nu *= 2.0;
        }
    }
}

fn residuals(curve: CurveType, x: &[f64], y: &[f64], betas: &[f64]) -> DVector<f64> {
    DVector::from_iterator(
        x.len(),
        x.iter().zip(y.iter()).map(|(&xi, &yi)| yi - predict(curve, xi, betas)),
    )
}

fn fill_jacobian(curve: CurveType, x: &[f64], betas: &[f64], jac: &mut DMatrix<f64>) {
    let mut row = vec![0.0; jac.ncols()];
    for (i, &xi) in x.iter().enumerate() {
        fill_jacobian_row(curve, xi, betas, &mut row);
        for (j, v) in row.iter().enumerate() {
            jac[(i, j)] = *v;
        }
    }
}

/// Keep the largest column norm seen so far, with a floor so that parameters
/// whose column vanishes (e.g. `β1` of the 5-param form at `β2 = 0`) are still damped.
fn update_scale(jac: &DMatrix<f64>, scale: &mut [f64]) {
    for (j, s) in scale.iter_mut().enumerate() {
        *s = s.max(jac.column(j).norm());
    }
    let max = scale.iter().copied().fold(0.0, f64::max);
    let floor = if max > 0.0 { max * 1e-8 } else { 1.0 };
    for s in scale.iter_mut() {
        *s = s.max(floor);
    }
}

fn damped_step(
    jac: &DMatrix<f64>,
    resid: &DVector<f64>,
    scale: &[f64],
    lambda: f64,
) -> Option<DVector<f64>> {
    let (n, m) = jac.shape();
    let mut a = DMatrix::<f64>::zeros(n + m, m);
    a.view_mut((0, 0), (n, m)).copy_from(jac);
    let root = lambda.sqrt();
    for (j, s) in scale.iter().enumerate() {
        a[(n + j, j)] = root * s;
    }

    let mut b = DVector::<f64>::zeros(n + m);
    b.rows_mut(0, n).copy_from(resid);

    solve_least_squares(&a, &b)
}
