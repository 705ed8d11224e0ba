//! Least squares solver.
//!
//! Two places in this crate reduce to a small dense least squares problem
//!
//! ```text
//! minimize ||A x - b||^2
//! ```
//!
//! - the `linear`/`ridge` regressors (design matrix = features + intercept)
//! - every damped Levenberg–Marquardt step in the curve fitter
//!   (design matrix = Jacobian stacked on the damping rows)
//!
//! Implementation choices:
//! - SVD, so tall and rank-deficient systems are solved without panicking.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Predictor columns are often nearly collinear, so the singular value cutoff
//!   is relaxed progressively before giving up.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if a.nrows() == 0 || a.ncols() == 0 || a.nrows() != b.len() {
        return None;
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    let svd = a.clone().svd(true, true);
    let max_sv = svd.singular_values.max();

    for &rel_tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(x) = svd.solve(b, rel_tol * max_sv.max(f64::MIN_POSITIVE)) {
            if x.iter().all(|v| v.is_finite()) {
                return Some(x);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let b = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let x = solve_least_squares(&a, &b).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-10);
        assert!((x[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn least_squares_handles_collinear_columns() {
        // Second and third columns are identical; the minimum-norm solution splits the weight.
        let a = DMatrix::from_row_slice(3, 3, &[1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 1.0, 3.0, 3.0]);
        let b = DVector::from_row_slice(&[3.0, 5.0, 7.0]);

        let x = solve_least_squares(&a, &b).unwrap();
        let fitted = &a * &x;
        for (f, t) in fitted.iter().zip(b.iter()) {
            assert!((f - t).abs() < 1e-9);
        }
        assert!((x[1] - x[2]).abs() < 1e-9);
    }

    #[test]
    fn least_squares_rejects_non_finite_input() {
        let a = DMatrix::from_row_slice(2, 1, &[1.0, f64::NAN]);
        let b = DVector::from_row_slice(&[1.0, 2.0]);
        assert!(solve_least_squares(&a, &b).is_none());
    }
}
