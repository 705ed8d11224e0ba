//! Logistic curve families used to rescale predictions onto the MOS scale.
//!
//! The fitter relies on three primitive operations per family:
//! - initial parameter guess from the data
//! - evaluate `ŷ(x)` given betas
//! - fill a Jacobian row `∂ŷ/∂β` (for Levenberg–Marquardt)

use crate::domain::CurveType;
use crate::math::{mean, std_dev};

/// Initial betas for the given family.
///
/// - 4 params: `[max(y), min(y), mean(x), std(x)/4]`
/// - 5 params: `[10, 0, mean(y), 0.1, 0.1]`
pub fn initial_betas(curve: CurveType, x: &[f64], y: &[f64]) -> Vec<f64> {
    match curve {
        CurveType::Logistic4 => {
            let y_max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let y_min = y.iter().copied().fold(f64::INFINITY, f64::min);
            vec![y_max, y_min, mean(x), std_dev(x) / 4.0]
        }
        CurveType::Logistic5 => vec![10.0, 0.0, mean(y), 0.1, 0.1],
    }
}

/// Evaluate `ŷ(x)` for the given family.
///
/// # Panics
/// Panics if `betas` does not have length `curve.param_count()`.
pub fn predict(curve: CurveType, x: f64, betas: &[f64]) -> f64 {
    match curve {
        CurveType::Logistic4 => {
            let (b1, b2, b3, b4) = (betas[0], betas[1], betas[2], betas[3]);
            (b1 - b2) / (1.0 + (-(x - b3) / b4).exp()) + b2
        }
        CurveType::Logistic5 => {
            let (b1, b2, b3, b4, b5) = (betas[0], betas[1], betas[2], betas[3], betas[4]);
            let logistic_part = 0.5 - 1.0 / (1.0 + (b2 * (x - b3)).exp());
            b1 * logistic_part + b4 * x + b5
        }
    }
}

/// Fill `∂ŷ/∂β` at `x`.
///
/// # Panics
/// Panics if `betas` or `out` do not have length `curve.param_count()`.
pub fn fill_jacobian_row(curve: CurveType, x: f64, betas: &[f64], out: &mut [f64]) {
    match curve {
        CurveType::Logistic4 => {
            let (b1, b2, b3, b4) = (betas[0], betas[1], betas[2], betas[3]);
            let u = (x - b3) / b4;
            // s = 1 / (1 + e^{-u});  ds/du = s (1 - s)
            let s = logistic(u);
            let ds = s * (1.0 - s);
            let span = b1 - b2;
            out[0] = s;
            out[1] = 1.0 - s;
            out[2] = -span * ds / b4;
            out[3] = -span * ds * u / b4;
        }
        CurveType::Logistic5 => {
            let (b1, b2, b3) = (betas[0], betas[1], betas[2]);
            let v = b2 * (x - b3);
            // q = 1 / (1 + e^{v});  dq/dv = -q (1 - q)
            let q = logistic(-v);
            let dpart_dv = q * (1.0 - q);
            out[0] = 0.5 - q;
            out[1] = b1 * dpart_dv * (x - b3);
            out[2] = -b1 * dpart_dv * b2;
            out[3] = x;
            out[4] = 1.0;
        }
    }
}

/// Numerically stable `1 / (1 + e^{-u})`.
fn logistic(u: f64) -> f64 {
    if u >= 0.0 {
        1.0 / (1.0 + (-u).exp())
    } else {
        let e = u.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_jacobian(curve: CurveType, x: f64, betas: &[f64]) -> Vec<f64> {
        let h = 1e-6;
        (0..betas.len())
            .map(|j| {
                let mut up = betas.to_vec();
                let mut dn = betas.to_vec();
                up[j] += h;
                dn[j] -= h;
                (predict(curve, x, &up) - predict(curve, x, &dn)) / (2.0 * h)
            })
            .collect()
    }

    #[test]
    fn jacobians_match_finite_differences() {
        let cases = [
            (CurveType::Logistic4, vec![4.5, 1.2, 0.3, 0.8]),
            (CurveType::Logistic5, vec![3.0, 1.5, 0.2, 0.4, 2.0]),
        ];
        for (curve, betas) in cases {
            for &x in &[-2.0, -0.3, 0.0, 0.7, 3.1] {
                let mut row = vec![0.0; curve.param_count()];
                fill_jacobian_row(curve, x, &betas, &mut row);
                let num = numeric_jacobian(curve, x, &betas);
                for (a, b) in row.iter().zip(num.iter()) {
                    assert!((a - b).abs() < 1e-6, "{curve}: analytic {a} vs numeric {b} at x={x}");
                }
            }
        }
    }

    #[test]
    fn four_param_initial_guess() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 5.0, 3.0, 1.0];
        let b = initial_betas(CurveType::Logistic4, &x, &y);
        assert_eq!(b[0], 5.0);
        assert_eq!(b[1], 1.0);
        assert!((b[2] - 2.5).abs() < 1e-12);
        assert!((b[3] - 1.25f64.sqrt() / 4.0).abs() < 1e-12);
    }

    #[test]
    fn five_param_initial_guess_uses_mean_of_y() {
        let b = initial_betas(CurveType::Logistic5, &[0.0, 1.0], &[2.0, 4.0]);
        assert_eq!(b, vec![10.0, 0.0, 3.0, 0.1, 0.1]);
    }

    #[test]
    fn four_param_midpoint() {
        let y = predict(CurveType::Logistic4, 0.5, &[5.0, 1.0, 0.5, 2.0]);
        assert!((y - 3.0).abs() < 1e-12);
    }
}
