//! Correlation and error statistics.
//!
//! Conventions:
//! - Undefined results (fewer than two samples, zero variance) are NaN, never a panic.
//! - Standard deviation is the population form (`ddof = 0`).
//! - Spearman ranks use the average rank for ties.

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; NaN for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Mean and population standard deviation of the non-NaN values.
///
/// Returns `(NaN, NaN)` when every value is NaN.
pub fn nan_mean_std(values: &[f64]) -> (f64, f64) {
    let kept: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    (mean(&kept), std_dev(&kept))
}

/// Pearson linear correlation coefficient.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return f64::NAN;
    }
    // The mean of identical values can be off by an ulp, so check constancy directly.
    if is_constant(x) || is_constant(y) {
        return f64::NAN;
    }
    let mx = mean(x);
    let my = mean(y);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (&a, &b) in x.iter().zip(y.iter()) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denom = (sxx * syy).sqrt();
    if !(denom.is_finite() && denom > 0.0) {
        return f64::NAN;
    }
    (sxy / denom).clamp(-1.0, 1.0)
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

/// Spearman rank-order correlation coefficient.
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return f64::NAN;
    }
    if x.iter().chain(y.iter()).any(|v| v.is_nan()) {
        return f64::NAN;
    }
    pearson(&average_ranks(x), &average_ranks(y))
}

/// Root mean squared error between predictions and targets.
pub fn rmse(predicted: &[f64], actual: &[f64]) -> f64 {
    if predicted.len() != actual.len() || predicted.is_empty() {
        return f64::NAN;
    }
    let sse: f64 = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| (p - a) * (p - a))
        .sum();
    (sse / predicted.len() as f64).sqrt()
}

/// 1-based ranks, tied values share the mean of their positions.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end (0-based) share rank mean(start+1..=end).
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pearson_of_affine_relation_is_one() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 2.0).collect();
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);

        let neg: Vec<f64> = x.iter().map(|v| -v).collect();
        assert!((pearson(&x, &neg) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_is_nan_for_constant_input() {
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
        assert!(pearson(&[1.0], &[1.0]).is_nan());
        assert!(pearson(&[0.1, 0.1, 0.1], &[1.0, 2.0, 4.0]).is_nan());
        assert!(pearson(&[1.0, 2.0, 4.0], &[0.1, 0.1, 0.1]).is_nan());
        assert!(pearson(&[], &[]).is_nan());
    }

    #[test]
    fn spearman_of_monotone_relation_is_one() {
        let x = [0.1, 0.5, 0.7, 2.0, 9.0];
        let y: Vec<f64> = x.iter().map(|v: &f64| v.exp()).collect();
        assert!((spearman(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn average_ranks_share_ties() {
        let ranks = average_ranks(&[10.0, 20.0, 10.0, 30.0]);
        assert_eq!(ranks, vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn spearman_with_ties_matches_reference() {
        // Reference value from a standard implementation: 0.9486832980505138.
        let x = [1.0, 2.0, 2.0, 3.0];
        let y = [1.0, 2.0, 3.0, 4.0];
        assert!((spearman(&x, &y) - 0.948_683_298_050_513_8).abs() < 1e-12);
    }

    #[test]
    fn rmse_matches_hand_computation() {
        let r = rmse(&[1.0, 2.0, 3.0], &[1.0, 2.0, 5.0]);
        assert!((r - (4.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!(rmse(&[], &[]).is_nan());
    }

    #[test]
    fn nan_mean_std_ignores_nan() {
        let (m, s) = nan_mean_std(&[1.0, f64::NAN, 3.0]);
        assert!((m - 2.0).abs() < 1e-12);
        assert!((s - 1.0).abs() < 1e-12);

        let (m, s) = nan_mean_std(&[f64::NAN, f64::NAN]);
        assert!(m.is_nan() && s.is_nan());
    }
}
