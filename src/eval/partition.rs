//! Combinatorial train/test partitions over content indices.
//!
//! With `n` contents and a test ratio `r`, `k = round(n r)` contents are held
//! out per fold and every one of the `C(n, k)` choices becomes a fold. Rounding
//! is half-to-even, so `n r = 2.5` holds out 2 contents.

use serde::Serialize;

use crate::error::EvalError;

/// Aligned test/train content partitions: fold `i` is `(test[i], train[i])`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partitions {
    pub test: Vec<Vec<usize>>,
    pub train: Vec<Vec<usize>>,
}

impl Partitions {
    pub fn len(&self) -> usize {
        self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[usize], &[usize])> {
        self.test
            .iter()
            .zip(self.train.iter())
            .map(|(t, r)| (t.as_slice(), r.as_slice()))
    }
}

/// Number of contents held out for testing.
pub fn test_size(n: usize, ratio: f64) -> Result<usize, EvalError> {
    if !(ratio.is_finite() && (0.0..=1.0).contains(&ratio)) {
        return Err(EvalError::invalid_input(format!(
            "test ratio must be within [0, 1], got {ratio}"
        )));
    }
    let k = (n as f64 * ratio).round_ties_even() as usize;
    Ok(k.min(n))
}

/// Every test partition of size `round(n * ratio)` with its complementary train partition.
pub fn generate_partitions(n: usize, ratio: f64) -> Result<Partitions, EvalError> {
    let k = test_size(n, ratio)?;
    let test = combinations(n, k);
    let train = test
        .iter()
        .map(|held_out| (0..n).filter(|c| !held_out.contains(c)).collect())
        .collect();
    Ok(Partitions { test, train })
}

/// All `k`-combinations of `0..n`, in lexicographic order.
pub fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut current: Vec<usize> = (0..k).collect();
    loop {
        out.push(current.clone());

        // Rightmost position that can still be advanced.
        let Some(i) = (0..k).rev().find(|&i| current[i] < n - k + i) else {
            return out;
        };
        current[i] += 1;
        for j in (i + 1)..k {
            current[j] = current[j - 1] + 1;
        }
    }
}

/// `C(n, k)`, saturating at `u128::MAX`.
pub fn binomial(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        // Exact at every step: acc * (n - i) is divisible by (i + 1).
        acc = match acc.checked_mul((n - i) as u128) {
            Some(v) => v / (i as u128 + 1),
            None => return u128::MAX,
        };
    }
    acc
}
