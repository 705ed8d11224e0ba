//! Random forest regression: bagged CART trees with variance-reduction splits.
//!
//! Each tree is grown on a bootstrap sample drawn from its own seeded `StdRng`
//! (`seed + tree index`), so a forest is reproducible and trees can be grown on
//! the rayon pool in any order. Every split considers all predictors; the
//! threshold is the midpoint between two adjacent distinct values.

use nalgebra::{DMatrix, DVector};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::error::EvalError;
use crate::models::{Predictor, Regressor, check_feature_width, check_training_set};

pub const DEFAULT_TREES: usize = 100;

/// Nodes with fewer samples than this become leaves.
const MIN_SAMPLES_SPLIT: usize = 2;

#[derive(Debug, Clone)]
pub struct ForestRegressor {
    name: String,
    trees: usize,
    max_depth: Option<usize>,
    seed: u64,
}

impl ForestRegressor {
    pub fn new(trees: usize, max_depth: Option<usize>, seed: u64) -> Self {
        let name = match (trees, max_depth) {
            (DEFAULT_TREES, None) => "RandomForest".to_string(),
            (n, None) => format!("RandomForest(n={n})"),
            (n, Some(d)) => format!("RandomForest(n={n},depth={d})"),
        };
        Self {
            name,
            trees: trees.max(1),
            max_depth,
            seed,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match self.nodes[at] {
                Node::Leaf(v) => return v,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => at = if row[feature] <= threshold { left } else { right },
            }
        }
    }
}

/// Mean of the tree predictions.
#[derive(Debug, Clone)]
pub struct ForestPredictor {
    width: usize,
    trees: Vec<Tree>,
}

impl Regressor for ForestRegressor {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(
        &self,
        features: &DMatrix<f64>,
        targets: &DVector<f64>,
    ) -> Result<Box<dyn Predictor>, EvalError> {
        check_training_set(features, targets)?;

        // Row-major copy: splits scan one feature across many rows.
        let rows: Vec<Vec<f64>> = features
            .row_iter()
            .map(|r| r.iter().copied().collect())
            .collect();
        let y = targets.as_slice();
        let n = rows.len();

        let trees = (0..self.trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(t as u64));
                let mut sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut builder = TreeBuilder {
                    rows: &rows,
                    y,
                    max_depth: self.max_depth,
                    nodes: Vec::new(),
                };
                builder.grow(&mut sample, 0);
                Tree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        Ok(Box::new(ForestPredictor {
            width: features.ncols(),
            trees,
        }))
    }
}

impl Predictor for ForestPredictor {
    fn predict(&self, features: &DMatrix<f64>) -> Result<DVector<f64>, EvalError> {
        check_feature_width(features, self.width)?;

        let mut out = DVector::<f64>::zeros(features.nrows());
        let mut row = vec![0.0; self.width];
        for (i, query) in features.row_iter().enumerate() {
            for (slot, v) in row.iter_mut().zip(query.iter()) {
                *slot = *v;
            }
            let sum: f64 = self.trees.iter().map(|t| t.predict(&row)).sum();
            out[i] = sum / self.trees.len() as f64;
        }
        Ok(out)
    }
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    y: &'a [f64],
    max_depth: Option<usize>,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl TreeBuilder<'_> {
    /// Grow the subtree over `sample` and return its node index.
    fn grow(&mut self, sample: &mut [usize], depth: usize) -> usize {
        let at = self.nodes.len();
        let mean = sample.iter().map(|&i| self.y[i]).sum::<f64>() / sample.len() as f64;
        self.nodes.push(Node::Leaf(mean));

        let depth_left = self.max_depth.is_none_or(|d| depth < d);
        if sample.len() < MIN_SAMPLES_SPLIT || !depth_left {
            return at;
        }
        let Some(best) = self.best_split(sample) else {
            return at;
        };

        // Partition in place: left side first.
        sample.sort_by(|&a, &b| {
            let ka = self.rows[a][best.feature] > best.threshold;
            let kb = self.rows[b][best.feature] > best.threshold;
            ka.cmp(&kb)
        });
        let split = sample
            .iter()
            .position(|&i| self.rows[i][best.feature] > best.threshold)
            .unwrap_or(sample.len());
        let (left_sample, right_sample) = sample.split_at_mut(split);

        let left = self.grow(left_sample, depth + 1);
        let right = self.grow(right_sample, depth + 1);
        self.nodes[at] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        at
    }

    /// Split minimising the summed within-child squared error, if it beats the parent.
    fn best_split(&self, sample: &[usize]) -> Option<BestSplit> {
        let n = sample.len() as f64;
        let total: f64 = sample.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = sample.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let parent_sse = total_sq - total * total / n;
        if parent_sse <= 1e-12 * total_sq.max(1.0) {
            return None;
        }

        let width = self.rows[sample[0]].len();
        let mut order = sample.to_vec();
        let mut best: Option<BestSplit> = None;

        for feature in 0..width {
            order.sort_by(|&a, &b| self.rows[a][feature].total_cmp(&self.rows[b][feature]));

            let (mut sum_l, mut sq_l) = (0.0, 0.0);
            for k in 1..order.len() {
                let prev = order[k - 1];
                sum_l += self.y[prev];
                sq_l += self.y[prev] * self.y[prev];

                let lo = self.rows[prev][feature];
                let hi = self.rows[order[k]][feature];
                if lo == hi {
                    continue;
                }

                let n_l = k as f64;
                let n_r = n - n_l;
                let sum_r = total - sum_l;
                let sse = (sq_l - sum_l * sum_l / n_l) + (total_sq - sq_l - sum_r * sum_r / n_r);
                if best.as_ref().is_none_or(|b| sse < b.sse) {
                    best = Some(BestSplit {
                        feature,
                        threshold: 0.5 * (lo + hi),
                        sse,
                    });
                }
            }
        }

        best.filter(|b| b.sse < parent_sse)
    }
}
