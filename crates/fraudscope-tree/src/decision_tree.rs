use fraudscope_core::{ClassCounts, Classifier, FraudError, FraudResult, Label, Matrix, Stage};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// A node in the tree arena. The root is at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Internal node: rows with `row[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Leaf: share of fraud among the training rows that reached it.
    Leaf { fraud_fraction: f64, n_samples: usize },
}

/// Best threshold found for one node.
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Sample-weighted Gini decrease.
    decrease: f64,
}

/// Decision Tree Classifier using the CART algorithm (Gini impurity).
///
/// Nodes live in a flat arena so a fitted tree serializes without nesting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features sampled at each split; `None` considers all of them.
    pub max_features: Option<usize>,
    pub seed: u64,
    nodes: Vec<Node>,
    n_features: usize,
    importances: Vec<f64>,
}

impl DecisionTreeClassifier {
    pub fn new(max_depth: Option<usize>, min_samples_split: usize, min_samples_leaf: usize) -> Self {
        DecisionTreeClassifier {
            max_depth,
            min_samples_split,
            min_samples_leaf,
            max_features: None,
            seed: 42,
            nodes: Vec::new(),
            n_features: 0,
            importances: Vec::new(),
        }
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit on every row of `x`.
    pub fn fit(&mut self, x: &Matrix, y: &[Label]) -> FraudResult<()> {
        check_training_set(x, y)?;
        let samples: Vec<usize> = (0..x.n_rows()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.grow(x, y, samples, &mut rng);
        Ok(())
    }

    /// Fit on the given rows (repeats allowed). `samples` must be non-empty.
    ///
    /// Nodes are expanded depth-first, left child before right, from an
    /// explicit work stack, so tree depth is bounded by memory rather than
    /// by the thread's stack.
    pub(crate) fn grow(&mut self, x: &Matrix, y: &[Label], samples: Vec<usize>, rng: &mut StdRng) {
        self.n_features = x.n_cols();
        self.nodes.clear();
        self.importances = vec![0.0; self.n_features];

        let mut pending = vec![(self.push_leaf(y, &samples), samples, 0usize)];
        while let Some((idx, samples, depth)) = pending.pop() {
            let Some(best) = self.try_split(x, y, &samples, depth, rng) else {
                continue;
            };
            let (left, right): (Vec<usize>, Vec<usize>) = samples
                .into_iter()
                .partition(|&i| x.get(i, best.feature) <= best.threshold);
            self.importances[best.feature] += best.decrease;

            let left_idx = self.push_leaf(y, &left);
            let right_idx = self.push_leaf(y, &right);
            self.nodes[idx] = Node::Split {
                feature: best.feature,
                threshold: best.threshold,
                left: left_idx,
                right: right_idx,
            };
            pending.push((right_idx, right, depth + 1));
            pending.push((left_idx, left, depth + 1));
        }
    }

    fn push_leaf(&mut self, y: &[Label], samples: &[usize]) -> usize {
        let n_fraud = samples.iter().filter(|&&i| y[i] == Label::Fraud).count();
        self.nodes.push(Node::Leaf {
            fraud_fraction: n_fraud as f64 / samples.len() as f64,
            n_samples: samples.len(),
        });
        self.nodes.len() - 1
    }

    /// Best split for a node, or `None` when it stays a leaf.
    fn try_split(
        &self,
        x: &Matrix,
        y: &[Label],
        samples: &[usize],
        depth: usize,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n = samples.len();
        let n_fraud = samples.iter().filter(|&&i| y[i] == Label::Fraud).count();
        let depth_reached = self.max_depth.map_or(false, |d| depth >= d);
        if depth_reached || n < self.min_samples_split || n_fraud == 0 || n_fraud == n {
            return None;
        }
        self.best_split(x, y, samples, n_fraud, rng)
    }

    /// Scan sampled features once each in sorted order with running class
    /// counts.
    ///
    /// Features are drawn in random order until `max_features` non-constant
    /// ones have been scanned. Constant features do not count, and drawing
    /// continues past the quota while no valid threshold has been found.
    fn best_split(
        &self,
        x: &Matrix,
        y: &[Label],
        samples: &[usize],
        n_fraud: usize,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n = samples.len();
        let p = self.n_features;
        let k = self.max_features.unwrap_or(p).clamp(1, p);

        let mut features: Vec<usize> = (0..p).collect();
        features.shuffle(rng);

        let parent = weighted_gini(n_fraud, n);
        let mut best: Option<SplitCandidate> = None;
        let mut column: Vec<(f64, bool)> = Vec::with_capacity(n);
        let mut scanned = 0;

        for &feature in &features {
            if scanned >= k && best.is_some() {
                break;
            }
            column.clear();
            column.extend(samples.iter().map(|&i| (x.get(i, feature), y[i] == Label::Fraud)));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));
            if column[0].0 == column[n - 1].0 {
                continue;
            }
            scanned += 1;

            let mut left_fraud = 0usize;
            for i in 0..n - 1 {
                if column[i].1 {
                    left_fraud += 1;
                }
                if column[i].0 == column[i + 1].0 {
                    continue;
                }
                let n_left = i + 1;
                let n_right = n - n_left;
                if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                    continue;
                }

                let impurity =
                    weighted_gini(left_fraud, n_left) + weighted_gini(n_fraud - left_fraud, n_right);
                let decrease = parent - impurity;
                if best.as_ref().map_or(true, |b| decrease > b.decrease) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: midpoint(column[i].0, column[i + 1].0),
                        decrease,
                    });
                }
            }
        }
        best
    }

    pub fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Length of the longest root-to-leaf path; 0 for a single leaf.
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match self.nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    stack.push((*left, d + 1));
                    stack.push((*right, d + 1));
                }
                Some(Node::Leaf { .. }) => max_depth = max_depth.max(d),
                None => {}
            }
        }
        max_depth
    }

    /// Raw (unnormalized) Gini decrease per feature.
    pub(crate) fn raw_importances(&self) -> &[f64] {
        &self.importances
    }

    /// Gini importance per feature, normalized to sum to 1 (all zeros for a
    /// tree that never split).
    pub fn feature_importances(&self) -> Vec<f64> {
        normalize(&self.importances)
    }

    /// Fraud probability for one row; the caller checks the row width.
    pub(crate) fn leaf_value(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { fraud_fraction, .. } => return *fraud_fraction,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

impl Classifier for DecisionTreeClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, x: &Matrix) -> FraudResult<Vec<f64>> {
        check_prediction_input(self.is_fitted(), self.n_features, x)?;
        Ok(x.rows().map(|row| self.leaf_value(row)).collect())
    }
}

/// Gini impurity of a binary node times its sample count.
fn weighted_gini(n_fraud: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = n_fraud as f64 / n as f64;
    n as f64 * 2.0 * p * (1.0 - p)
}

/// Threshold between two distinct sorted values that keeps `a` on the left.
fn midpoint(a: f64, b: f64) -> f64 {
    let m = a + (b - a) / 2.0;
    if m >= b {
        a
    } else {
        m
    }
}

pub(crate) fn normalize(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.iter().map(|v| v / total).collect()
    } else {
        vec![0.0; values.len()]
    }
}

/// Reject training sets no tree can learn a boundary from.
pub(crate) fn check_training_set(x: &Matrix, y: &[Label]) -> FraudResult<()> {
    if x.n_rows() != y.len() {
        return Err(FraudError::invalid_input(
            Stage::Train,
            format!("{} rows but {} labels", x.n_rows(), y.len()),
        ));
    }
    if y.is_empty() {
        return Err(FraudError::Train {
            reason: "training subset is empty".into(),
        });
    }
    if x.n_cols() == 0 {
        return Err(FraudError::Train {
            reason: "training subset has no feature columns".into(),
        });
    }
    let counts = ClassCounts::from_labels(y);
    for label in Label::ALL {
        if counts.get(label) == 0 {
            return Err(FraudError::Train {
                reason: format!(
                    "training subset contains a single class ({}), no boundary to learn",
                    label.other()
                ),
            });
        }
    }
    Ok(())
}

pub(crate) fn check_prediction_input(fitted: bool, n_features: usize, x: &Matrix) -> FraudResult<()> {
    if !fitted {
        return Err(FraudError::invalid_input(Stage::Evaluate, "model is not fitted"));
    }
    if x.n_cols() != n_features {
        return Err(FraudError::invalid_input(
            Stage::Evaluate,
            format!("input has {} features, model expects {n_features}", x.n_cols()),
        ));
    }
    Ok(())
}
