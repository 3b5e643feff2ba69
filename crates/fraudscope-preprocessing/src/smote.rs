//! Synthetic minority oversampling (SMOTE).

use fraudscope_core::{BalanceConfig, ClassCounts, Dataset, FraudError, FraudResult, Label, Stage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Minimum minority records needed to interpolate between neighbours.
pub const MIN_MINORITY: usize = 2;

/// Class counts before and after balancing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub before: ClassCounts,
    pub after: ClassCounts,
    /// Oversampled class; `None` when the input was already balanced.
    pub minority: Option<Label>,
    pub synthetic: usize,
}

/// Oversamples the minority class until both classes have equal counts.
#[derive(Debug, Clone)]
pub struct Smote {
    k_neighbors: usize,
    seed: u64,
}

impl Smote {
    pub fn new() -> Self {
        Smote {
            k_neighbors: 5,
            seed: 42,
        }
    }

    pub fn from_config(config: &BalanceConfig) -> Self {
        Smote::new()
            .with_k_neighbors(config.k_neighbors)
            .with_seed(config.seed)
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Original rows first, then the synthetic minority rows.
    #[instrument(skip_all, fields(rows = data.len(), k = self.k_neighbors))]
    pub fn balance(&self, data: &Dataset) -> FraudResult<(Dataset, BalanceReport)> {
        let before = data.class_counts();
        if data.is_empty() {
            return Err(FraudError::EmptyDataset {
                stage: Stage::Balance,
                rows_in: 0,
            });
        }

        let minority = match before.minority() {
            Some(label) => label,
            None => {
                info!("classes already balanced");
                return Ok((
                    data.clone(),
                    BalanceReport {
                        before,
                        after: before,
                        minority: None,
                        synthetic: 0,
                    },
                ));
            }
        };

        let m = before.get(minority);
        if m < MIN_MINORITY {
            return Err(FraudError::Imbalance {
                minority: minority.to_string(),
                count: m,
                required: MIN_MINORITY,
            });
        }

        let minority_rows: Vec<&[f64]> = (0..data.len())
            .filter(|&i| data.labels()[i] == minority)
            .map(|i| data.row(i))
            .collect();
        let k = self.k_neighbors.min(m - 1);
        let neighbors = nearest_neighbors(&minority_rows, k);

        let n_to_generate = before.get(minority.other()) - m;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut out = data.clone();
        let mut synthetic = vec![0.0; data.n_features()];

        for _ in 0..n_to_generate {
            let base_idx = rng.gen_range(0..m);
            let neighbor_idx = neighbors[base_idx][rng.gen_range(0..k)];
            let gap: f64 = rng.gen();

            let base = minority_rows[base_idx];
            let neighbor = minority_rows[neighbor_idx];
            for ((s, &b), &n) in synthetic.iter_mut().zip(base).zip(neighbor) {
                *s = b + gap * (n - b);
            }
            out.push(&synthetic, minority)?;
        }

        let after = out.class_counts();
        info!(
            %minority,
            synthetic = n_to_generate,
            legitimate = after.legitimate,
            fraud = after.fraud,
            "balanced classes"
        );
        Ok((
            out,
            BalanceReport {
                before,
                after,
                minority: Some(minority),
                synthetic: n_to_generate,
            },
        ))
    }
}

impl Default for Smote {
    fn default() -> Self {
        Self::new()
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// The `k` nearest other rows of each row, closest first.
/// Equal distances are broken by row order so the result is deterministic.
fn nearest_neighbors(rows: &[&[f64]], k: usize) -> Vec<Vec<usize>> {
    rows.par_iter()
        .enumerate()
        .map(|(i, row)| {
            let mut dists: Vec<(f64, usize)> = rows
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(j, other)| (squared_distance(row, other), j))
                .collect();
            dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            dists.truncate(k);
            dists.into_iter().map(|(_, j)| j).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudscope_core::Matrix;

    fn imbalanced(n_major: usize, n_minor: usize) -> Dataset {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_major {
            rows.push(vec![(i % 5) as f64, (i / 5) as f64]);
            labels.push(Label::Legitimate);
        }
        for i in 0..n_minor {
            rows.push(vec![10.0 + (i % 3) as f64, 10.0 + (i / 3) as f64]);
            labels.push(Label::Fraud);
        }
        Dataset::new(
            vec!["V1".into(), "V2".into()],
            Matrix::from_rows(&rows).unwrap(),
            labels,
        )
        .unwrap()
    }

    #[test]
    fn test_classes_end_equal() {
        let data = imbalanced(20, 5);
        let (balanced, report) = Smote::new().with_k_neighbors(3).balance(&data).unwrap();
        let counts = balanced.class_counts();
        assert_eq!(counts.legitimate, counts.fraud);
        assert_eq!(balanced.len(), 40);
        assert_eq!(report.synthetic, 15);
        assert_eq!(report.minority, Some(Label::Fraud));
        assert_eq!(report.before.fraud, 5);
    }

    #[test]
    fn test_originals_come_first() {
        let data = imbalanced(20, 5);
        let (balanced, _) = Smote::new().balance(&data).unwrap();
        for i in 0..data.len() {
            assert_eq!(balanced.row(i), data.row(i));
            assert_eq!(balanced.labels()[i], data.labels()[i]);
        }
    }

    #[test]
    fn test_synthetic_rows_lie_within_minority_hull() {
        let data = imbalanced(30, 4);
        let (balanced, _) = Smote::new().balance(&data).unwrap();
        for i in data.len()..balanced.len() {
            let row = balanced.row(i);
            assert_eq!(balanced.labels()[i], Label::Fraud);
            assert!(row[0] >= 10.0 && row[0] <= 12.0);
            assert!(row[1] >= 10.0 && row[1] <= 11.0);
        }
    }

    #[test]
    fn test_same_seed_same_output() {
        let data = imbalanced(20, 5);
        let (a, _) = Smote::new().with_seed(9).balance(&data).unwrap();
        let (b, _) = Smote::new().with_seed(9).balance(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_too_few_minority_rows() {
        let err = Smote::new().balance(&imbalanced(10, 1)).unwrap_err();
        assert!(matches!(err, FraudError::Imbalance { count: 1, required: 2, .. }));

        let err = Smote::new().balance(&imbalanced(10, 0)).unwrap_err();
        assert!(matches!(err, FraudError::Imbalance { count: 0, .. }));
    }

    #[test]
    fn test_already_balanced_is_unchanged() {
        let data = imbalanced(3, 3);
        let (out, report) = Smote::new().balance(&data).unwrap();
        assert_eq!(out, data);
        assert_eq!(report.synthetic, 0);
        assert_eq!(report.minority, None);
    }

    #[test]
    fn test_neighbors_exclude_self() {
        let a = [0.0];
        let b = [1.0];
        let c = [5.0];
        let rows: Vec<&[f64]> = vec![&a[..], &b[..], &c[..]];
        let nn = nearest_neighbors(&rows, 1);
        assert_eq!(nn, vec![vec![1], vec![0], vec![1]]);
    }
}
