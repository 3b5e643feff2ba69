use fraudscope_core::{Dataset, FraudError, FraudResult, Label, Stage};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

/// Disjoint train/test partition of one dataset.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
    /// Row indices into the source dataset.
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Split data into training and test sets.
///
/// Permutes `0..n` with a seeded RNG; the first `n - round(n * test_fraction)`
/// permuted rows form the training set. Same seed and input give the same
/// partition.
pub fn train_test_split(data: &Dataset, test_fraction: f64, seed: u64) -> FraudResult<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(FraudError::config(
            Stage::Split,
            "test_fraction",
            format!("must be in (0, 1), got {test_fraction}"),
        ));
    }

    let n = data.len();
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_size = (n as f64 * test_fraction).round() as usize;
    let train_size = n - test_size;
    if test_size == 0 || train_size == 0 {
        return Err(FraudError::config(
            Stage::Split,
            "test_fraction",
            format!("{test_fraction} of {n} rows leaves one side empty"),
        ));
    }

    let test_indices = indices.split_off(train_size);
    let train_indices = indices;
    debug!(train = train_size, test = test_size, seed, "split dataset");

    Ok(Split {
        train: data.subset(&train_indices),
        test: data.subset(&test_indices),
        train_indices,
        test_indices,
    })
}

/// One cross-validation fold.
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// K-fold splitter over row indices.
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize) -> FraudResult<Self> {
        if n_splits < 2 {
            return Err(FraudError::config(
                Stage::Tune,
                "n_folds",
                format!("must be at least 2, got {n_splits}"),
            ));
        }
        Ok(KFold {
            n_splits,
            shuffle: true,
            seed: 42,
        })
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Contiguous folds over the (optionally shuffled) row order; the first
    /// `n % k` folds hold one extra row.
    pub fn split(&self, n_samples: usize) -> FraudResult<Vec<Fold>> {
        if n_samples < self.n_splits {
            return Err(FraudError::config(
                Stage::Tune,
                "n_folds",
                format!("{} folds need at least as many rows, got {n_samples}", self.n_splits),
            ));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.seed);
            indices.shuffle(&mut rng);
        }

        let base = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for i in 0..self.n_splits {
            let size = if i < remainder { base + 1 } else { base };
            let end = start + size;
            let test = indices[start..end].to_vec();
            let train = indices[..start]
                .iter()
                .chain(&indices[end..])
                .copied()
                .collect();
            folds.push(Fold { train, test });
            start = end;
        }
        Ok(folds)
    }

    /// Folds that keep each class's share of the rows.
    ///
    /// Rows of each class are shuffled (when enabled) and dealt round-robin
    /// across the folds, continuing from where the previous class stopped so
    /// fold sizes differ by at most one. Every class present needs at least
    /// `n_splits` rows, so each held-out fold sees every class.
    pub fn split_stratified(&self, labels: &[Label]) -> FraudResult<Vec<Fold>> {
        let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); Label::ALL.len()];
        for (i, label) in labels.iter().enumerate() {
            by_class[label.index()].push(i);
        }
        for label in Label::ALL {
            let count = by_class[label.index()].len();
            if count > 0 && count < self.n_splits {
                return Err(FraudError::config(
                    Stage::Tune,
                    "n_folds",
                    format!(
                        "{} stratified folds need at least as many rows per class, class {label} has {count}",
                        self.n_splits
                    ),
                ));
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut assignment = vec![0usize; labels.len()];
        let mut next = 0;
        for indices in &mut by_class {
            if self.shuffle {
                indices.shuffle(&mut rng);
            }
            for &i in indices.iter() {
                assignment[i] = next % self.n_splits;
                next += 1;
            }
        }

        let folds = (0..self.n_splits)
            .map(|k| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|&i| assignment[i] == k);
                Fold { train, test }
            })
            .collect();
        Ok(folds)
    }
}
