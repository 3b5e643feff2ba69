//! Permutation-sampled Shapley values.
//!
//! For each sampled feature ordering, the row is walked from the baseline to
//! the explained row one feature at a time; each feature is credited with the
//! change in fraud probability it causes. Contributions of one ordering sum
//! to `f(row) - f(baseline)`, so the averaged attribution stays additive.

use fraudscope_core::{Classifier, ExplainConfig, FraudError, FraudResult, Matrix, Stage};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use crate::attribution::{Attribution, Explainer};

/// Sampling Shapley explainer over any [`Classifier`].
pub struct SamplingShapley<'a, C: Classifier + ?Sized> {
    model: &'a C,
    baseline: Vec<f64>,
    n_permutations: usize,
    seed: u64,
}

impl<'a, C: Classifier + Sync + ?Sized> SamplingShapley<'a, C> {
    pub fn new(model: &'a C, baseline: Vec<f64>) -> FraudResult<Self> {
        if baseline.len() != model.n_features() {
            return Err(FraudError::invalid_input(
                Stage::Explain,
                format!(
                    "baseline has {} values, model expects {}",
                    baseline.len(),
                    model.n_features()
                ),
            ));
        }
        Ok(SamplingShapley {
            model,
            baseline,
            n_permutations: 64,
            seed: 42,
        })
    }

    /// Baseline = column means of `background`.
    pub fn from_background(model: &'a C, background: &Matrix) -> FraudResult<Self> {
        if background.is_empty() {
            return Err(FraudError::EmptyDataset {
                stage: Stage::Explain,
                rows_in: 0,
            });
        }
        Self::new(model, background.column_means())
    }

    pub fn from_config(model: &'a C, background: &Matrix, config: &ExplainConfig) -> FraudResult<Self> {
        Self::from_background(model, background)?
            .with_permutations(config.n_permutations)
            .map(|s| s.with_seed(config.seed))
    }

    pub fn with_permutations(mut self, n_permutations: usize) -> FraudResult<Self> {
        if n_permutations == 0 {
            return Err(FraudError::config(
                Stage::Explain,
                "n_permutations",
                "must be at least 1",
            ));
        }
        self.n_permutations = n_permutations;
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn baseline(&self) -> &[f64] {
        &self.baseline
    }

    /// Marginal contributions along one ordering. All `p + 1` intermediate
    /// rows are scored in a single batch.
    fn walk(&self, row: &[f64], order: &[usize]) -> FraudResult<Vec<f64>> {
        let p = row.len();
        let mut z = self.baseline.clone();
        let mut path = Matrix::empty(p);
        path.push_row(&z)?;
        for &j in order {
            z[j] = row[j];
            path.push_row(&z)?;
        }

        let f = self.model.predict_proba(&path)?;
        let mut contrib = vec![0.0; p];
        for (step, &j) in order.iter().enumerate() {
            contrib[j] = f[step + 1] - f[step];
        }
        Ok(contrib)
    }
}

impl<'a, C: Classifier + Sync + ?Sized> Explainer for SamplingShapley<'a, C> {
    fn explain(&self, row: &[f64]) -> FraudResult<Attribution> {
        let p = self.baseline.len();
        if row.len() != p {
            return Err(FraudError::invalid_input(
                Stage::Explain,
                format!("row has {} values, model expects {p}", row.len()),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let seeds: Vec<u64> = (0..self.n_permutations).map(|_| rng.gen()).collect();
        let walks: Vec<Vec<f64>> = seeds
            .into_par_iter()
            .map(|seed| {
                let mut order: Vec<usize> = (0..p).collect();
                order.shuffle(&mut StdRng::seed_from_u64(seed));
                self.walk(row, &order)
            })
            .collect::<FraudResult<_>>()?;

        let mut values = vec![0.0; p];
        for walk in &walks {
            for (v, c) in values.iter_mut().zip(walk) {
                *v += c;
            }
        }
        let n = self.n_permutations as f64;
        values.iter_mut().for_each(|v| *v /= n);

        let ends = Matrix::from_rows(&[self.baseline.clone(), row.to_vec()])?;
        let f = self.model.predict_proba(&ends)?;
        let attribution = Attribution {
            base_value: f[0],
            values,
            prediction: f[1],
        };
        debug!(
            prediction = attribution.prediction,
            residual = attribution.residual(),
            "explained row"
        );
        Ok(attribution)
    }
}
