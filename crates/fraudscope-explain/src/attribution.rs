use fraudscope_core::{FraudResult, Matrix};
use serde::{Deserialize, Serialize};

/// Additive decomposition of one prediction:
/// `base_value + values.iter().sum() == prediction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub base_value: f64,
    /// One contribution per input column.
    pub values: Vec<f64>,
    pub prediction: f64,
}

impl Attribution {
    /// `prediction - (base_value + Σ values)`; zero up to rounding.
    pub fn residual(&self) -> f64 {
        self.prediction - self.base_value - self.values.iter().sum::<f64>()
    }

    /// Column indices ordered by decreasing absolute contribution.
    pub fn ranked(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.values.len()).collect();
        idx.sort_by(|&a, &b| {
            self.values[b]
                .abs()
                .total_cmp(&self.values[a].abs())
                .then(a.cmp(&b))
        });
        idx
    }
}

/// Produces per-feature attributions for single predictions.
pub trait Explainer {
    fn explain(&self, row: &[f64]) -> FraudResult<Attribution>;

    fn explain_rows(&self, x: &Matrix) -> FraudResult<Vec<Attribution>> {
        x.rows().map(|row| self.explain(row)).collect()
    }
}
