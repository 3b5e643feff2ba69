use crate::dataset::Label;
use crate::error::FraudResult;
use crate::matrix::Matrix;

/// A fitted binary classifier over feature rows.
///
/// The evaluator, tuner and explainer only see models through this trait.
pub trait Classifier {
    /// Number of input columns the model was fitted on.
    fn n_features(&self) -> usize;

    /// Fraud probability for each row of `x`.
    fn predict_proba(&self, x: &Matrix) -> FraudResult<Vec<f64>>;

    /// Hard labels; fraud when the probability exceeds one half.
    fn predict(&self, x: &Matrix) -> FraudResult<Vec<Label>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| if p > 0.5 { Label::Fraud } else { Label::Legitimate })
            .collect())
    }
}
