use std::fmt;

use fraudscope_core::{Classifier, Dataset, FraudError, FraudResult, Label, Stage};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::classification::{ClassificationReport, ConfusionMatrix};
use crate::roc::roc_auc;

/// Everything the evaluator computes for one model on one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub confusion: ConfusionMatrix,
    pub report: ClassificationReport,
    pub roc_auc: f64,
    pub mcc: f64,
}

impl Evaluation {
    /// Evaluation from ground truth and fraud probabilities.
    pub fn from_scores(y_true: &[Label], proba: &[f64]) -> FraudResult<Self> {
        let y_pred: Vec<Label> = proba
            .iter()
            .map(|&p| if p > 0.5 { Label::Fraud } else { Label::Legitimate })
            .collect();
        let confusion = ConfusionMatrix::from_labels(y_true, &y_pred)?;
        Ok(Evaluation {
            report: ClassificationReport::from_confusion(&confusion),
            roc_auc: roc_auc(y_true, proba)?,
            mcc: confusion.mcc(),
            confusion,
        })
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Confusion matrix:")?;
        writeln!(f, "{}", self.confusion)?;
        writeln!(f)?;
        writeln!(f, "Classification report:")?;
        write!(f, "{}", self.report)?;
        writeln!(f)?;
        write!(f, "ROC-AUC: {:.4}  MCC: {:.4}", self.roc_auc, self.mcc)
    }
}

/// Score `model` on `data`. Neither argument is modified.
#[instrument(skip_all, fields(rows = data.len()))]
pub fn evaluate<C: Classifier + ?Sized>(model: &C, data: &Dataset) -> FraudResult<Evaluation> {
    if data.is_empty() {
        return Err(FraudError::EmptyDataset {
            stage: Stage::Evaluate,
            rows_in: 0,
        });
    }
    let proba = model.predict_proba(data.features())?;
    let evaluation = Evaluation::from_scores(data.labels(), &proba)?;
    info!(
        accuracy = evaluation.report.accuracy,
        roc_auc = evaluation.roc_auc,
        "evaluated model"
    );
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use fraudscope_core::Matrix;

    /// Scores the first feature as the fraud probability.
    struct Identity;

    impl Classifier for Identity {
        fn n_features(&self) -> usize {
            1
        }

        fn predict_proba(&self, x: &Matrix) -> FraudResult<Vec<f64>> {
            Ok(x.column(0))
        }
    }

    fn data() -> Dataset {
        Dataset::new(
            vec!["V1".into()],
            Matrix::from_rows(&[vec![0.1], vec![0.7], vec![0.4], vec![0.9]]).unwrap(),
            vec![Label::Legitimate, Label::Legitimate, Label::Fraud, Label::Fraud],
        )
        .unwrap()
    }

    #[test]
    fn test_evaluate() {
        let eval = evaluate(&Identity, &data()).unwrap();
        assert_eq!(
            eval.confusion,
            ConfusionMatrix { tn: 1, fp: 1, fn_: 1, tp: 1 }
        );
        assert_abs_diff_eq!(eval.roc_auc, 0.75);
        assert_abs_diff_eq!(eval.report.accuracy, 0.5);
    }

    #[test]
    fn test_evaluate_is_pure() {
        let ds = data();
        let before = ds.clone();
        let a = evaluate(&Identity, &ds).unwrap();
        let b = evaluate(&Identity, &ds).unwrap();
        assert_eq!(a, b);
        assert_eq!(ds, before);
    }

    #[test]
    fn test_half_is_legitimate() {
        let eval = Evaluation::from_scores(&[Label::Fraud], &[0.5]).unwrap();
        assert_eq!(eval.confusion.fn_, 1);
    }

    #[test]
    fn test_empty_dataset() {
        let empty = Dataset::new(vec!["V1".into()], Matrix::empty(1), vec![]).unwrap();
        assert!(matches!(
            evaluate(&Identity, &empty),
            Err(FraudError::EmptyDataset { stage: Stage::Evaluate, .. })
        ));
    }
}
