use std::fmt;

use fraudscope_core::{FraudError, FraudResult, Label, Stage};
use serde::{Deserialize, Serialize};

/// Binary confusion matrix with fraud as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &[Label], y_pred: &[Label]) -> FraudResult<Self> {
        check_lengths(y_true.len(), y_pred.len())?;
        let mut cm = ConfusionMatrix::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (Label::Legitimate, Label::Legitimate) => cm.tn += 1,
                (Label::Legitimate, Label::Fraud) => cm.fp += 1,
                (Label::Fraud, Label::Legitimate) => cm.fn_ += 1,
                (Label::Fraud, Label::Fraud) => cm.tp += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tn + self.tp, self.total())
    }

    /// Support of `label` in the ground truth.
    pub fn support(&self, label: Label) -> usize {
        match label {
            Label::Legitimate => self.tn + self.fp,
            Label::Fraud => self.tp + self.fn_,
        }
    }

    /// Precision treating `label` as the positive class.
    pub fn precision(&self, label: Label) -> f64 {
        match label {
            Label::Legitimate => ratio(self.tn, self.tn + self.fn_),
            Label::Fraud => ratio(self.tp, self.tp + self.fp),
        }
    }

    /// Recall treating `label` as the positive class.
    pub fn recall(&self, label: Label) -> f64 {
        match label {
            Label::Legitimate => ratio(self.tn, self.tn + self.fp),
            Label::Fraud => ratio(self.tp, self.tp + self.fn_),
        }
    }

    pub fn f1(&self, label: Label) -> f64 {
        let p = self.precision(label);
        let r = self.recall(label);
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// Matthews correlation coefficient; 0 when any margin is empty.
    ///
    /// MCC = (TP·TN - FP·FN) / √((TP+FP)(TP+FN)(TN+FP)(TN+FN))
    pub fn mcc(&self) -> f64 {
        let (tp, tn, fp, fn_) = (self.tp as f64, self.tn as f64, self.fp as f64, self.fn_ as f64);
        let denom = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
        if denom < 1e-10 {
            return 0.0;
        }
        (tp * tn - fp * fn_) / denom
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>16} {:>10} {:>10}", "", "pred 0", "pred 1")?;
        writeln!(f, "{:>16} {:>10} {:>10}", "actual 0", self.tn, self.fp)?;
        write!(f, "{:>16} {:>10} {:>10}", "actual 1", self.fn_, self.tp)
    }
}

/// Precision, recall, F1 and support for one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: Label,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Averaged precision, recall and F1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Per-class metrics plus accuracy, macro and support-weighted averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AveragedMetrics,
    pub weighted_avg: AveragedMetrics,
    pub support: usize,
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let classes: Vec<ClassMetrics> = Label::ALL
            .iter()
            .map(|&label| ClassMetrics {
                label,
                precision: cm.precision(label),
                recall: cm.recall(label),
                f1: cm.f1(label),
                support: cm.support(label),
            })
            .collect();

        let n_classes = classes.len() as f64;
        let macro_avg = AveragedMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n_classes,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n_classes,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / n_classes,
        };

        let total = cm.total();
        let weighted = |metric: fn(&ClassMetrics) -> f64| -> f64 {
            if total == 0 {
                return 0.0;
            }
            classes
                .iter()
                .map(|c| metric(c) * c.support as f64)
                .sum::<f64>()
                / total as f64
        };
        let weighted_avg = AveragedMetrics {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
        };

        ClassificationReport {
            accuracy: cm.accuracy(),
            classes,
            macro_avg,
            weighted_avg,
            support: total,
        }
    }

    pub fn class(&self, label: Label) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>16} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>16} {:>10.4} {:>10.4} {:>10.4} {:>10}",
                c.label.to_string(),
                c.precision,
                c.recall,
                c.f1,
                c.support
            )?;
        }
        writeln!(
            f,
            "{:>16} {:>10} {:>10} {:>10.4} {:>10}",
            "accuracy", "", "", self.accuracy, self.support
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>16} {:>10.4} {:>10.4} {:>10.4} {:>10}",
                name, avg.precision, avg.recall, avg.f1, self.support
            )?;
        }
        Ok(())
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub(crate) fn check_lengths(n_true: usize, n_other: usize) -> FraudResult<()> {
    if n_true != n_other {
        return Err(FraudError::invalid_input(
            Stage::Evaluate,
            format!("length mismatch: {n_true} labels vs {n_other} predictions"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn labels(v: &[u8]) -> Vec<Label> {
        v.iter()
            .map(|&c| if c == 1 { Label::Fraud } else { Label::Legitimate })
            .collect()
    }

    #[test]
    fn test_confusion_matrix() {
        let cm = ConfusionMatrix::from_labels(&labels(&[0, 0, 1, 1]), &labels(&[0, 1, 0, 1])).unwrap();
        assert_eq!(cm.tn, 1);
        assert_eq!(cm.fp, 1);
        assert_eq!(cm.fn_, 1);
        assert_eq!(cm.tp, 1);
        assert_abs_diff_eq!(cm.accuracy(), 0.5);
    }

    #[test]
    fn test_precision_recall() {
        let cm = ConfusionMatrix::from_labels(
            &labels(&[1, 1, 0, 0, 1]),
            &labels(&[1, 0, 0, 1, 1]),
        )
        .unwrap();
        // TP=2, FP=1, FN=1 → P=2/3, R=2/3
        assert_abs_diff_eq!(cm.precision(Label::Fraud), 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cm.recall(Label::Fraud), 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cm.precision(Label::Legitimate), 0.5);
        assert_abs_diff_eq!(cm.recall(Label::Legitimate), 0.5);
    }

    #[test]
    fn test_zero_denominators_are_zero() {
        let cm = ConfusionMatrix::from_labels(&labels(&[0, 0]), &labels(&[0, 0])).unwrap();
        assert_eq!(cm.precision(Label::Fraud), 0.0);
        assert_eq!(cm.recall(Label::Fraud), 0.0);
        assert_eq!(cm.f1(Label::Fraud), 0.0);
        assert_eq!(cm.mcc(), 0.0);
    }

    #[test]
    fn test_report_averages() {
        // 8 legitimate (6 right), 2 fraud (1 right)
        let cm = ConfusionMatrix { tn: 6, fp: 2, fn_: 1, tp: 1 };
        let report = ClassificationReport::from_confusion(&cm);
        let legit = report.class(Label::Legitimate).unwrap();
        let fraud = report.class(Label::Fraud).unwrap();
        assert_eq!(legit.support, 8);
        assert_eq!(fraud.support, 2);
        assert_abs_diff_eq!(report.accuracy, 0.7);
        assert_abs_diff_eq!(
            report.macro_avg.recall,
            (legit.recall + fraud.recall) / 2.0,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            report.weighted_avg.f1,
            (legit.f1 * 8.0 + fraud.f1 * 2.0) / 10.0,
            epsilon = 1e-12
        );
        let text = report.to_string();
        assert!(text.contains("weighted avg"));
        assert!(text.contains("1 (fraud)"));
    }

    #[test]
    fn test_mcc_perfect() {
        let cm = ConfusionMatrix { tn: 5, fp: 0, fn_: 0, tp: 3 };
        assert_abs_diff_eq!(cm.mcc(), 1.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(ConfusionMatrix::from_labels(&labels(&[0]), &labels(&[0, 1])).is_err());
    }
}
