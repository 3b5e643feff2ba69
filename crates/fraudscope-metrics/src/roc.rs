use fraudscope_core::{FraudError, FraudResult, Label, Stage};
use serde::{Deserialize, Serialize};

use crate::classification::check_lengths;

/// One point of the ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub fpr: f64,
    pub tpr: f64,
}

/// ROC curve from (0, 0) to (1, 1), one point per distinct score.
///
/// Scores are visited in descending order; tied scores move the curve in a
/// single diagonal step. Returns an empty curve when only one class is present.
pub fn roc_curve(y_true: &[Label], scores: &[f64]) -> FraudResult<Vec<RocPoint>> {
    check_lengths(y_true.len(), scores.len())?;
    if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
        return Err(FraudError::invalid_input(
            Stage::Evaluate,
            format!("non-finite score {bad}"),
        ));
    }

    let mut pairs: Vec<(f64, bool)> = scores
        .iter()
        .zip(y_true)
        .map(|(&s, &t)| (s, t == Label::Fraud))
        .collect();
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

    let total_pos = pairs.iter().filter(|(_, pos)| *pos).count() as f64;
    let total_neg = pairs.len() as f64 - total_pos;
    if total_pos == 0.0 || total_neg == 0.0 {
        return Ok(Vec::new());
    }

    let mut curve = vec![RocPoint {
        threshold: f64::INFINITY,
        fpr: 0.0,
        tpr: 0.0,
    }];
    let (mut tp, mut fp) = (0.0, 0.0);
    let mut i = 0;
    while i < pairs.len() {
        let threshold = pairs[i].0;
        while i < pairs.len() && pairs[i].0 == threshold {
            if pairs[i].1 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            i += 1;
        }
        curve.push(RocPoint {
            threshold,
            fpr: fp / total_neg,
            tpr: tp / total_pos,
        });
    }
    Ok(curve)
}

/// Area under the ROC curve by the trapezoidal rule.
///
/// 0.5 when only one class is present.
pub fn roc_auc(y_true: &[Label], scores: &[f64]) -> FraudResult<f64> {
    let curve = roc_curve(y_true, scores)?;
    if curve.is_empty() {
        return Ok(0.5);
    }
    Ok(curve
        .windows(2)
        .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
        .sum())
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
    fn test_perfect_ranking() {
        let auc = roc_auc(&labels(&[0, 0, 1, 1]), &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert_abs_diff_eq!(auc, 1.0);
    }

    #[test]
    fn test_inverted_ranking() {
        let auc = roc_auc(&labels(&[1, 1, 0, 0]), &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert_abs_diff_eq!(auc, 0.0);
    }

    #[test]
    fn test_partial_ranking() {
        // one of four positive/negative pairs is misordered
        let auc = roc_auc(&labels(&[0, 1, 0, 1]), &[0.1, 0.3, 0.35, 0.8]).unwrap();
        assert_abs_diff_eq!(auc, 0.75);
    }

    #[test]
    fn test_ties_count_half() {
        let auc = roc_auc(&labels(&[0, 1]), &[0.5, 0.5]).unwrap();
        assert_abs_diff_eq!(auc, 0.5);

        let auc = roc_auc(&labels(&[0, 0, 1, 1]), &[0.2, 0.6, 0.6, 0.9]).unwrap();
        assert_abs_diff_eq!(auc, 0.875);
    }

    #[test]
    fn test_single_class_is_half() {
        assert_abs_diff_eq!(roc_auc(&labels(&[1, 1]), &[0.3, 0.7]).unwrap(), 0.5);
        assert!(roc_curve(&labels(&[0]), &[0.3]).unwrap().is_empty());
    }

    #[test]
    fn test_curve_endpoints() {
        let curve = roc_curve(&labels(&[0, 1, 1]), &[0.2, 0.2, 0.9]).unwrap();
        assert_eq!(curve.len(), 3);
        let last = curve[curve.len() - 1];
        assert_abs_diff_eq!(last.fpr, 1.0);
        assert_abs_diff_eq!(last.tpr, 1.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(roc_auc(&labels(&[0, 1]), &[0.1]).is_err());
        assert!(roc_auc(&labels(&[0, 1]), &[0.1, f64::NAN]).is_err());
    }
}
