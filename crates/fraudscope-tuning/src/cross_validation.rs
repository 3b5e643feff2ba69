use fraudscope_core::{Classifier, Dataset, FraudResult, ForestParams};
use fraudscope_metrics::roc_auc;
use fraudscope_preprocessing::KFold;
use fraudscope_tree::RandomForestClassifier;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-fold ROC-AUC with its mean and population standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvScore {
    pub fold_scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CvScore {
    pub fn from_folds(fold_scores: Vec<f64>) -> Self {
        let n = fold_scores.len() as f64;
        let (mean, std) = if fold_scores.is_empty() {
            (0.0, 0.0)
        } else {
            let mean = fold_scores.iter().sum::<f64>() / n;
            let var = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
            (mean, var.sqrt())
        };
        CvScore {
            fold_scores,
            mean,
            std,
        }
    }
}

/// Fit a fresh forest on each stratified fold's training rows and score
/// ROC-AUC on its held-out rows.
pub fn cross_val_score(data: &Dataset, params: &ForestParams, folds: &KFold) -> FraudResult<CvScore> {
    let mut scores = Vec::with_capacity(folds.n_splits());
    for (i, fold) in folds.split_stratified(data.labels())?.into_iter().enumerate() {
        let train = data.subset(&fold.train);
        let test = data.subset(&fold.test);

        let mut forest = RandomForestClassifier::new(params.clone());
        forest.fit_dataset(&train)?;
        let proba = forest.predict_proba(test.features())?;
        let score = roc_auc(test.labels(), &proba)?;
        debug!(fold = i, score, "fold scored");
        scores.push(score);
    }
    Ok(CvScore::from_folds(scores))
}
