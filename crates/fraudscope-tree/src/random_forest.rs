use fraudscope_core::{Classifier, Dataset, FraudResult, ForestParams, Label, Matrix};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::decision_tree::{
    check_prediction_input, check_training_set, normalize, DecisionTreeClassifier,
};

/// Random Forest Classifier (bagging + random feature subsets at each split).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    pub params: ForestParams,
    trees: Vec<DecisionTreeClassifier>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl RandomForestClassifier {
    pub fn new(params: ForestParams) -> Self {
        RandomForestClassifier {
            params,
            trees: Vec::new(),
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    /// Fit `n_trees` trees, each on a bootstrap sample of the rows.
    ///
    /// Tree seeds are drawn from one master RNG before the parallel fit, so
    /// the result does not depend on the thread count.
    #[instrument(skip_all, fields(n_trees = self.params.n_trees, rows = x.n_rows()))]
    pub fn fit(&mut self, x: &Matrix, y: &[Label]) -> FraudResult<()> {
        self.params.validate()?;
        check_training_set(x, y)?;
        let max_features = self.params.max_features.resolve(x.n_cols())?;
        let n = x.n_rows();
        let p = &self.params;

        let mut master_rng = StdRng::seed_from_u64(p.seed);
        let tree_seeds: Vec<u64> = (0..p.n_trees).map(|_| master_rng.gen()).collect();

        let trees: Vec<DecisionTreeClassifier> = tree_seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut tree =
                    DecisionTreeClassifier::new(p.max_depth, p.min_samples_split, p.min_samples_leaf)
                        .with_max_features(Some(max_features))
                        .with_seed(seed);
                tree.grow(x, y, sample, &mut rng);
                tree
            })
            .collect();
        debug!(n_trees_trained = trees.len(), max_features, "tree training complete");

        let mut importances = vec![0.0; x.n_cols()];
        for tree in &trees {
            for (acc, v) in importances.iter_mut().zip(normalize(tree.raw_importances())) {
                *acc += v;
            }
        }
        self.feature_importances = normalize(&importances);
        self.n_features = x.n_cols();
        self.trees = trees;

        let mean_depth =
            self.trees.iter().map(|t| t.depth()).sum::<usize>() as f64 / self.trees.len() as f64;
        info!(n_trees = self.trees.len(), mean_depth, "random forest fitted");
        Ok(())
    }

    pub fn fit_dataset(&mut self, data: &Dataset) -> FraudResult<()> {
        self.fit(data.features(), data.labels())
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn trees(&self) -> &[DecisionTreeClassifier] {
        &self.trees
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean Gini importance across trees, normalized to sum to 1.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

impl Classifier for RandomForestClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    /// Mean over trees of the leaf fraud fraction.
    fn predict_proba(&self, x: &Matrix) -> FraudResult<Vec<f64>> {
        check_prediction_input(self.is_fitted(), self.n_features, x)?;
        let n_trees = self.trees.len() as f64;
        Ok((0..x.n_rows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                self.trees.iter().map(|t| t.leaf_value(row)).sum::<f64>() / n_trees
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudscope_core::{FraudError, MaxFeatures};

    /// Two noisy clusters: fraud when the first two features are both high.
    fn blobs(n: usize) -> (Matrix, Vec<Label>) {
        let mut rng = StdRng::seed_from_u64(3);
        let mut rows = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let fraud = i % 4 == 0;
            let centre = if fraud { 3.0 } else { 0.0 };
            rows.push(vec![
                centre + rng.gen_range(-1.0..1.0),
                centre + rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ]);
            labels.push(if fraud { Label::Fraud } else { Label::Legitimate });
        }
        (Matrix::from_rows(&rows).unwrap(), labels)
    }

    fn small_params() -> ForestParams {
        ForestParams::default().with_n_trees(15).with_seed(7)
    }

    #[test]
    fn test_random_forest_classifier() {
        let (x, y) = blobs(200);
        let mut rf = RandomForestClassifier::new(small_params());
        rf.fit(&x, &y).unwrap();
        assert_eq!(rf.n_trees(), 15);

        let pred = rf.predict(&x).unwrap();
        let correct = pred.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / y.len() as f64 > 0.95);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = blobs(80);
        let mut rf = RandomForestClassifier::new(small_params());
        rf.fit(&x, &y).unwrap();
        for p in rf.predict_proba(&x).unwrap() {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = blobs(120);
        let mut a = RandomForestClassifier::new(small_params());
        let mut b = RandomForestClassifier::new(small_params());
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
        assert_eq!(a.feature_importances(), b.feature_importances());
    }

    #[test]
    fn test_importances_favour_informative_features() {
        let (x, y) = blobs(200);
        let mut rf = RandomForestClassifier::new(
            small_params().with_max_features(MaxFeatures::All),
        );
        rf.fit(&x, &y).unwrap();
        let imp = rf.feature_importances();
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(imp[0] + imp[1] > imp[2]);
    }

    #[test]
    fn test_single_class_is_train_error() {
        let x = Matrix::from_rows(&[vec![0.0], vec![1.0], vec![2.0]]).unwrap();
        let mut rf = RandomForestClassifier::new(small_params());
        let err = rf.fit(&x, &[Label::Legitimate; 3]).unwrap_err();
        assert!(matches!(err, FraudError::Train { .. }));
        assert!(!rf.is_fitted());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (x, y) = blobs(20);
        let mut rf = RandomForestClassifier::new(small_params().with_n_trees(0));
        assert!(matches!(rf.fit(&x, &y), Err(FraudError::Config { .. })));
    }

    #[test]
    fn test_unfitted_forest_cannot_predict() {
        let rf = RandomForestClassifier::new(small_params());
        let x = Matrix::from_rows(&[vec![0.0]]).unwrap();
        assert!(rf.predict_proba(&x).is_err());
    }

    #[test]
    fn test_serde_roundtrip_predicts_identically() {
        let (x, y) = blobs(60);
        let mut rf = RandomForestClassifier::new(small_params().with_max_depth(Some(4)));
        rf.fit(&x, &y).unwrap();
        let json = serde_json::to_string(&rf).unwrap();
        let back: RandomForestClassifier = serde_json::from_str(&json).unwrap();
        assert_eq!(rf.predict_proba(&x).unwrap(), back.predict_proba(&x).unwrap());
        assert!(back.trees().iter().all(|t| t.depth() <= 4));
    }
}
