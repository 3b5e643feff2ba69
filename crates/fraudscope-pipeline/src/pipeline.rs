use std::path::Path;

use fraudscope_core::{
    Dataset, FraudError, FraudResult, ForestParams, PipelineConfig, RawDataset, SplitOrder,
};
use fraudscope_explain::{Explainer, SamplingShapley};
use fraudscope_io::{load_transactions, ModelArtifact};
use fraudscope_metrics::evaluate;
use fraudscope_preprocessing::{
    drop_missing, train_test_split, AmountScaler, BalanceReport, DropReport, KFold, Smote,
};
use fraudscope_tree::RandomForestClassifier;
use fraudscope_tuning::grid_search;
use tracing::{info, instrument};

use crate::report::{
    FeatureContribution, FeatureImportance, PipelineReport, RowExplanation, SplitSummary,
};
use crate::summary::DatasetSummary;

/// Number of features listed in the report's importance table.
pub const TOP_IMPORTANCES: usize = 10;

/// Result of one end-to-end run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub report: PipelineReport,
    /// Final model with the scaler it was trained behind.
    pub model: ModelArtifact,
}

/// Train and test sets after balancing, whichever order was configured.
struct Prepared {
    train: Dataset,
    test: Dataset,
    balance: BalanceReport,
}

/// Runs load → clean → scale → balance/split → train → evaluate → tune →
/// explain with one [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> FraudResult<Self> {
        config.validate()?;
        Ok(Pipeline { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn run_path(&self, path: impl AsRef<Path>) -> FraudResult<PipelineRun> {
        let raw = load_transactions(path, &self.config.schema)?;
        self.run(raw)
    }

    /// Summary and null-row report only; nothing is trained.
    pub fn describe(&self, raw: RawDataset) -> FraudResult<(DatasetSummary, DropReport)> {
        let (clean, cleaning) = drop_missing(raw)?;
        Ok((DatasetSummary::compute(&clean), cleaning))
    }

    #[instrument(skip_all, fields(rows = raw.len()))]
    pub fn run(&self, raw: RawDataset) -> FraudResult<PipelineRun> {
        let cfg = &self.config;

        let (clean, cleaning) = drop_missing(raw)?;
        let summary = DatasetSummary::compute(&clean);
        let (scaler, scaled) = AmountScaler::fit_transform(&clean, &cfg.schema.amount_column)?;
        let Prepared {
            train,
            test,
            balance,
        } = self.balance_and_split(&scaled)?;
        let split = SplitSummary {
            order: cfg.split.order,
            train_rows: train.len(),
            test_rows: test.len(),
            train_counts: train.class_counts(),
            test_counts: test.class_counts(),
        };

        let baseline_model = fit_forest(&cfg.forest, &train)?;
        let baseline = evaluate(&baseline_model, &test)?;

        let (tuning, final_params, cross_validation, final_model) = if cfg.tuning.enabled {
            let folds = KFold::new(cfg.tuning.n_folds)?.with_seed(cfg.tuning.seed);
            let grid = grid_search(&train, &cfg.tuning.grid, &cfg.forest, &folds)?;
            let best = grid.best_params().clone();
            let cv = grid
                .best()
                .outcome
                .clone()
                .map_err(|reason| FraudError::Tuning { reason })?;
            let model = if best == cfg.forest {
                baseline_model
            } else {
                fit_forest(&best, &train)?
            };
            (Some(grid), best, Some(cv), model)
        } else {
            (None, cfg.forest.clone(), None, baseline_model)
        };

        let evaluation = evaluate(&final_model, &test)?;
        info!(
            baseline_auc = baseline.roc_auc,
            final_auc = evaluation.roc_auc,
            "pipeline evaluated"
        );

        let names = train.feature_names();
        let mut importances: Vec<FeatureImportance> = names
            .iter()
            .zip(final_model.feature_importances())
            .map(|(name, &importance)| FeatureImportance {
                name: name.clone(),
                importance,
            })
            .collect();
        importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        importances.truncate(TOP_IMPORTANCES);

        let explanations = if cfg.explain.enabled {
            self.explain(&final_model, &train, &test)?
        } else {
            Vec::new()
        };

        let model = ModelArtifact::new(cfg.schema.clone(), names.to_vec(), scaler, final_model);
        Ok(PipelineRun {
            report: PipelineReport {
                summary,
                cleaning,
                balance,
                split,
                baseline,
                tuning,
                final_params,
                cross_validation,
                evaluation,
                importances,
                explanations,
            },
            model,
        })
    }

    fn balance_and_split(&self, scaled: &Dataset) -> FraudResult<Prepared> {
        let cfg = &self.config;
        let smote = Smote::from_config(&cfg.balance);
        match cfg.split.order {
            SplitOrder::BalanceThenSplit => {
                let (balanced, balance) = smote.balance(scaled)?;
                let split = train_test_split(&balanced, cfg.split.test_fraction, cfg.split.seed)?;
                Ok(Prepared {
                    train: split.train,
                    test: split.test,
                    balance,
                })
            }
            SplitOrder::SplitThenBalance => {
                let split = train_test_split(scaled, cfg.split.test_fraction, cfg.split.seed)?;
                let (train, balance) = smote.balance(&split.train)?;
                Ok(Prepared {
                    train,
                    test: split.test,
                    balance,
                })
            }
        }
    }

    /// Attribute the first `n_rows` test predictions against the mean
    /// training row.
    fn explain(
        &self,
        model: &RandomForestClassifier,
        train: &Dataset,
        test: &Dataset,
    ) -> FraudResult<Vec<RowExplanation>> {
        let explainer = SamplingShapley::from_config(model, train.features(), &self.config.explain)?;
        let names = train.feature_names();
        (0..self.config.explain.n_rows.min(test.len()))
            .map(|i| {
                let a = explainer.explain(test.row(i))?;
                let contributions = a
                    .ranked()
                    .into_iter()
                    .map(|j| FeatureContribution {
                        name: names[j].clone(),
                        value: a.values[j],
                    })
                    .collect();
                Ok(RowExplanation {
                    test_row: i,
                    base_value: a.base_value,
                    prediction: a.prediction,
                    contributions,
                })
            })
            .collect()
    }
}

fn fit_forest(params: &ForestParams, train: &Dataset) -> FraudResult<RandomForestClassifier> {
    let mut forest = RandomForestClassifier::new(params.clone());
    forest.fit_dataset(train)?;
    Ok(forest)
}

