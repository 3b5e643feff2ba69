use std::fmt;

use fraudscope_core::{ClassCounts, ForestParams, SplitOrder};
use fraudscope_metrics::Evaluation;
use fraudscope_preprocessing::{BalanceReport, DropReport};
use fraudscope_tuning::{CvScore, GridSearchResult};
use serde::{Deserialize, Serialize};

use crate::summary::{write_class_counts, DatasetSummary};

/// Sizes and class counts of both sides of the split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub order: SplitOrder,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_counts: ClassCounts,
    pub test_counts: ClassCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub name: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub name: String,
    pub value: f64,
}

/// Attribution of one test-set prediction, largest contributions first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowExplanation {
    pub test_row: usize,
    pub base_value: f64,
    pub prediction: f64,
    pub contributions: Vec<FeatureContribution>,
}

/// Everything a pipeline run measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub summary: DatasetSummary,
    pub cleaning: DropReport,
    pub balance: BalanceReport,
    pub split: SplitSummary,
    /// Held-out score of the forest trained with the configured parameters.
    pub baseline: Evaluation,
    pub tuning: Option<GridSearchResult>,
    pub final_params: ForestParams,
    /// Cross-validated ROC-AUC of the final parameters on the training set.
    pub cross_validation: Option<CvScore>,
    /// Held-out score of the final model.
    pub evaluation: Evaluation,
    pub importances: Vec<FeatureImportance>,
    pub explanations: Vec<RowExplanation>,
}

fn heading(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "─── {title} ───")
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        heading(f, "Dataset")?;
        writeln!(f, "{}", self.summary)?;

        heading(f, "Cleaning")?;
        writeln!(
            f,
            "{} rows in, {} dropped for missing values, {} kept",
            self.cleaning.rows_in,
            self.cleaning.rows_dropped,
            self.cleaning.rows_out()
        )?;
        for (name, count) in self.cleaning.missing_per_column.iter().filter(|(_, c)| *c > 0) {
            writeln!(f, "{name:>16} {count:>10} missing")?;
        }

        heading(f, "Balancing")?;
        writeln!(f, "Before:")?;
        write_class_counts(f, &self.balance.before)?;
        writeln!(f, "After ({} synthetic rows):", self.balance.synthetic)?;
        write_class_counts(f, &self.balance.after)?;

        heading(f, "Split")?;
        writeln!(
            f,
            "{:?}: {} train rows, {} test rows",
            self.split.order, self.split.train_rows, self.split.test_rows
        )?;
        writeln!(f, "Test set:")?;
        write_class_counts(f, &self.split.test_counts)?;

        heading(f, "Baseline model")?;
        writeln!(f, "{}", self.baseline)?;

        if let Some(grid) = &self.tuning {
            heading(f, "Grid search")?;
            write!(f, "{grid}")?;
        }

        heading(f, "Final model")?;
        let p = &self.final_params;
        writeln!(
            f,
            "n_trees={} max_depth={:?} min_samples_split={} min_samples_leaf={} max_features={:?} seed={}",
            p.n_trees, p.max_depth, p.min_samples_split, p.min_samples_leaf, p.max_features, p.seed
        )?;
        if let Some(cv) = &self.cross_validation {
            let folds: Vec<String> = cv.fold_scores.iter().map(|s| format!("{s:.4}")).collect();
            writeln!(
                f,
                "Cross-validated ROC-AUC: {:.4} ± {:.4}  [{}]",
                cv.mean,
                cv.std,
                folds.join(", ")
            )?;
        }
        writeln!(f, "{}", self.evaluation)?;

        if !self.importances.is_empty() {
            heading(f, "Feature importances")?;
            for imp in &self.importances {
                writeln!(f, "{:>16} {:>8.4}", imp.name, imp.importance)?;
            }
        }

        for e in &self.explanations {
            heading(f, &format!("Explanation for test row {}", e.test_row))?;
            writeln!(f, "base {:.4} → prediction {:.4}", e.base_value, e.prediction)?;
            for c in &e.contributions {
                writeln!(f, "{:>16} {:>+9.4}", c.name, c.value)?;
            }
        }
        Ok(())
    }
}
