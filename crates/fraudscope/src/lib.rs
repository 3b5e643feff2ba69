//! # fraudscope
//!
//! Seeded, end-to-end fraud detection over labelled card transactions.
//!
//! ## Modules
//!
//! - **core**: Labels, schema, matrix and dataset types, configuration, errors
//! - **io**: CSV transaction loading, model artifacts, JSON config and reports
//! - **preprocessing**: Null-row dropping, amount scaling, SMOTE, train/test and k-fold splits
//! - **tree**: Decision tree (CART) and random forest classifiers
//! - **metrics**: Confusion matrix, classification report, ROC curve and AUC
//! - **tuning**: Cross-validation and grid search
//! - **explain**: Sampling Shapley attributions
//! - **pipeline**: Orchestration, dataset summary and run report

/// Core data model and errors.
pub use fraudscope_core as core;

/// Loading and persistence.
pub use fraudscope_io as io;

/// Data preprocessing.
pub use fraudscope_preprocessing as preprocessing;

/// Tree-based models.
pub use fraudscope_tree as tree;

/// Evaluation metrics.
pub use fraudscope_metrics as metrics;

/// Hyperparameter search.
pub use fraudscope_tuning as tuning;

/// Prediction attributions.
pub use fraudscope_explain as explain;

/// Pipeline API.
pub use fraudscope_pipeline as pipeline;

pub use fraudscope_core::{FraudError, FraudResult, PipelineConfig};
pub use fraudscope_pipeline::{Pipeline, PipelineReport, PipelineRun};
