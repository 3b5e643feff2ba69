use std::fmt;

use fraudscope_core::{Dataset, FraudError, FraudResult, ForestParams, ParamGrid};
use fraudscope_preprocessing::KFold;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::cross_validation::{cross_val_score, CvScore};

/// Outcome of cross-validating one grid candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ForestParams,
    /// `Ok` with the fold scores, or the error message of the failed fit.
    pub outcome: Result<CvScore, String>,
}

impl CandidateScore {
    pub fn mean(&self) -> Option<f64> {
        self.outcome.as_ref().ok().map(|cv| cv.mean)
    }
}

/// Every candidate in enumeration order plus the selected one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub candidates: Vec<CandidateScore>,
    pub best_index: usize,
}

impl GridSearchResult {
    pub fn best(&self) -> &CandidateScore {
        &self.candidates[self.best_index]
    }

    pub fn best_params(&self) -> &ForestParams {
        &self.best().params
    }

    /// Mean cross-validated ROC-AUC of the selected candidate.
    pub fn best_score(&self) -> f64 {
        self.best().mean().unwrap_or(f64::NAN)
    }

    pub fn n_failed(&self) -> usize {
        self.candidates.iter().filter(|c| c.outcome.is_err()).count()
    }
}

impl fmt::Display for GridSearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>4} {:>8} {:>10} {:>10} {:>10} {:>10}",
            "#", "n_trees", "max_depth", "min_split", "mean_auc", "std"
        )?;
        for (i, c) in self.candidates.iter().enumerate() {
            let depth = c
                .params
                .max_depth
                .map_or_else(|| "none".to_string(), |d| d.to_string());
            let marker = if i == self.best_index { "*" } else { " " };
            match &c.outcome {
                Ok(cv) => writeln!(
                    f,
                    "{marker}{i:>3} {:>8} {depth:>10} {:>10} {:>10.4} {:>10.4}",
                    c.params.n_trees, c.params.min_samples_split, cv.mean, cv.std
                )?,
                Err(e) => writeln!(
                    f,
                    "{marker}{i:>3} {:>8} {depth:>10} {:>10} failed: {e}",
                    c.params.n_trees, c.params.min_samples_split
                )?,
            }
        }
        Ok(())
    }
}

/// Cross-validate every candidate of `grid` (built on top of `base`).
///
/// Candidates run in parallel but are reported in enumeration order. The
/// highest mean score wins; on a tie the earliest candidate is kept.
#[instrument(skip_all, fields(rows = data.len(), candidates = grid.len(), folds = folds.n_splits()))]
pub fn grid_search(
    data: &Dataset,
    grid: &ParamGrid,
    base: &ForestParams,
    folds: &KFold,
) -> FraudResult<GridSearchResult> {
    if grid.is_empty() {
        return Err(FraudError::Tuning {
            reason: "parameter grid is empty".into(),
        });
    }

    let candidates: Vec<CandidateScore> = grid
        .candidates(base)
        .into_par_iter()
        .map(|params| {
            let outcome = cross_val_score(data, &params, folds).map_err(|e| e.to_string());
            match &outcome {
                Ok(cv) => debug!(
                    n_trees = params.n_trees,
                    max_depth = ?params.max_depth,
                    min_samples_split = params.min_samples_split,
                    mean = cv.mean,
                    "candidate scored"
                ),
                Err(e) => warn!(n_trees = params.n_trees, error = %e, "candidate failed"),
            }
            CandidateScore { params, outcome }
        })
        .collect();

    let mut best: Option<(usize, f64)> = None;
    for (i, c) in candidates.iter().enumerate() {
        if let Some(mean) = c.mean() {
            if best.map_or(true, |(_, b)| mean > b) {
                best = Some((i, mean));
            }
        }
    }

    let Some((best_index, best_score)) = best else {
        let first_error = candidates
            .iter()
            .find_map(|c| c.outcome.as_ref().err())
            .cloned()
            .unwrap_or_default();
        return Err(FraudError::Tuning {
            reason: format!(
                "all {} candidates failed; first error: {first_error}",
                candidates.len()
            ),
        });
    };

    let chosen = &candidates[best_index].params;
    info!(
        best_index,
        best_score,
        n_trees = chosen.n_trees,
        max_depth = ?chosen.max_depth,
        min_samples_split = chosen.min_samples_split,
        "grid search complete"
    );
    Ok(GridSearchResult {
        candidates,
        best_index,
    })
}
