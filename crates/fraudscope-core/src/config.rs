//! Pipeline configuration.
//!
//! Every knob a stage reads lives here; stages never inline constants.
//! All structs deserialize with defaults so a config file only needs the
//! fields it overrides.

use serde::{Deserialize, Serialize};

use crate::dataset::Schema;
use crate::error::{FraudError, FraudResult, Stage};

/// Number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// `floor(sqrt(n))`, at least 1.
    Sqrt,
    /// `floor(log2(n))`, at least 1.
    Log2,
    /// Fraction of all features, in (0, 1].
    Fraction(f64),
    Fixed(usize),
    All,
}

impl MaxFeatures {
    /// Resolve to a concrete count for `n_features` columns.
    pub fn resolve(self, n_features: usize) -> FraudResult<usize> {
        let n = n_features as f64;
        let resolved = match self {
            MaxFeatures::Sqrt => n.sqrt().floor().max(1.0) as usize,
            MaxFeatures::Log2 => n.log2().floor().max(1.0) as usize,
            MaxFeatures::Fraction(f) => {
                if !(f > 0.0 && f <= 1.0) {
                    return Err(FraudError::config(
                        Stage::Train,
                        "max_features",
                        format!("fraction must be in (0, 1], got {f}"),
                    ));
                }
                (n * f).ceil() as usize
            }
            MaxFeatures::Fixed(k) => k,
            MaxFeatures::All => n_features,
        };
        if resolved == 0 || resolved > n_features {
            return Err(FraudError::config(
                Stage::Train,
                "max_features",
                format!("resolved to {resolved}, must be in [1, {n_features}]"),
            ));
        }
        Ok(resolved)
    }
}

/// Random forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    /// `None` grows trees until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> FraudResult<()> {
        if self.n_trees == 0 {
            return Err(FraudError::config(Stage::Train, "n_trees", "must be at least 1"));
        }
        if self.max_depth == Some(0) {
            return Err(FraudError::config(Stage::Train, "max_depth", "must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(FraudError::config(
                Stage::Train,
                "min_samples_split",
                format!("must be at least 2, got {}", self.min_samples_split),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(FraudError::config(Stage::Train, "min_samples_leaf", "must be at least 1"));
        }
        Ok(())
    }
}

/// Hyperparameter cross product searched by the tuner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub n_trees: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        ParamGrid {
            n_trees: vec![50, 100],
            max_depth: vec![None, Some(10), Some(20)],
            min_samples_split: vec![2, 5],
        }
    }
}

impl ParamGrid {
    pub fn len(&self) -> usize {
        self.n_trees.len() * self.max_depth.len() * self.min_samples_split.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination, `n_trees` outermost and `min_samples_split`
    /// innermost. Fields the grid does not vary come from `base`.
    pub fn candidates(&self, base: &ForestParams) -> Vec<ForestParams> {
        let mut out = Vec::with_capacity(self.len());
        for &n_trees in &self.n_trees {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    out.push(
                        base.clone()
                            .with_n_trees(n_trees)
                            .with_max_depth(max_depth)
                            .with_min_samples_split(min_samples_split),
                    );
                }
            }
        }
        out
    }
}

/// Whether oversampling happens before or after the train/test split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitOrder {
    /// Balance the whole dataset, then split it.
    BalanceThenSplit,
    /// Split first and balance only the training subset; the test subset
    /// keeps the natural class ratio.
    SplitThenBalance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub order: SplitOrder,
}

impl Default for SplitConfig {
    fn default() -> Self {
        SplitConfig {
            test_fraction: 0.2,
            seed: 42,
            order: SplitOrder::BalanceThenSplit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    pub k_neighbors: usize,
    pub seed: u64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        BalanceConfig {
            k_neighbors: 5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub enabled: bool,
    pub grid: ParamGrid,
    pub n_folds: usize,
    pub seed: u64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        TuningConfig {
            enabled: true,
            grid: ParamGrid::default(),
            n_folds: 5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    pub enabled: bool,
    /// Number of test rows to attribute.
    pub n_rows: usize,
    pub n_permutations: usize,
    pub seed: u64,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        ExplainConfig {
            enabled: false,
            n_rows: 3,
            n_permutations: 64,
            seed: 42,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub schema: Schema,
    pub forest: ForestParams,
    pub split: SplitConfig,
    pub balance: BalanceConfig,
    pub tuning: TuningConfig,
    pub explain: ExplainConfig,
}

impl PipelineConfig {
    /// Reject out-of-range values before any stage runs.
    pub fn validate(&self) -> FraudResult<()> {
        self.forest.validate()?;
        let f = self.split.test_fraction;
        if !(f > 0.0 && f < 1.0) {
            return Err(FraudError::config(
                Stage::Split,
                "test_fraction",
                format!("must be in (0, 1), got {f}"),
            ));
        }
        if self.balance.k_neighbors == 0 {
            return Err(FraudError::config(Stage::Balance, "k_neighbors", "must be at least 1"));
        }
        if self.tuning.enabled {
            if self.tuning.n_folds < 2 {
                return Err(FraudError::config(
                    Stage::Tune,
                    "n_folds",
                    format!("must be at least 2, got {}", self.tuning.n_folds),
                ));
            }
            if self.tuning.grid.is_empty() {
                return Err(FraudError::Tuning {
                    reason: "hyperparameter grid is empty".into(),
                });
            }
        }
        if self.explain.enabled && self.explain.n_permutations == 0 {
            return Err(FraudError::config(Stage::Explain, "n_permutations", "must be at least 1"));
        }
        Ok(())
    }
}
