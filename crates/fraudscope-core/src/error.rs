use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Clean,
    Scale,
    Balance,
    Split,
    Train,
    Evaluate,
    Tune,
    Explain,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Clean => "clean",
            Stage::Scale => "scale",
            Stage::Balance => "balance",
            Stage::Split => "split",
            Stage::Train => "train",
            Stage::Evaluate => "evaluate",
            Stage::Tune => "tune",
            Stage::Explain => "explain",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Error type shared by every fraudscope stage.
#[derive(Debug, Error)]
pub enum FraudError {
    /// The input file is unreadable or does not fit the schema.
    #[error("load stage: {}{}: {reason}", .path.display(), line_suffix(.line))]
    Load {
        path: PathBuf,
        line: Option<u64>,
        reason: String,
    },

    /// No records are left to work with.
    #[error("{stage} stage: dataset is empty ({rows_in} rows in, none usable)")]
    EmptyDataset { stage: Stage, rows_in: usize },

    /// Too few minority-class records to interpolate between neighbours.
    #[error("balance stage: class {minority} has {count} records, need at least {required} for oversampling")]
    Imbalance {
        minority: String,
        count: usize,
        required: usize,
    },

    /// The training subset cannot produce a decision boundary.
    #[error("train stage: {reason}")]
    Train { reason: String },

    /// Grid search could not select a candidate.
    #[error("tune stage: {reason}")]
    Tuning { reason: String },

    /// A configuration value is out of range.
    #[error("{stage} stage: invalid `{field}`: {reason}")]
    Config {
        stage: Stage,
        field: &'static str,
        reason: String,
    },

    /// Input with the wrong shape was passed to an operation.
    #[error("{stage} stage: {reason}")]
    InvalidInput { stage: Stage, reason: String },

    /// Reading or writing a model, report or config file failed.
    #[error("persist stage: {}: {reason}", .path.display())]
    Persist { path: PathBuf, reason: String },
}

impl FraudError {
    /// Stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            FraudError::Load { .. } => Stage::Load,
            FraudError::EmptyDataset { stage, .. } => *stage,
            FraudError::Imbalance { .. } => Stage::Balance,
            FraudError::Train { .. } => Stage::Train,
            FraudError::Tuning { .. } => Stage::Tune,
            FraudError::Config { stage, .. } => *stage,
            FraudError::InvalidInput { stage, .. } => *stage,
            FraudError::Persist { .. } => Stage::Persist,
        }
    }

    pub fn invalid_input(stage: Stage, reason: impl Into<String>) -> Self {
        FraudError::InvalidInput {
            stage,
            reason: reason.into(),
        }
    }

    pub fn config(stage: Stage, field: &'static str, reason: impl Into<String>) -> Self {
        FraudError::Config {
            stage,
            field,
            reason: reason.into(),
        }
    }
}

pub type FraudResult<T> = Result<T, FraudError>;

fn line_suffix(line: &Option<u64>) -> String {
    match line {
        Some(l) => format!(" (line {l})"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_stage() {
        let err = FraudError::Load {
            path: PathBuf::from("data.csv"),
            line: Some(7),
            reason: "label `2` is not 0 or 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "load stage: data.csv (line 7): label `2` is not 0 or 1"
        );

        let err = FraudError::EmptyDataset {
            stage: Stage::Clean,
            rows_in: 12,
        };
        assert!(err.to_string().starts_with("clean stage"));
        assert_eq!(err.stage(), Stage::Clean);
    }

    #[test]
    fn test_load_without_line() {
        let err = FraudError::Load {
            path: PathBuf::from("missing.csv"),
            line: None,
            reason: "no such file".into(),
        };
        assert_eq!(err.to_string(), "load stage: missing.csv: no such file");
    }
}
