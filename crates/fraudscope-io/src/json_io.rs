use std::fs;
use std::path::Path;

use fraudscope_core::{FraudError, FraudResult, PipelineConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

pub(crate) fn persist_error(path: &Path, reason: impl ToString) -> FraudError {
    FraudError::Persist {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Write any serializable value as pretty-printed JSON.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: impl AsRef<Path>) -> FraudResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value).map_err(|e| persist_error(path, e))?;
    fs::write(path, json).map_err(|e| persist_error(path, e))?;
    debug!(path = %path.display(), "wrote json");
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> FraudResult<T> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|e| persist_error(path, e))?;
    serde_json::from_str(&json).map_err(|e| persist_error(path, e))
}

/// Read a pipeline configuration; absent fields keep their defaults.
pub fn load_config(path: impl AsRef<Path>) -> FraudResult<PipelineConfig> {
    let path = path.as_ref();
    let config: PipelineConfig = load_json(path)?;
    config.validate()?;
    info!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// Write a run report as JSON.
pub fn write_report<T: Serialize + ?Sized>(report: &T, path: impl AsRef<Path>) -> FraudResult<()> {
    let path = path.as_ref();
    save_json(report, path)?;
    info!(path = %path.display(), "wrote report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudscope_core::{MaxFeatures, SplitOrder};
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_partial_config_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"forest": {{"n_trees": 7, "max_features": {{"fraction": 0.5}}}},
                "split": {{"order": "split_then_balance"}}}}"#
        )
        .unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.forest.n_trees, 7);
        assert_eq!(config.forest.max_features, MaxFeatures::Fraction(0.5));
        assert_eq!(config.forest.seed, 42);
        assert_eq!(config.split.order, SplitOrder::SplitThenBalance);
        assert_eq!(config.split.test_fraction, 0.2);
        assert_eq!(config.schema.amount_column, "Amount");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"split": {{"test_fraction": 1.5}}}}"#).unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(FraudError::Config { field: "test_fraction", .. })
        ));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(load_config(file.path()), Err(FraudError::Persist { .. })));
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = PipelineConfig::default();
        write_report(&config, &path).unwrap();
        let back: PipelineConfig = load_json(&path).unwrap();
        assert_eq!(back, config);
    }
}
