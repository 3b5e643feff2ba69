use std::fs;
use std::path::Path;

use fraudscope_core::{
    Classifier, FraudError, FraudResult, Label, Matrix, RawDataset, Schema, Stage,
};
use fraudscope_preprocessing::AmountScaler;
use fraudscope_tree::RandomForestClassifier;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::json_io::persist_error;

/// Bumped whenever the artifact layout changes incompatibly.
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Everything needed to score new transactions: the input schema, the
/// fitted amount scaler and the trained forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub schema: Schema,
    /// Column names of the matrix the forest was trained on.
    pub feature_names: Vec<String>,
    pub scaler: AmountScaler,
    pub forest: RandomForestClassifier,
}

/// Score for one input row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Zero-based position among the data rows of the input.
    pub row: usize,
    pub probability: f64,
    pub label: Label,
}

#[derive(Deserialize)]
struct VersionHeader {
    format_version: u32,
}

impl ModelArtifact {
    pub fn new(
        schema: Schema,
        feature_names: Vec<String>,
        scaler: AmountScaler,
        forest: RandomForestClassifier,
    ) -> Self {
        ModelArtifact {
            format_version: MODEL_FORMAT_VERSION,
            schema,
            feature_names,
            scaler,
            forest,
        }
    }

    /// Build the model input from raw records, applying the stored scaler.
    ///
    /// Records with a missing input value are rejected rather than dropped so
    /// the output stays aligned with the input rows.
    pub fn prepare(&self, raw: &RawDataset) -> FraudResult<Matrix> {
        let columns = self.schema.input_columns();
        if raw.schema.input_columns() != columns {
            return Err(FraudError::invalid_input(
                Stage::Evaluate,
                "input columns do not match the model schema",
            ));
        }
        let amount = columns
            .iter()
            .position(|c| *c == self.scaler.column)
            .ok_or_else(|| {
                FraudError::invalid_input(
                    Stage::Scale,
                    format!("model schema has no column `{}`", self.scaler.column),
                )
            })?;

        let mut x = Matrix::empty(columns.len());
        let mut row = vec![0.0; columns.len()];
        for (i, record) in raw.records.iter().enumerate() {
            for (j, (slot, value)) in row.iter_mut().zip(&record.values).enumerate() {
                *slot = value.ok_or_else(|| {
                    FraudError::invalid_input(
                        Stage::Clean,
                        format!("row {i}: missing value in column `{}`", columns[j]),
                    )
                })?;
            }
            row[amount] = self.scaler.transform_value(row[amount]);
            x.push_row(&row)?;
        }
        Ok(x)
    }

    /// Probability and hard label for every raw record, in input order.
    pub fn predict_raw(&self, raw: &RawDataset) -> FraudResult<Vec<Prediction>> {
        let x = self.prepare(raw)?;
        let proba = self.forest.predict_proba(&x)?;
        Ok(proba
            .into_iter()
            .enumerate()
            .map(|(row, probability)| Prediction {
                row,
                probability,
                label: if probability > 0.5 {
                    Label::Fraud
                } else {
                    Label::Legitimate
                },
            })
            .collect())
    }
}

/// Save a model artifact as JSON.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn save_model(artifact: &ModelArtifact, path: impl AsRef<Path>) -> FraudResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_string(artifact).map_err(|e| persist_error(path, e))?;
    fs::write(path, json).map_err(|e| persist_error(path, e))?;
    info!(n_trees = artifact.forest.n_trees(), "saved model");
    Ok(())
}

/// Load a model artifact, rejecting other format versions.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_model(path: impl AsRef<Path>) -> FraudResult<ModelArtifact> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|e| persist_error(path, e))?;

    let header: VersionHeader = serde_json::from_str(&json).map_err(|e| persist_error(path, e))?;
    if header.format_version != MODEL_FORMAT_VERSION {
        return Err(persist_error(
            path,
            format!(
                "unsupported model format version {}, expected {MODEL_FORMAT_VERSION}",
                header.format_version
            ),
        ));
    }

    let artifact: ModelArtifact = serde_json::from_str(&json).map_err(|e| persist_error(path, e))?;
    info!(n_trees = artifact.forest.n_trees(), "loaded model");
    Ok(artifact)
}

/// Write `row,probability,prediction` CSV.
pub fn write_predictions<W: std::io::Write>(writer: W, predictions: &[Prediction]) -> FraudResult<()> {
    let fail = |e: csv::Error| persist_error(Path::new("<predictions>"), e);
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["row", "probability", "prediction"]).map_err(fail)?;
    for p in predictions {
        wtr.write_record([
            p.row.to_string(),
            p.probability.to_string(),
            p.label.index().to_string(),
        ])
        .map_err(fail)?;
    }
    wtr.flush()
        .map_err(|e| persist_error(Path::new("<predictions>"), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudscope_core::{Dataset, ForestParams, RawRecord};
    use fraudscope_preprocessing::SCALED_AMOUNT;
    use tempfile::tempdir;

    fn schema() -> Schema {
        Schema {
            feature_columns: vec!["V1".into()],
            amount_column: "Amount".into(),
            label_column: "Class".into(),
            ignored_columns: vec![],
        }
    }

    fn artifact() -> (ModelArtifact, Dataset) {
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i % 20) as f64, if i < 20 { 10.0 } else { 200.0 + i as f64 }])
            .collect();
        let labels = (0..40)
            .map(|i| if i < 20 { Label::Legitimate } else { Label::Fraud })
            .collect();
        let data = Dataset::new(
            vec!["V1".into(), "Amount".into()],
            Matrix::from_rows(&rows).unwrap(),
            labels,
        )
        .unwrap();
        let (scaler, scaled) = AmountScaler::fit_transform(&data, "Amount").unwrap();
        let mut forest = RandomForestClassifier::new(ForestParams::default().with_n_trees(5));
        forest.fit_dataset(&scaled).unwrap();
        let names = scaled.feature_names().to_vec();
        (ModelArtifact::new(schema(), names, scaler, forest), data)
    }

    fn raw(rows: &[[Option<f64>; 2]]) -> RawDataset {
        RawDataset {
            schema: schema(),
            records: rows
                .iter()
                .map(|r| RawRecord {
                    values: r.to_vec(),
                    label: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_save_load_predicts_identically() {
        let (model, data) = artifact();
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        save_model(&model, &path).unwrap();
        let loaded = load_model(&path).unwrap();

        assert_eq!(loaded.feature_names, vec!["V1".to_string(), SCALED_AMOUNT.to_string()]);
        assert_eq!(loaded.scaler, model.scaler);
        let scaled = model.scaler.transform(&data).unwrap();
        assert_eq!(
            model.forest.predict_proba(scaled.features()).unwrap(),
            loaded.forest.predict_proba(scaled.features()).unwrap()
        );
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let (mut model, _) = artifact();
        model.format_version = MODEL_FORMAT_VERSION + 1;
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        save_model(&model, &path).unwrap();
        let err = load_model(&path).unwrap_err();
        assert!(matches!(err, FraudError::Persist { .. }));
        assert!(err.to_string().contains("format version"));
    }

    #[test]
    fn test_missing_file_is_persist_error() {
        assert!(matches!(
            load_model("/no/such/model.json"),
            Err(FraudError::Persist { .. })
        ));
    }

    #[test]
    fn test_predict_raw_applies_stored_scaler() {
        let (model, _) = artifact();
        let preds = model
            .predict_raw(&raw(&[[Some(3.0), Some(10.0)], [Some(3.0), Some(230.0)]]))
            .unwrap();
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].label, Label::Legitimate);
        assert_eq!(preds[1].label, Label::Fraud);
        assert_eq!(preds[1].row, 1);
    }

    #[test]
    fn test_predict_raw_rejects_missing_values() {
        let (model, _) = artifact();
        let err = model
            .predict_raw(&raw(&[[Some(1.0), None]]))
            .unwrap_err();
        assert!(err.to_string().contains("Amount"));
    }

    #[test]
    fn test_write_predictions() {
        let preds = vec![
            Prediction { row: 0, probability: 0.25, label: Label::Legitimate },
            Prediction { row: 1, probability: 0.75, label: Label::Fraud },
        ];
        let mut out = Vec::new();
        write_predictions(&mut out, &preds).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "row,probability,prediction\n0,0.25,0\n1,0.75,1\n");
    }
}
