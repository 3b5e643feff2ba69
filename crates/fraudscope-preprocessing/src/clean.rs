use fraudscope_core::{Dataset, FraudError, FraudResult, Label, Matrix, RawDataset, Stage};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Outcome of null-row elimination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropReport {
    pub rows_in: usize,
    pub rows_dropped: usize,
    /// Missing-value count per column, label column last.
    pub missing_per_column: Vec<(String, usize)>,
}

impl DropReport {
    pub fn rows_out(&self) -> usize {
        self.rows_in - self.rows_dropped
    }
}

/// Count missing values per input column and in the label column.
pub fn missing_counts(raw: &RawDataset) -> Vec<(String, usize)> {
    let mut names = raw.schema.input_columns();
    names.push(raw.schema.label_column.clone());
    let mut counts = vec![0usize; names.len()];
    let label_slot = names.len() - 1;

    for record in &raw.records {
        for (j, v) in record.values.iter().enumerate() {
            if v.is_none() {
                counts[j] += 1;
            }
        }
        if record.label.is_none() {
            counts[label_slot] += 1;
        }
    }

    names.into_iter().zip(counts).collect()
}

/// Drop every record with a missing field; nothing is imputed.
pub fn drop_missing(raw: RawDataset) -> FraudResult<(Dataset, DropReport)> {
    let rows_in = raw.len();
    let missing_per_column = missing_counts(&raw);
    let n_cols = raw.schema.n_inputs();

    let mut data = Vec::with_capacity(rows_in * n_cols);
    let mut labels: Vec<Label> = Vec::with_capacity(rows_in);
    for record in &raw.records {
        if let (true, Some(label)) = (record.is_complete(), record.label) {
            data.extend(record.values.iter().flatten());
            labels.push(label);
        }
    }

    let rows_dropped = rows_in - labels.len();
    if labels.is_empty() {
        return Err(FraudError::EmptyDataset {
            stage: Stage::Clean,
            rows_in,
        });
    }

    let features = Matrix::new(data, labels.len(), n_cols)?;
    let dataset = Dataset::new(raw.schema.input_columns(), features, labels)?;
    info!(rows_in, rows_dropped, "dropped rows with missing values");

    Ok((
        dataset,
        DropReport {
            rows_in,
            rows_dropped,
            missing_per_column,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudscope_core::{RawRecord, Schema};

    fn raw(records: Vec<RawRecord>) -> RawDataset {
        RawDataset {
            schema: Schema {
                feature_columns: vec!["V1".into()],
                amount_column: "Amount".into(),
                label_column: "Class".into(),
                ignored_columns: vec![],
            },
            records,
        }
    }

    fn rec(v1: Option<f64>, amount: Option<f64>, label: Option<Label>) -> RawRecord {
        RawRecord {
            values: vec![v1, amount],
            label,
        }
    }

    #[test]
    fn test_drops_incomplete_rows() {
        let data = raw(vec![
            rec(Some(1.0), Some(10.0), Some(Label::Legitimate)),
            rec(None, Some(5.0), Some(Label::Fraud)),
            rec(Some(2.0), Some(20.0), Some(Label::Fraud)),
            rec(Some(3.0), Some(30.0), None),
        ]);
        let (ds, report) = drop_missing(data).unwrap();

        assert_eq!(ds.len(), 2);
        assert!(ds.len() <= report.rows_in);
        assert_eq!(report.rows_dropped, 2);
        assert_eq!(report.rows_out(), 2);
        assert_eq!(ds.row(1), &[2.0, 20.0]);
        assert_eq!(ds.feature_names(), &["V1".to_string(), "Amount".to_string()]);
        assert!(ds.features().data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_missing_counts_per_column() {
        let data = raw(vec![
            rec(None, None, Some(Label::Legitimate)),
            rec(None, Some(1.0), None),
        ]);
        let counts = missing_counts(&data);
        assert_eq!(
            counts,
            vec![("V1".to_string(), 2), ("Amount".to_string(), 1), ("Class".to_string(), 1)]
        );
    }

    #[test]
    fn test_all_rows_missing_is_empty_dataset() {
        let data = raw(vec![rec(None, Some(1.0), Some(Label::Fraud))]);
        let err = drop_missing(data).unwrap_err();
        assert!(matches!(
            err,
            FraudError::EmptyDataset {
                stage: Stage::Clean,
                rows_in: 1
            }
        ));
    }
}
