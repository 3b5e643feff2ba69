use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FraudError, FraudResult, Stage};
use crate::matrix::Matrix;

/// Binary transaction label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Legitimate,
    Fraud,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::Legitimate, Label::Fraud];

    /// Class index used by the models: 0 = legitimate, 1 = fraud.
    pub fn index(self) -> usize {
        match self {
            Label::Legitimate => 0,
            Label::Fraud => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Label> {
        match index {
            0 => Some(Label::Legitimate),
            1 => Some(Label::Fraud),
            _ => None,
        }
    }

    /// Parse `0`/`1` (also `0.0`/`1.0`).
    pub fn parse(field: &str) -> Option<Label> {
        let v: f64 = field.trim().parse().ok()?;
        if v == 0.0 {
            Some(Label::Legitimate)
        } else if v == 1.0 {
            Some(Label::Fraud)
        } else {
            None
        }
    }

    pub fn other(self) -> Label {
        match self {
            Label::Legitimate => Label::Fraud,
            Label::Fraud => Label::Legitimate,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Legitimate => f.write_str("0 (legitimate)"),
            Label::Fraud => f.write_str("1 (fraud)"),
        }
    }
}

/// Fixed column layout of a transaction file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    /// Anonymized numeric feature columns, in model order.
    pub feature_columns: Vec<String>,
    /// Monetary amount column; appended after the feature columns.
    pub amount_column: String,
    /// Binary fraud indicator column.
    pub label_column: String,
    /// Columns present in the file but not used (row ids, timestamps).
    pub ignored_columns: Vec<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Schema {
            feature_columns: (1..=28).map(|i| format!("V{i}")).collect(),
            amount_column: "Amount".to_string(),
            label_column: "Class".to_string(),
            ignored_columns: vec!["id".to_string(), "Time".to_string()],
        }
    }
}

impl Schema {
    /// Model input columns: features followed by the amount.
    pub fn input_columns(&self) -> Vec<String> {
        let mut cols = self.feature_columns.clone();
        cols.push(self.amount_column.clone());
        cols
    }

    pub fn n_inputs(&self) -> usize {
        self.feature_columns.len() + 1
    }
}

/// One loaded row; `None` marks a missing field.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Values aligned with [`Schema::input_columns`].
    pub values: Vec<Option<f64>>,
    pub label: Option<Label>,
}

impl RawRecord {
    pub fn is_complete(&self) -> bool {
        self.label.is_some() && self.values.iter().all(Option::is_some)
    }
}

/// Loader output: every input row, missing values included.
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub schema: Schema,
    pub records: Vec<RawRecord>,
}

impl RawDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Per-class record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub legitimate: usize,
    pub fraud: usize,
}

impl ClassCounts {
    pub fn from_labels(labels: &[Label]) -> Self {
        let mut counts = ClassCounts::default();
        for &label in labels {
            counts.add(label);
        }
        counts
    }

    pub fn add(&mut self, label: Label) {
        match label {
            Label::Legitimate => self.legitimate += 1,
            Label::Fraud => self.fraud += 1,
        }
    }

    pub fn get(&self, label: Label) -> usize {
        match label {
            Label::Legitimate => self.legitimate,
            Label::Fraud => self.fraud,
        }
    }

    pub fn total(&self) -> usize {
        self.legitimate + self.fraud
    }

    /// Share of `label` among all records; 0 when empty.
    pub fn fraction(&self, label: Label) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.get(label) as f64 / total as f64
        }
    }

    /// Smaller class, or `None` when the classes are already equal.
    pub fn minority(&self) -> Option<Label> {
        match self.legitimate.cmp(&self.fraud) {
            std::cmp::Ordering::Less => Some(Label::Legitimate),
            std::cmp::Ordering::Greater => Some(Label::Fraud),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Complete, numeric transaction records sharing one column set.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    feature_names: Vec<String>,
    features: Matrix,
    labels: Vec<Label>,
}

impl Dataset {
    pub fn new(feature_names: Vec<String>, features: Matrix, labels: Vec<Label>) -> FraudResult<Self> {
        if features.n_cols() != feature_names.len() {
            return Err(FraudError::invalid_input(
                Stage::Load,
                format!(
                    "{} feature names for {} columns",
                    feature_names.len(),
                    features.n_cols()
                ),
            ));
        }
        if features.n_rows() != labels.len() {
            return Err(FraudError::invalid_input(
                Stage::Load,
                format!("{} rows but {} labels", features.n_rows(), labels.len()),
            ));
        }
        Ok(Dataset {
            feature_names,
            features,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> &Matrix {
        &self.features
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn row(&self, i: usize) -> &[f64] {
        self.features.row(i)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    pub fn class_counts(&self) -> ClassCounts {
        ClassCounts::from_labels(&self.labels)
    }

    /// New dataset with the given rows, in order.
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            feature_names: self.feature_names.clone(),
            features: self.features.select_rows(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    pub fn push(&mut self, row: &[f64], label: Label) -> FraudResult<()> {
        self.features.push_row(row)?;
        self.labels.push(label);
        Ok(())
    }

    /// Replace column `j` and give it a new name.
    pub fn replace_column(&mut self, j: usize, name: &str, values: &[f64]) -> FraudResult<()> {
        self.features.set_column(j, values)?;
        self.feature_names[j] = name.to_string();
        Ok(())
    }

    pub fn into_parts(self) -> (Vec<String>, Matrix, Vec<Label>) {
        (self.feature_names, self.features, self.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> Dataset {
        let x = Matrix::from_rows(&[vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]]).unwrap();
        Dataset::new(
            vec!["V1".into(), "Amount".into()],
            x,
            vec![Label::Legitimate, Label::Fraud, Label::Legitimate],
        )
        .unwrap()
    }

    #[test]
    fn test_label_parse() {
        assert_eq!(Label::parse("0"), Some(Label::Legitimate));
        assert_eq!(Label::parse(" 1.0 "), Some(Label::Fraud));
        assert_eq!(Label::parse("2"), None);
        assert_eq!(Label::parse("yes"), None);
    }

    #[test]
    fn test_default_schema_columns() {
        let schema = Schema::default();
        let cols = schema.input_columns();
        assert_eq!(cols.len(), 29);
        assert_eq!(cols[0], "V1");
        assert_eq!(cols[28], "Amount");
        assert_eq!(schema.n_inputs(), 29);
    }

    #[test]
    fn test_dataset_shape_checks() {
        let x = Matrix::from_rows(&[vec![0.0]]).unwrap();
        assert!(Dataset::new(vec!["a".into(), "b".into()], x.clone(), vec![Label::Fraud]).is_err());
        assert!(Dataset::new(vec!["a".into()], x, vec![]).is_err());
    }

    #[test]
    fn test_class_counts() {
        let ds = tiny();
        let counts = ds.class_counts();
        assert_eq!(counts.legitimate, 2);
        assert_eq!(counts.fraud, 1);
        assert_eq!(counts.minority(), Some(Label::Fraud));
        assert!((counts.fraction(Label::Legitimate) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_subset_and_replace() {
        let mut ds = tiny();
        let sub = ds.subset(&[2, 1]);
        assert_eq!(sub.row(0), &[4.0, 5.0]);
        assert_eq!(sub.labels(), &[Label::Legitimate, Label::Fraud]);

        ds.replace_column(1, "scaled_amount", &[9.0, 9.0, 9.0]).unwrap();
        assert_eq!(ds.column_index("scaled_amount"), Some(1));
        assert_eq!(ds.column_index("Amount"), None);
        assert_eq!(ds.features().column(1), vec![9.0; 3]);
    }
}
