use std::fmt;

use fraudscope_core::{ClassCounts, Dataset, Label};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Descriptive statistics of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1); 0 for fewer than two rows.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl ColumnSummary {
    fn compute(name: &str, mut values: Vec<f64>) -> Self {
        values.sort_by(f64::total_cmp);
        let n = values.len();
        let mean = if n == 0 { 0.0 } else { values.iter().sum::<f64>() / n as f64 };
        let std = if n < 2 {
            0.0
        } else {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        };
        ColumnSummary {
            name: name.to_string(),
            count: n,
            mean,
            std,
            min: values.first().copied().unwrap_or(0.0),
            q25: quantile(&values, 0.25),
            median: quantile(&values, 0.5),
            q75: quantile(&values, 0.75),
            max: values.last().copied().unwrap_or(0.0),
        }
    }
}

/// Linear interpolation between closest ranks of sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Shape, per-column statistics and class distribution of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub columns: Vec<ColumnSummary>,
    pub class_counts: ClassCounts,
}

impl DatasetSummary {
    pub fn compute(data: &Dataset) -> Self {
        let columns = data
            .feature_names()
            .par_iter()
            .enumerate()
            .map(|(j, name)| ColumnSummary::compute(name, data.features().column(j)))
            .collect();
        DatasetSummary {
            n_rows: data.len(),
            columns,
            class_counts: data.class_counts(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} rows, {} feature columns", self.n_rows, self.columns.len())?;
        writeln!(
            f,
            "{:>14} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "column", "mean", "std", "min", "25%", "50%", "75%", "max"
        )?;
        for c in &self.columns {
            writeln!(
                f,
                "{:>14} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
                c.name, c.mean, c.std, c.min, c.q25, c.median, c.q75, c.max
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Class distribution:")?;
        write_class_counts(f, &self.class_counts)
    }
}

/// One line per class with its count and share.
pub fn write_class_counts(f: &mut fmt::Formatter<'_>, counts: &ClassCounts) -> fmt::Result {
    for label in Label::ALL {
        writeln!(
            f,
            "{:>16} {:>10} {:>9.4}%",
            label.to_string(),
            counts.get(label),
            100.0 * counts.fraction(label)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use fraudscope_core::Matrix;

    fn data() -> Dataset {
        Dataset::new(
            vec!["V1".into(), "Amount".into()],
            Matrix::from_rows(&[
                vec![1.0, 10.0],
                vec![2.0, 20.0],
                vec![3.0, 30.0],
                vec![4.0, 40.0],
            ])
            .unwrap(),
            vec![Label::Legitimate, Label::Legitimate, Label::Legitimate, Label::Fraud],
        )
        .unwrap()
    }

    #[test]
    fn test_column_statistics() {
        let summary = DatasetSummary::compute(&data());
        assert_eq!(summary.n_rows, 4);
        let v1 = summary.column("V1").unwrap();
        assert_abs_diff_eq!(v1.mean, 2.5);
        assert_abs_diff_eq!(v1.std, (5.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(v1.min, 1.0);
        assert_abs_diff_eq!(v1.q25, 1.75);
        assert_abs_diff_eq!(v1.median, 2.5);
        assert_abs_diff_eq!(v1.q75, 3.25);
        assert_abs_diff_eq!(v1.max, 4.0);
    }

    #[test]
    fn test_class_distribution() {
        let summary = DatasetSummary::compute(&data());
        assert_eq!(summary.class_counts.legitimate, 3);
        assert_eq!(summary.class_counts.fraud, 1);
        let text = summary.to_string();
        assert!(text.contains("25.0000%"));
        assert!(text.contains("Amount"));
    }
}
