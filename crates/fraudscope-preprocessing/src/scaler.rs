use fraudscope_core::{Dataset, FraudError, FraudResult, Stage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name given to the amount column once standardized.
pub const SCALED_AMOUNT: &str = "scaled_amount";

/// Standardizes a single monetary column to zero mean and unit variance.
///
/// The fitted parameters travel with an exported model so inference reuses
/// them instead of refitting on new data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountScaler {
    /// Column the scaler was fitted on.
    pub column: String,
    pub mean: f64,
    /// Population variance.
    pub variance: f64,
}

impl AmountScaler {
    /// Compute mean and variance of `column` over `data`.
    pub fn fit(data: &Dataset, column: &str) -> FraudResult<Self> {
        let j = data.column_index(column).ok_or_else(|| {
            FraudError::invalid_input(Stage::Scale, format!("no column `{column}` to scale"))
        })?;
        if data.is_empty() {
            return Err(FraudError::EmptyDataset {
                stage: Stage::Scale,
                rows_in: 0,
            });
        }

        let values = data.features().column(j);
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        debug!(column, mean, variance, "fitted amount scaler");

        Ok(AmountScaler {
            column: column.to_string(),
            mean,
            variance,
        })
    }

    /// Divisor applied after centering; 1 for a constant column.
    pub fn scale(&self) -> f64 {
        let std = self.variance.sqrt();
        if std < f64::EPSILON {
            1.0
        } else {
            std
        }
    }

    pub fn transform_value(&self, v: f64) -> f64 {
        (v - self.mean) / self.scale()
    }

    /// Replace the fitted column with standardized values named
    /// [`SCALED_AMOUNT`]. The raw column does not survive.
    pub fn transform(&self, data: &Dataset) -> FraudResult<Dataset> {
        let j = data.column_index(&self.column).ok_or_else(|| {
            FraudError::invalid_input(
                Stage::Scale,
                format!("dataset has no column `{}`; was it already scaled?", self.column),
            )
        })?;
        let scaled: Vec<f64> = data
            .features()
            .column(j)
            .into_iter()
            .map(|v| self.transform_value(v))
            .collect();

        let mut out = data.clone();
        out.replace_column(j, SCALED_AMOUNT, &scaled)?;
        Ok(out)
    }

    pub fn fit_transform(data: &Dataset, column: &str) -> FraudResult<(Self, Dataset)> {
        let scaler = Self::fit(data, column)?;
        let scaled = scaler.transform(data)?;
        Ok((scaler, scaled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use fraudscope_core::{Label, Matrix};

    fn data(amounts: &[f64]) -> Dataset {
        let rows: Vec<Vec<f64>> = amounts.iter().map(|&a| vec![1.0, a]).collect();
        Dataset::new(
            vec!["V1".into(), "Amount".into()],
            Matrix::from_rows(&rows).unwrap(),
            vec![Label::Legitimate; amounts.len()],
        )
        .unwrap()
    }

    #[test]
    fn test_standardizes_amount() {
        let (scaler, scaled) = AmountScaler::fit_transform(&data(&[1.0, 3.0, 5.0]), "Amount").unwrap();
        assert_abs_diff_eq!(scaler.mean, 3.0);
        assert_abs_diff_eq!(scaler.variance, 8.0 / 3.0, epsilon = 1e-12);

        let col = scaled.features().column(1);
        let mean: f64 = col.iter().sum::<f64>() / 3.0;
        let var: f64 = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(var, 1.0, epsilon = 1e-12);

        assert_eq!(scaled.column_index("Amount"), None);
        assert_eq!(scaled.column_index(SCALED_AMOUNT), Some(1));
        // other columns untouched
        assert_eq!(scaled.features().column(0), vec![1.0; 3]);
    }

    #[test]
    fn test_reuse_does_not_refit() {
        let scaler = AmountScaler::fit(&data(&[0.0, 10.0]), "Amount").unwrap();
        let other = scaler.transform(&data(&[100.0])).unwrap();
        assert_abs_diff_eq!(other.row(0)[1], (100.0 - 5.0) / 5.0);
    }

    #[test]
    fn test_constant_column_keeps_unit_scale() {
        let (_, scaled) = AmountScaler::fit_transform(&data(&[4.0, 4.0]), "Amount").unwrap();
        assert_eq!(scaled.features().column(1), vec![0.0, 0.0]);
    }

    #[test]
    fn test_double_transform_is_rejected() {
        let (scaler, scaled) = AmountScaler::fit_transform(&data(&[1.0, 2.0]), "Amount").unwrap();
        assert!(scaler.transform(&scaled).is_err());
        assert!(AmountScaler::fit(&scaled, "Amount").is_err());
    }
}
