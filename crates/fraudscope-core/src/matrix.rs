use crate::error::{FraudError, FraudResult, Stage};

use serde::{Deserialize, Serialize};

/// Dense row-major matrix of `f64` feature values.
///
/// Stores data in a flat contiguous `Vec<f64>`; row `i` occupies
/// `data[i * n_cols..(i + 1) * n_cols]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    data: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

// ─── Construction ───────────────────────────────────────────────────────────

impl Matrix {
    /// Create a matrix from flat row-major data.
    pub fn new(data: Vec<f64>, n_rows: usize, n_cols: usize) -> FraudResult<Self> {
        if data.len() != n_rows * n_cols {
            return Err(FraudError::invalid_input(
                Stage::Load,
                format!(
                    "matrix data has {} values, expected {n_rows}x{n_cols}",
                    data.len()
                ),
            ));
        }
        Ok(Matrix { data, n_rows, n_cols })
    }

    /// An empty matrix with a fixed column count.
    pub fn empty(n_cols: usize) -> Self {
        Matrix {
            data: Vec::new(),
            n_rows: 0,
            n_cols,
        }
    }

    /// Build from rows of equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> FraudResult<Self> {
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * n_cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(FraudError::invalid_input(
                    Stage::Load,
                    format!("row {i} has {} columns, expected {n_cols}", row.len()),
                ));
            }
            data.extend_from_slice(row);
        }
        Ok(Matrix {
            data,
            n_rows: rows.len(),
            n_cols,
        })
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Row `i` as a slice. Panics when out of bounds, like slice indexing.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n_cols + j]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.n_rows).map(move |i| self.row(i))
    }

    /// Copy of column `j`.
    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.n_rows).map(|i| self.get(i, j)).collect()
    }

    /// Column means; zeros for an empty matrix.
    pub fn column_means(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_cols];
        for row in self.rows() {
            for (s, &v) in sums.iter_mut().zip(row) {
                *s += v;
            }
        }
        if self.n_rows > 0 {
            let n = self.n_rows as f64;
            sums.iter_mut().for_each(|s| *s /= n);
        }
        sums
    }

    // ─── Mutation ───────────────────────────────────────────────────────────

    /// Append a row, checking its width.
    pub fn push_row(&mut self, row: &[f64]) -> FraudResult<()> {
        if row.len() != self.n_cols {
            return Err(FraudError::invalid_input(
                Stage::Balance,
                format!("row has {} columns, expected {}", row.len(), self.n_cols),
            ));
        }
        self.data.extend_from_slice(row);
        self.n_rows += 1;
        Ok(())
    }

    /// Overwrite column `j` with `values`.
    pub fn set_column(&mut self, j: usize, values: &[f64]) -> FraudResult<()> {
        if j >= self.n_cols || values.len() != self.n_rows {
            return Err(FraudError::invalid_input(
                Stage::Scale,
                format!(
                    "cannot set column {j} of a {}x{} matrix with {} values",
                    self.n_rows,
                    self.n_cols,
                    values.len()
                ),
            ));
        }
        for (i, &v) in values.iter().enumerate() {
            self.data[i * self.n_cols + j] = v;
        }
        Ok(())
    }

    /// New matrix holding the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Matrix {
        let mut data = Vec::with_capacity(indices.len() * self.n_cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Matrix {
            data,
            n_rows: indices.len(),
            n_cols: self.n_cols,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_from_rows_and_access() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(m.n_rows(), 3);
        assert_eq!(m.n_cols(), 2);
        assert_eq!(m.row(1), &[3.0, 4.0]);
        assert_eq!(m.get(2, 0), 5.0);
        assert_eq!(m.column(1), vec![2.0, 4.0, 6.0]);
        assert_eq!(m.rows().count(), 3);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
        assert!(Matrix::new(vec![1.0, 2.0, 3.0], 2, 2).is_err());
    }

    #[test]
    fn test_select_and_push() {
        let mut m = Matrix::from_rows(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let picked = m.select_rows(&[2, 0]);
        assert_eq!(picked.data(), &[3.0, 1.0]);

        m.push_row(&[4.0]).unwrap();
        assert_eq!(m.n_rows(), 4);
        assert!(m.push_row(&[4.0, 5.0]).is_err());
    }

    #[test]
    fn test_set_column_and_means() {
        let mut m = Matrix::from_rows(&[vec![1.0, 10.0], vec![3.0, 30.0]]).unwrap();
        m.set_column(1, &[0.0, 1.0]).unwrap();
        let means = m.column_means();
        assert_abs_diff_eq!(means[0], 2.0);
        assert_abs_diff_eq!(means[1], 0.5);
        assert!(m.set_column(2, &[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_empty_matrix_has_no_rows() {
        let m = Matrix::empty(3);
        assert!(m.is_empty());
        assert_eq!(m.rows().count(), 0);
        assert_eq!(m.column_means(), vec![0.0, 0.0, 0.0]);
    }
}
