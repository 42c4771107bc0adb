//! Row-major 2D matrix of `f64` values.
//!
//! Every [`Matrix`] has at least one row and one column and exactly
//! `rows * cols` entries. Constructors enforce this, so downstream code
//! (codec, reference engine, comparison) never re-checks it.

use std::fmt;

use crate::error::HarnessError;

/// A dense, row-major 2D grid with explicit dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a matrix from flattened row-major `data`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::EmptyMatrix`] if either dimension is zero,
    /// or [`HarnessError::ShapeMismatch`] if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, HarnessError> {
        if rows == 0 || cols == 0 {
            return Err(HarnessError::EmptyMatrix { rows, cols });
        }
        if data.len() != rows * cols {
            return Err(HarnessError::ShapeMismatch {
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Create a matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self, HarnessError> {
        Self::new(rows, cols, vec![0.0; rows * cols])
    }

    /// A zero matrix with the same shape as `other`.
    pub fn zeros_like(other: &Matrix) -> Self {
        Self {
            rows: other.rows,
            cols: other.cols,
            data: vec![0.0; other.data.len()],
        }
    }

    /// Create a matrix whose entry `(i, j)` is `f(i, j)`.
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> Result<Self, HarnessError>
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self::new(rows, cols, data)
    }

    /// Create a matrix from nested rows. All rows must share one length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, HarnessError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(HarnessError::ShapeMismatch {
                    rows: rows.len(),
                    cols,
                    len: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(rows.len(), cols, data)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Entry at `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics if `(i, j)` is out of bounds.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(
            i < self.rows && j < self.cols,
            "index ({i}, {j}) out of bounds for {}x{} matrix",
            self.rows,
            self.cols
        );
        self.data[i * self.cols + j]
    }

    /// Set entry `(i, j)`.
    ///
    /// # Panics
    ///
    /// Panics if `(i, j)` is out of bounds.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        assert!(
            i < self.rows && j < self.cols,
            "index ({i}, {j}) out of bounds for {}x{} matrix",
            self.rows,
            self.cols
        );
        self.data[i * self.cols + j] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Row `i` as a slice.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Nested `Vec` copy of the rows, used for JSON dumps.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|i| self.row(i).to_vec()).collect()
    }

    /// Top-left `max_rows x max_cols` corner, clamped to the matrix shape.
    pub fn corner(&self, max_rows: usize, max_cols: usize) -> Self {
        let rows = self.rows.min(max_rows.max(1));
        let cols = self.cols.min(max_cols.max(1));
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            data.extend_from_slice(&self.row(i)[..cols]);
        }
        Self { rows, cols, data }
    }

    /// Sum of all entries.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.rows {
            let cells: Vec<String> = self.row(i).iter().map(|v| format!("{v:8.3}")).collect();
            writeln!(f, "[{}]", cells.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_empty() {
        assert!(matches!(
            Matrix::new(0, 3, vec![]),
            Err(HarnessError::EmptyMatrix { rows: 0, cols: 3 })
        ));
        assert!(matches!(
            Matrix::new(2, 0, vec![]),
            Err(HarnessError::EmptyMatrix { .. })
        ));
    }

    #[test]
    fn new_rejects_wrong_length() {
        let err = Matrix::new(2, 2, vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, HarnessError::ShapeMismatch { len: 3, .. }));
    }

    #[test]
    fn from_fn_row_major() {
        let m = Matrix::from_fn(2, 3, |i, j| (i * 10 + j) as f64).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.as_slice(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(m.get(1, 2), 12.0);
        assert_eq!(m.row(1), &[10.0, 11.0, 12.0]);
    }

    #[test]
    fn from_rows_ragged_fails() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(Matrix::from_rows(&rows).is_err());
    }

    #[test]
    fn from_rows_roundtrips_to_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let m = Matrix::from_rows(&rows).unwrap();
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m.to_rows(), rows);
    }

    #[test]
    fn set_then_get() {
        let mut m = Matrix::zeros(2, 2).unwrap();
        m.set(1, 0, 7.5);
        assert_eq!(m.get(1, 0), 7.5);
        assert_eq!(m.sum(), 7.5);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn get_out_of_bounds_panics() {
        let m = Matrix::zeros(2, 2).unwrap();
        let _ = m.get(2, 0);
    }

    #[test]
    fn corner_is_clamped() {
        let m = Matrix::from_fn(2, 5, |i, j| (i * 5 + j) as f64).unwrap();
        let c = m.corner(3, 3);
        assert_eq!(c.shape(), (2, 3));
        assert_eq!(c.as_slice(), &[0.0, 1.0, 2.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn display_uses_three_decimals() {
        let m = Matrix::new(1, 2, vec![0.5, 1.25]).unwrap();
        let s = m.to_string();
        assert!(s.contains("0.500"));
        assert!(s.contains("1.250"));
    }
}
