//! Dense real matrices.

use crate::error::{PackError, Result};
use std::ops::{Index, IndexMut};

/// Representation of a matrix as a flattened row-major order vector. Dimensions are only known at
/// runtime since they come from the parameter store.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    /// Constructs the zero matrix.
    pub fn zero(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0_f64; rows * cols],
        }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(PackError::UnsupportedShape(format!(
                "{} values cannot fill a {}x{} matrix",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn from_fn<F: FnMut(usize, usize) -> f64>(rows: usize, cols: usize, mut f: F) -> Self {
        let mut out = Self::zero(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                out[(r, c)] = f(r, c);
            }
        }
        out
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// Flattens the `height x width` block whose top-left corner is `(top, left)`, row by row.
    pub fn window(&self, top: usize, left: usize, height: usize, width: usize) -> Vec<f64> {
        debug_assert!(top + height <= self.rows, "window out of bounds");
        debug_assert!(left + width <= self.cols, "window out of bounds");
        let mut out = Vec::with_capacity(height * width);
        for r in top..top + height {
            out.extend_from_slice(&self.row(r)[left..left + width]);
        }
        out
    }

    /// Computes `self * v` for a column vector `v`.
    pub fn mul_vec(&self, v: &[f64]) -> Vec<f64> {
        debug_assert_eq!(v.len(), self.cols, "dimensions do not match");
        (0..self.rows)
            .map(|r| self.row(r).iter().zip(v).map(|(a, b)| a * b).sum())
            .collect()
    }

    pub fn transpose(&self) -> Self {
        Self::from_fn(self.cols, self.rows, |r, c| self[(c, r)])
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = f64;

    /// Returns the `(row, col)` element of the matrix.
    fn index(&self, index: (usize, usize)) -> &Self::Output {
        debug_assert!(index.0 < self.rows, "index out of bounds");
        debug_assert!(index.1 < self.cols, "index out of bounds");
        &self.data[index.0 * self.cols + index.1]
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        debug_assert!(index.0 < self.rows, "index out of bounds");
        debug_assert!(index.1 < self.cols, "index out of bounds");
        &mut self.data[index.0 * self.cols + index.1]
    }
}
