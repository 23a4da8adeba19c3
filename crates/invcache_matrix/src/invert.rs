use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matrix::Matrix;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvertError {
    #[error("matrix is not square ({rows}x{cols})")]
    NotSquare { rows: usize, cols: usize },
    #[error("matrix is singular (no usable pivot in column {pivot_col})")]
    Singular { pivot_col: usize },
    #[error("cannot invert an empty matrix")]
    Empty,
    #[error("matrix contains NaN or infinite entries")]
    NonFinite,
}

/// Options handed through to the inversion collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvertOptions {
    /// Pivots with an absolute value at or below this are treated as zero.
    pub tolerance: f64,
}

impl Default for InvertOptions {
    fn default() -> Self {
        Self { tolerance: 1e-12 }
    }
}

/// Computes a matrix inverse.
///
/// Implementations must be pure: the same input and options always produce
/// the same result, and nothing outside the returned value is modified.
pub trait Inverter: Send + Sync {
    fn invert(&self, matrix: &Matrix, options: &InvertOptions) -> Result<Matrix, InvertError>;
}

impl<F> Inverter for F
where
    F: Fn(&Matrix, &InvertOptions) -> Result<Matrix, InvertError> + Send + Sync,
{
    fn invert(&self, matrix: &Matrix, options: &InvertOptions) -> Result<Matrix, InvertError> {
        self(matrix, options)
    }
}

/// Gauss-Jordan elimination with partial pivoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussJordan;

impl Inverter for GaussJordan {
    fn invert(&self, matrix: &Matrix, options: &InvertOptions) -> Result<Matrix, InvertError> {
        invert(matrix, options)
    }
}

pub fn invert(matrix: &Matrix, options: &InvertOptions) -> Result<Matrix, InvertError> {
    if !matrix.is_square() {
        return Err(InvertError::NotSquare {
            rows: matrix.rows(),
            cols: matrix.cols(),
        });
    }
    if matrix.is_empty() {
        return Err(InvertError::Empty);
    }
    if matrix.as_slice().iter().any(|v| !v.is_finite()) {
        return Err(InvertError::NonFinite);
    }

    let n = matrix.rows();
    let mut work = matrix.as_slice().to_vec();
    let mut inverse = Matrix::identity(n);
    let inv = inverse.data_mut();

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_abs = libm::fabs(work[col * n + col]);
        for row in (col + 1)..n {
            let candidate = libm::fabs(work[row * n + col]);
            if candidate > pivot_abs {
                pivot_abs = candidate;
                pivot_row = row;
            }
        }
        if pivot_abs <= options.tolerance {
            return Err(InvertError::Singular { pivot_col: col });
        }

        if pivot_row != col {
            for k in 0..n {
                work.swap(col * n + k, pivot_row * n + k);
                inv.swap(col * n + k, pivot_row * n + k);
            }
        }

        let pivot = work[col * n + col];
        for k in 0..n {
            work[col * n + k] /= pivot;
            inv[col * n + k] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[row * n + col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                work[row * n + k] -= factor * work[col * n + k];
                inv[row * n + k] -= factor * inv[col * n + k];
            }
        }
    }

    if inv.iter().any(|v| !v.is_finite()) {
        return Err(InvertError::NonFinite);
    }
    Ok(inverse)
}
