//! Bridges between `ndarray` point sets and `nalgebra` dense factorizations.

use nalgebra::{Cholesky, DMatrix, Dyn};
use ndarray::Array2;

use crate::core::error::{Error, Result};

/// Frobenius inner product ⟨a, b⟩ = Σ a_ij b_ij
pub fn inner(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

pub fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Cholesky factor of a symmetric positive definite matrix
pub fn cholesky(a: &Array2<f64>) -> Result<Cholesky<f64, Dyn>> {
    to_dmatrix(a).cholesky().ok_or_else(|| {
        Error::ComputationFailed(format!(
            "{}x{} kernel matrix is not positive definite",
            a.nrows(),
            a.ncols()
        ))
    })
}

/// Solve A·X = B column by column given the Cholesky factor of A
pub fn cholesky_solve(factor: &Cholesky<f64, Dyn>, rhs: &Array2<f64>) -> Array2<f64> {
    to_array2(&factor.solve(&to_dmatrix(rhs)))
}
