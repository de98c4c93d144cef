use ndarray::{Array2, ArrayView1};
use std::fmt::Debug;

use crate::core::error::{Error, Result};
use crate::kernels::KernelType;

/// Radial-basis kernel generating velocity fields from momenta carried by points
///
/// Dense, tree-based or device-resident implementations are interchangeable
/// as long as they reproduce `convolve` and `convolve_gradient` to
/// floating-point tolerance. The deformation engine only talks to this trait.
pub trait Kernel: Debug + Send + Sync {
    /// Which family this kernel belongs to
    fn kernel_type(&self) -> KernelType;

    /// Width of the kernel, strictly positive
    fn kernel_width(&self) -> f64;

    /// Scalar kernel value K(x, y)
    fn evaluate(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64;

    /// Vector field generated by `weights` carried at `sources`, sampled at `queries`
    /// (unchecked, assumes valid input)
    ///
    /// out_i = Σ_j K(queries_i, sources_j) · weights_j
    fn convolve_unchecked(
        &self,
        queries: &Array2<f64>,
        sources: &Array2<f64>,
        weights: &Array2<f64>,
    ) -> Array2<f64>;

    /// Convolution with validation
    ///
    /// Validates shapes before calling `convolve_unchecked`.
    fn convolve(
        &self,
        queries: &Array2<f64>,
        sources: &Array2<f64>,
        weights: &Array2<f64>,
    ) -> Result<Array2<f64>> {
        validate_convolution(queries, sources, weights)?;
        Ok(self.convolve_unchecked(queries, sources, weights))
    }

    /// Gradient of the Hamiltonian ½ Σ_ij w_i·K(x_i, x_j)·w_j with respect to the points
    /// (unchecked, assumes valid input)
    fn convolve_gradient_unchecked(&self, weights: &Array2<f64>, points: &Array2<f64>)
        -> Array2<f64>;

    /// Hamiltonian gradient with validation
    fn convolve_gradient(&self, weights: &Array2<f64>, points: &Array2<f64>) -> Result<Array2<f64>> {
        if weights.dim() != points.dim() {
            return Err(Error::ShapeMismatch {
                what: "convolve_gradient weights",
                expected: points.dim(),
                got: weights.dim(),
            });
        }
        Ok(self.convolve_gradient_unchecked(weights, points))
    }

    /// Gram matrix G_ij = K(x_i, x_j)
    fn kernel_matrix(&self, points: &Array2<f64>) -> Array2<f64> {
        let n = points.nrows();
        Array2::from_shape_fn((n, n), |(i, j)| self.evaluate(points.row(i), points.row(j)))
    }
}

fn validate_convolution(
    queries: &Array2<f64>,
    sources: &Array2<f64>,
    weights: &Array2<f64>,
) -> Result<()> {
    if queries.ncols() != sources.ncols() {
        return Err(Error::DimensionMismatch {
            expected: sources.ncols(),
            got: queries.ncols(),
        });
    }
    if weights.nrows() != sources.nrows() {
        return Err(Error::ShapeMismatch {
            what: "convolve weights",
            expected: (sources.nrows(), weights.ncols()),
            got: weights.dim(),
        });
    }
    Ok(())
}
