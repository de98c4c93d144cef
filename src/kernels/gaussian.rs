use ndarray::{Array2, ArrayView1};

use crate::core::{Error, Kernel, Result};
use crate::kernels::KernelType;

/// Dense Gaussian kernel K(x, y) = exp(-‖x - y‖² / σ²)
///
/// Every operation is an exact O(N·M) double loop. This is also the kernel
/// used by parallel transport, whatever kernel drives the shooting.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel {
    width: f64,
}

impl GaussianKernel {
    pub fn new(width: f64) -> Result<Self> {
        if !(width.is_finite() && width > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "kernel width must be strictly positive, got {}",
                width
            )));
        }
        Ok(GaussianKernel { width })
    }

    #[inline]
    fn value(&self, squared_distance: f64) -> f64 {
        (-squared_distance / (self.width * self.width)).exp()
    }
}

#[inline]
fn squared_distance(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    x.iter().zip(y.iter()).map(|(a, b)| (a - b) * (a - b)).sum()
}

impl Kernel for GaussianKernel {
    fn kernel_type(&self) -> KernelType {
        KernelType::Exact
    }

    fn kernel_width(&self) -> f64 {
        self.width
    }

    fn evaluate(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        self.value(squared_distance(x, y))
    }

    fn convolve_unchecked(
        &self,
        queries: &Array2<f64>,
        sources: &Array2<f64>,
        weights: &Array2<f64>,
    ) -> Array2<f64> {
        let mut out = Array2::zeros((queries.nrows(), weights.ncols()));
        for (x, mut row) in queries.outer_iter().zip(out.outer_iter_mut()) {
            for (y, w) in sources.outer_iter().zip(weights.outer_iter()) {
                row.scaled_add(self.value(squared_distance(x, y)), &w);
            }
        }
        out
    }

    /// ∂/∂x_i of ½ Σ_jk w_j·K(x_j, x_k)·w_k, i.e.
    /// -(2/σ²) Σ_j (w_i·w_j) K(x_i, x_j) (x_i - x_j)
    fn convolve_gradient_unchecked(
        &self,
        weights: &Array2<f64>,
        points: &Array2<f64>,
    ) -> Array2<f64> {
        let scale = -2.0 / (self.width * self.width);
        let mut out = Array2::zeros(points.raw_dim());
        for (i, mut row) in out.outer_iter_mut().enumerate() {
            let xi = points.row(i);
            let wi = weights.row(i);
            for (xj, wj) in points.outer_iter().zip(weights.outer_iter()) {
                let coefficient = scale * wi.dot(&wj) * self.value(squared_distance(xi, xj));
                for d in 0..row.len() {
                    row[d] += coefficient * (xi[d] - xj[d]);
                }
            }
        }
        out
    }
}
