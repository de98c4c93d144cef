pub mod gaussian;

pub use gaussian::GaussianKernel;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::{Error, Kernel, Result};

/// Kernel families known to the factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelType {
    /// No deformation kernel at all
    NoKernel,
    /// Dense Gaussian kernel
    #[default]
    Exact,
}

impl FromStr for KernelType {
    type Err = Error;

    /// Accepts "no_kernel" / "no-kernel" and "exact" / "torch", case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "no_kernel" | "no-kernel" => Ok(KernelType::NoKernel),
            "exact" | "torch" => Ok(KernelType::Exact),
            _ => Err(Error::UnknownKernel(s.to_string())),
        }
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelType::NoKernel => write!(f, "no_kernel"),
            KernelType::Exact => write!(f, "exact"),
        }
    }
}

/// Build a kernel of the given family
///
/// `NoKernel` yields `None`; every other family validates `kernel_width`.
pub fn factory(kernel_type: KernelType, kernel_width: f64) -> Result<Option<Arc<dyn Kernel>>> {
    match kernel_type {
        KernelType::NoKernel => Ok(None),
        KernelType::Exact => Ok(Some(Arc::new(GaussianKernel::new(kernel_width)?))),
    }
}

/// Block matrix R[(D·i + d), (D·j + d)] = K(x_i, x_j), of size (N·D)×(N·D)
///
/// This is the covariance structure of momenta under the RKHS metric,
/// flattened point-major.
pub fn rkhs_matrix(kernel: &dyn Kernel, control_points: &Array2<f64>) -> Array2<f64> {
    let (n, dimension) = control_points.dim();
    let gram = kernel.kernel_matrix(control_points);
    let mut out = Array2::zeros((n * dimension, n * dimension));
    for i in 0..n {
        for j in 0..n {
            for d in 0..dimension {
                out[[dimension * i + d, dimension * j + d]] = gram[[i, j]];
            }
        }
    }
    out
}
