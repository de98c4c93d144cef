//! Building blocks of the Jacobi-field parallel transport: RKHS inner
//! products, the tangential/orthogonal split of a covector and the per-step
//! Cholesky cache of the control-point Gram matrices.

use nalgebra::{Cholesky, Dyn};
use ndarray::Array2;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::core::linalg::{cholesky, inner};
use crate::core::{Error, Kernel, Result};

/// RKHS inner product ⟨a, K(x, x) b⟩ of two covectors carried by `control_points`
pub fn rkhs_inner(
    kernel: &dyn Kernel,
    control_points: &Array2<f64>,
    a: &Array2<f64>,
    b: &Array2<f64>,
) -> f64 {
    inner(a, &kernel.convolve_unchecked(control_points, control_points, b))
}

/// Squared RKHS norm ⟨a, K(x, x) a⟩
pub fn rkhs_norm_squared(kernel: &dyn Kernel, control_points: &Array2<f64>, a: &Array2<f64>) -> f64 {
    rkhs_inner(kernel, control_points, a, a)
}

/// A covector split into its component along the momenta and the rest
#[derive(Debug, Clone, PartialEq)]
pub struct TangentialSplit {
    /// Coefficient along the momenta: ⟨v, K p⟩ / ⟨p, K p⟩
    pub tangential: f64,
    /// v - tangential · p
    pub orthogonal: Array2<f64>,
}

/// Project `vector` onto the RKHS-orthogonal of `momenta`
///
/// `norm_squared` is ⟨p, K p⟩. Zero momenta leave the vector untouched.
/// Fails with `NotOrthogonal` when the residual along the momenta exceeds
/// `tolerance`.
pub fn split_tangential(
    kernel: &dyn Kernel,
    control_points: &Array2<f64>,
    momenta: &Array2<f64>,
    vector: &Array2<f64>,
    norm_squared: f64,
    tolerance: f64,
) -> Result<TangentialSplit> {
    if norm_squared <= 0.0 {
        return Ok(TangentialSplit {
            tangential: 0.0,
            orthogonal: vector.clone(),
        });
    }

    let velocity = kernel.convolve_unchecked(control_points, control_points, momenta);
    let tangential = inner(vector, &velocity) / norm_squared;
    let mut orthogonal = vector.clone();
    orthogonal.scaled_add(-tangential, momenta);

    let residual = inner(&orthogonal, &velocity) / norm_squared;
    if residual.abs() > tolerance {
        return Err(Error::NotOrthogonal(residual));
    }

    Ok(TangentialSplit {
        tangential,
        orthogonal,
    })
}

/// Cholesky factors of the Gram matrices K(x_t, x_t), keyed by time index
///
/// Tagged with the generation of the shoot the control points came from; a
/// factor is never served for a different shoot, even one of the same length.
#[derive(Default)]
pub(crate) struct CholeskyCache {
    generation: u64,
    factors: HashMap<usize, Cholesky<f64, Dyn>>,
}

impl CholeskyCache {
    pub(crate) fn clear(&mut self) {
        self.factors.clear();
    }

    /// Drop every factor unless they were built from `generation`
    pub(crate) fn sync(&mut self, generation: u64) {
        if self.generation != generation {
            if !self.factors.is_empty() {
                debug!(
                    cached = self.factors.len(),
                    from = self.generation,
                    to = generation,
                    "discarding Cholesky factors of a previous shoot"
                );
            }
            self.factors.clear();
            self.generation = generation;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.factors.len()
    }

    /// Factor of the Gram matrix at `time_index`, computed and stored on first use
    pub(crate) fn factor(
        &mut self,
        time_index: usize,
        kernel: &dyn Kernel,
        control_points: &Array2<f64>,
    ) -> Result<&Cholesky<f64, Dyn>> {
        match self.factors.entry(time_index) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let factor = cholesky(&kernel.kernel_matrix(control_points)).map_err(|err| match err {
                    Error::ComputationFailed(msg) => {
                        Error::ComputationFailed(format!("time index {}: {}", time_index, msg))
                    }
                    other => other,
                })?;
                debug!(time_index, "cached Cholesky factor of the kernel matrix");
                Ok(entry.insert(factor))
            }
        }
    }
}

impl fmt::Debug for CholeskyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CholeskyCache")
            .field("generation", &self.generation)
            .field("factors", &self.factors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::GaussianKernel;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn test_split_removes_momenta_component() {
        let kernel = GaussianKernel::new(1.0).unwrap();
        let cp = arr2(&[[0.0, 0.0], [0.8, 0.1]]);
        let mom = arr2(&[[1.0, 0.2], [-0.3, 0.5]]);
        let v = arr2(&[[0.4, -0.1], [0.6, 0.9]]);
        let norm = rkhs_norm_squared(&kernel, &cp, &mom);

        let split = split_tangential(&kernel, &cp, &mom, &v, norm, 1e-5).unwrap();

        assert_relative_eq!(rkhs_inner(&kernel, &cp, &split.orthogonal, &mom), 0.0, epsilon = 1e-12);

        let mut rebuilt = split.orthogonal.clone();
        rebuilt.scaled_add(split.tangential, &mom);
        for (a, b) in rebuilt.iter().zip(v.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_split_of_momenta_is_purely_tangential() {
        let kernel = GaussianKernel::new(1.0).unwrap();
        let cp = arr2(&[[0.0], [1.0]]);
        let mom = arr2(&[[1.0], [2.0]]);
        let norm = rkhs_norm_squared(&kernel, &cp, &mom);

        let split = split_tangential(&kernel, &cp, &mom, &(&mom * 3.0), norm, 1e-5).unwrap();
        assert_relative_eq!(split.tangential, 3.0, epsilon = 1e-12);
        assert!(split.orthogonal.iter().all(|x| x.abs() < 1e-12));
    }

    #[test]
    fn test_split_with_zero_momenta_is_identity() {
        let kernel = GaussianKernel::new(1.0).unwrap();
        let cp = arr2(&[[0.0, 0.0]]);
        let mom = arr2(&[[0.0, 0.0]]);
        let v = arr2(&[[1.0, 2.0]]);

        let split = split_tangential(&kernel, &cp, &mom, &v, 0.0, 1e-5).unwrap();
        assert_eq!(split.tangential, 0.0);
        assert_eq!(split.orthogonal, v);
    }

    #[test]
    fn test_cache_is_discarded_across_generations() {
        let kernel = GaussianKernel::new(1.0).unwrap();
        let cp = arr2(&[[0.0, 0.0], [1.0, 0.0]]);
        let mut cache = CholeskyCache::default();

        cache.sync(1);
        cache.factor(1, &kernel, &cp).unwrap();
        cache.factor(2, &kernel, &cp).unwrap();
        cache.factor(1, &kernel, &cp).unwrap();
        assert_eq!(cache.len(), 2);

        cache.sync(1);
        assert_eq!(cache.len(), 2);

        cache.sync(2);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_cache_reports_singular_gram_matrix() {
        let kernel = GaussianKernel::new(1.0).unwrap();
        let duplicated = arr2(&[[0.0, 0.0], [0.0, 0.0]]);
        let mut cache = CholeskyCache::default();

        let result = cache.factor(3, &kernel, &duplicated);
        assert!(matches!(result, Err(Error::ComputationFailed(_))));
        assert_eq!(cache.len(), 0);
    }
}
