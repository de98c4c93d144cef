pub mod core;
pub mod deformations;
pub mod kernels;
pub mod tools;

// Flat re-exports for convenience
pub use core::{Cached, DeformationConfig, Error, Kernel, Quantity, Result, TransportConfig};

// Re-export deformation types
pub use deformations::{Exponential, Geodesic, Integrator, TangentialSplit};

// Re-export kernel types
pub use kernels::{GaussianKernel, KernelType};

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::core::{DeformationConfig, Error, Kernel, Result};
    pub use crate::deformations::{Exponential, Geodesic, Integrator};
    pub use crate::kernels::{factory, GaussianKernel, KernelType};
}
