//! Fixed-step integrators of the geodesic (Hamiltonian) equations
//!
//! dx/dt = K(x, x) p,   dp/dt = -∂/∂x ½ pᵀ K(x, x) p
//!
//! No adaptive stepping: the step is always 1 / (T - 1).

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::core::Kernel;

/// Fixed-step scheme for shooting control points and momenta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integrator {
    /// Explicit Euler (1st order)
    Euler,
    /// Midpoint Runge-Kutta (2nd order); template points use Heun's method
    #[default]
    Rk2,
}

impl Integrator {
    /// One step of length `h` from `(control_points, momenta)`
    pub fn step(
        self,
        kernel: &dyn Kernel,
        control_points: &Array2<f64>,
        momenta: &Array2<f64>,
        h: f64,
    ) -> (Array2<f64>, Array2<f64>) {
        match self {
            Integrator::Euler => euler_step(kernel, control_points, momenta, h),
            Integrator::Rk2 => rk2_step(kernel, control_points, momenta, h),
        }
    }
}

pub fn euler_step(
    kernel: &dyn Kernel,
    control_points: &Array2<f64>,
    momenta: &Array2<f64>,
    h: f64,
) -> (Array2<f64>, Array2<f64>) {
    let velocity = kernel.convolve_unchecked(control_points, control_points, momenta);
    let force = kernel.convolve_gradient_unchecked(momenta, control_points);
    (
        control_points + &(velocity * h),
        momenta - &(force * h),
    )
}

/// Midpoint step: half an Euler step, then the full step with the kernel at the midpoint
pub fn rk2_step(
    kernel: &dyn Kernel,
    control_points: &Array2<f64>,
    momenta: &Array2<f64>,
    h: f64,
) -> (Array2<f64>, Array2<f64>) {
    let (mid_control_points, mid_momenta) = euler_step(kernel, control_points, momenta, 0.5 * h);
    let velocity = kernel.convolve_unchecked(&mid_control_points, &mid_control_points, &mid_momenta);
    let force = kernel.convolve_gradient_unchecked(&mid_momenta, &mid_control_points);
    (
        control_points + &(velocity * h),
        momenta - &(force * h),
    )
}

/// Midpoint step returning positions only (skips the final gradient evaluation)
pub fn rk2_position_step(
    kernel: &dyn Kernel,
    control_points: &Array2<f64>,
    momenta: &Array2<f64>,
    h: f64,
) -> Array2<f64> {
    let (mid_control_points, mid_momenta) = euler_step(kernel, control_points, momenta, 0.5 * h);
    let velocity = kernel.convolve_unchecked(&mid_control_points, &mid_control_points, &mid_momenta);
    control_points + &(velocity * h)
}
