pub mod exponential;
pub mod geodesic;
pub mod integrator;
pub mod transport;

pub use exponential::Exponential;
pub use geodesic::{time_points_for, Geodesic};
pub use integrator::Integrator;
pub use transport::{rkhs_inner, rkhs_norm_squared, split_tangential, TangentialSplit};
