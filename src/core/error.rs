use thiserror::Error;

/// Derived quantity whose dirty flag can block a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    /// Control-point and momenta trajectories, and the conserved norm
    Shoot,
    /// Template point trajectory
    Flow,
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quantity::Shoot => write!(f, "shoot"),
            Quantity::Flow => write!(f, "flow"),
        }
    }
}

/// Errors that can occur during deformation operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Ambient dimension mismatch
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Array shape mismatch, shapes given as (rows, cols)
    #[error("shape mismatch for {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },

    /// Control points or momenta missing or empty
    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    /// Invalid parameter value
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Geodesic time bounds not ordered
    #[error("invalid time bounds: expected tmin <= t0 <= tmax, got tmin={tmin}, t0={t0}, tmax={tmax}")]
    InvalidTimeBounds { tmin: f64, t0: f64, tmax: f64 },

    /// Query time outside of the geodesic span
    #[error("time {time} outside of [{tmin}, {tmax}]")]
    TimeOutOfRange { time: f64, tmin: f64, tmax: f64 },

    /// Read of a derived quantity that has not been updated
    #[error("stale {0}: inputs were modified without calling update()")]
    Stale(Quantity),

    /// Parallel transport projection left a residual along the geodesic velocity
    #[error("projection onto the orthogonal of the momenta is not orthogonal: residual {0}")]
    NotOrthogonal(f64),

    /// Trajectory index lookup out of range
    #[error("time index {index} out of range for trajectory of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Computation failed (e.g., kernel matrix not positive definite)
    #[error("computation failed: {0}")]
    ComputationFailed(String),

    /// Kernel factory received an unknown kernel name
    #[error("unknown kernel type: {0}")]
    UnknownKernel(String),

    /// Configuration (de)serialization failure
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convert serde_json errors to Error
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type for deformation operations
pub type Result<T> = std::result::Result<T, Error>;
