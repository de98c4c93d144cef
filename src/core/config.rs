use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::deformations::Integrator;
use crate::kernels::KernelType;

/// Tolerances of the finite-difference parallel transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Relative deviation |actual/target - 1| of the transported squared norm
    /// above which a discretization warning is emitted
    pub renormalization_tolerance: f64,
    /// Maximal residual of the initial projection along the momenta
    pub orthogonality_tolerance: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            renormalization_tolerance: 0.02,
            orthogonality_tolerance: 1e-5,
        }
    }
}

/// Settings shared by every exponential and geodesic built from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeformationConfig {
    /// Ambient dimension of control points and template points
    pub dimension: usize,
    /// Kernel family used for shooting and flowing
    pub kernel_type: KernelType,
    /// Width of the deformation kernel
    pub kernel_width: f64,
    /// Number of time points of a bare exponential (including t = 0)
    pub number_of_time_points: usize,
    /// Time points per unit of time on each side of a geodesic
    pub concentration_of_time_points: f64,
    /// Scheme used to integrate the geodesic equations
    pub integrator: Integrator,
    /// Use the template points as control points
    pub dense_mode: bool,
    pub transport: TransportConfig,
}

impl Default for DeformationConfig {
    fn default() -> Self {
        Self {
            dimension: 3,
            kernel_type: KernelType::Exact,
            kernel_width: 1.0,
            number_of_time_points: 11,
            concentration_of_time_points: 10.0,
            integrator: Integrator::default(),
            dense_mode: false,
            transport: TransportConfig::default(),
        }
    }
}

impl DeformationConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set ambient dimension
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set kernel family and width
    pub fn with_kernel(mut self, kernel_type: KernelType, kernel_width: f64) -> Self {
        self.kernel_type = kernel_type;
        self.kernel_width = kernel_width;
        self
    }

    /// Set number of time points of bare exponentials
    pub fn with_number_of_time_points(mut self, number_of_time_points: usize) -> Self {
        self.number_of_time_points = number_of_time_points;
        self
    }

    /// Set geodesic time discretization density
    pub fn with_concentration_of_time_points(mut self, concentration: f64) -> Self {
        self.concentration_of_time_points = concentration;
        self
    }

    /// Set integration scheme
    pub fn with_integrator(mut self, integrator: Integrator) -> Self {
        self.integrator = integrator;
        self
    }

    /// Enable dense mode (control points are the template points)
    pub fn with_dense_mode(mut self, dense_mode: bool) -> Self {
        self.dense_mode = dense_mode;
        self
    }

    /// Set parallel transport tolerances
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Check every setting before it reaches the engine
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::InvalidParameter(
                "dimension must be at least 1".to_string(),
            ));
        }
        if !(self.kernel_width.is_finite() && self.kernel_width > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "kernel width must be strictly positive, got {}",
                self.kernel_width
            )));
        }
        if self.number_of_time_points == 0 {
            return Err(Error::InvalidParameter(
                "number of time points must be at least 1".to_string(),
            ));
        }
        if !(self.concentration_of_time_points.is_finite()
            && self.concentration_of_time_points > 0.0)
        {
            return Err(Error::InvalidParameter(format!(
                "concentration of time points must be strictly positive, got {}",
                self.concentration_of_time_points
            )));
        }
        let transport = &self.transport;
        if !(transport.renormalization_tolerance > 0.0 && transport.orthogonality_tolerance > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "transport tolerances must be strictly positive, got {:?}",
                transport
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration; missing fields take their defaults
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: DeformationConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
