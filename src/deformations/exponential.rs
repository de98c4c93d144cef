use ndarray::Array2;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::linalg::cholesky_solve;
use crate::core::{Cached, DeformationConfig, Error, Kernel, Quantity, Result, TransportConfig};
use crate::deformations::integrator::{rk2_position_step, Integrator};
use crate::deformations::transport::{
    rkhs_inner, rkhs_norm_squared, split_tangential, CholeskyCache,
};
use crate::kernels::{self, GaussianKernel};

/// Control-point and momenta trajectories of one shoot
#[derive(Debug, Clone)]
struct ShootState {
    control_points_t: Vec<Array2<f64>>,
    momenta_t: Vec<Array2<f64>>,
    norm_squared: f64,
    generation: u64,
}

/// Control-point LDDMM exponential over the unit time interval
///
/// Shoots `(control points, momenta)` along the geodesic equations and flows
/// template points along the resulting velocity field. Inputs are set with the
/// `set_*` methods, derived trajectories are (re)computed by `update`, and
/// reading a trajectory whose inputs changed since the last `update` is an
/// `Error::Stale`.
#[derive(Debug)]
pub struct Exponential {
    kernel: Arc<dyn Kernel>,
    dimension: usize,
    number_of_time_points: usize,
    integrator: Integrator,
    transport: TransportConfig,
    initial_control_points: Option<Array2<f64>>,
    initial_momenta: Option<Array2<f64>>,
    initial_template_data: Option<Array2<f64>>,
    shoot: Cached<ShootState>,
    flow: Cached<Vec<Array2<f64>>>,
    cholesky: CholeskyCache,
    generation: u64,
}

impl Exponential {
    /// Exponential driven by `kernel`; the kernel settings of `config` are ignored
    pub fn new(kernel: Arc<dyn Kernel>, config: &DeformationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Exponential {
            kernel,
            dimension: config.dimension,
            number_of_time_points: config.number_of_time_points,
            integrator: config.integrator,
            transport: config.transport.clone(),
            initial_control_points: None,
            initial_momenta: None,
            initial_template_data: None,
            shoot: Cached::Stale,
            flow: Cached::Stale,
            cholesky: CholeskyCache::default(),
            generation: 0,
        })
    }

    /// Exponential with the kernel described by `config`
    pub fn from_config(config: &DeformationConfig) -> Result<Self> {
        let kernel = required_kernel(config)?;
        Self::new(kernel, config)
    }

    pub fn kernel(&self) -> &dyn Kernel {
        self.kernel.as_ref()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn number_of_time_points(&self) -> usize {
        self.number_of_time_points
    }

    pub fn integrator(&self) -> Integrator {
        self.integrator
    }

    pub fn transport_config(&self) -> &TransportConfig {
        &self.transport
    }

    pub fn initial_control_points(&self) -> Option<&Array2<f64>> {
        self.initial_control_points.as_ref()
    }

    pub fn initial_momenta(&self) -> Option<&Array2<f64>> {
        self.initial_momenta.as_ref()
    }

    pub fn initial_template_data(&self) -> Option<&Array2<f64>> {
        self.initial_template_data.as_ref()
    }

    pub fn is_shoot_stale(&self) -> bool {
        self.shoot.is_stale()
    }

    pub fn is_flow_stale(&self) -> bool {
        self.flow.is_stale()
    }

    pub fn set_kernel(&mut self, kernel: Arc<dyn Kernel>) {
        self.kernel = kernel;
        self.invalidate_shoot();
    }

    pub fn set_integrator(&mut self, integrator: Integrator) {
        self.integrator = integrator;
        self.invalidate_shoot();
    }

    pub fn set_number_of_time_points(&mut self, number_of_time_points: usize) -> Result<()> {
        if number_of_time_points == 0 {
            return Err(Error::InvalidParameter(
                "number of time points must be at least 1".to_string(),
            ));
        }
        if number_of_time_points != self.number_of_time_points {
            self.number_of_time_points = number_of_time_points;
            self.invalidate_shoot();
        }
        Ok(())
    }

    pub fn set_initial_control_points(&mut self, control_points: Array2<f64>) -> Result<()> {
        validate_points(&control_points, self.dimension, "control points")?;
        self.initial_control_points = Some(control_points);
        self.invalidate_shoot();
        Ok(())
    }

    pub fn set_initial_momenta(&mut self, momenta: Array2<f64>) -> Result<()> {
        validate_points(&momenta, self.dimension, "momenta")?;
        self.initial_momenta = Some(momenta);
        self.invalidate_shoot();
        Ok(())
    }

    pub fn set_initial_template_data(&mut self, template_data: Array2<f64>) -> Result<()> {
        validate_points(&template_data, self.dimension, "template data")?;
        self.initial_template_data = Some(template_data);
        self.flow.invalidate();
        Ok(())
    }

    fn invalidate_shoot(&mut self) {
        self.shoot.invalidate();
        self.flow.invalidate();
    }

    /// Recompute whatever the last setters made stale
    ///
    /// Shoots when control points, momenta or discretization changed, then
    /// flows the template data if there is any.
    pub fn update(&mut self) -> Result<()> {
        if self.shoot.is_stale() {
            self.cholesky.clear();
            self.shoot()?;
        }
        if self.flow.is_stale() {
            if self.initial_template_data.is_some() {
                self.flow()?;
            } else {
                warn!("exponential update: no template data, nothing to flow");
            }
        }
        Ok(())
    }

    fn shoot(&mut self) -> Result<()> {
        let control_points = self
            .initial_control_points
            .as_ref()
            .ok_or(Error::EmptyInput("initial control points"))?;
        let momenta = self
            .initial_momenta
            .as_ref()
            .ok_or(Error::EmptyInput("initial momenta"))?;
        if momenta.dim() != control_points.dim() {
            return Err(Error::ShapeMismatch {
                what: "initial momenta",
                expected: control_points.dim(),
                got: momenta.dim(),
            });
        }

        let kernel = self.kernel.as_ref();
        let dt = step_length(self.number_of_time_points);
        let mut control_points_t = Vec::with_capacity(self.number_of_time_points);
        let mut momenta_t = Vec::with_capacity(self.number_of_time_points);
        control_points_t.push(control_points.clone());
        momenta_t.push(momenta.clone());

        for i in 0..self.number_of_time_points - 1 {
            let (next_control_points, next_momenta) =
                self.integrator.step(kernel, &control_points_t[i], &momenta_t[i], dt);
            control_points_t.push(next_control_points);
            momenta_t.push(next_momenta);
        }

        let norm_squared = rkhs_norm_squared(kernel, control_points, momenta);

        self.generation += 1;
        debug!(
            generation = self.generation,
            time_points = self.number_of_time_points,
            control_points = control_points.nrows(),
            norm_squared,
            "shoot"
        );
        self.shoot = Cached::Fresh(ShootState {
            control_points_t,
            momenta_t,
            norm_squared,
            generation: self.generation,
        });
        self.flow.invalidate();
        Ok(())
    }

    fn flow(&mut self) -> Result<()> {
        let shoot = self.shoot.get(Quantity::Shoot)?;
        let template_data = self
            .initial_template_data
            .as_ref()
            .ok_or(Error::EmptyInput("initial template data"))?;

        let kernel = self.kernel.as_ref();
        let dt = step_length(self.number_of_time_points);
        let mut template_data_t = Vec::with_capacity(self.number_of_time_points);
        template_data_t.push(template_data.clone());

        for i in 0..self.number_of_time_points - 1 {
            let current = &template_data_t[i];
            let velocity =
                kernel.convolve_unchecked(current, &shoot.control_points_t[i], &shoot.momenta_t[i]);
            let mut next = current + &(&velocity * dt);

            if self.integrator == Integrator::Rk2 {
                // Heun: average with the velocity at the predicted end point
                let end_velocity = kernel.convolve_unchecked(
                    &next,
                    &shoot.control_points_t[i + 1],
                    &shoot.momenta_t[i + 1],
                );
                next = current + &((&velocity + &end_velocity) * (0.5 * dt));
            }
            template_data_t.push(next);
        }

        debug!(
            time_points = self.number_of_time_points,
            points = template_data.nrows(),
            "flow"
        );
        self.flow = Cached::Fresh(template_data_t);
        Ok(())
    }

    /// Squared RKHS norm ⟨p₀, K(x₀, x₀) p₀⟩ of the initial momenta
    pub fn get_norm_squared(&self) -> Result<f64> {
        Ok(self.shoot.get(Quantity::Shoot)?.norm_squared)
    }

    pub fn control_points_trajectory(&self) -> Result<&[Array2<f64>]> {
        Ok(self.shoot.get(Quantity::Shoot)?.control_points_t.as_slice())
    }

    pub fn momenta_trajectory(&self) -> Result<&[Array2<f64>]> {
        Ok(self.shoot.get(Quantity::Shoot)?.momenta_t.as_slice())
    }

    pub fn template_trajectory(&self) -> Result<&[Array2<f64>]> {
        Ok(self.flow.get(Quantity::Flow)?.as_slice())
    }

    /// Template points at `time_index`, or at the final time when `None`
    pub fn get_template_data(&self, time_index: Option<usize>) -> Result<&Array2<f64>> {
        let trajectory = self.template_trajectory()?;
        let index = time_index.unwrap_or(trajectory.len() - 1);
        trajectory.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: trajectory.len(),
        })
    }

    /// Number of Gram matrix factorizations kept for parallel transport
    pub fn cached_factor_count(&self) -> usize {
        self.cholesky.len()
    }

    /// Parallel transport of `momenta` along the shot trajectory
    ///
    /// The component along the initial momenta is split off, the orthogonal
    /// remainder is carried along by finite-difference Jacobi fields and
    /// rescaled at every step by the ratio of its initial squared RKHS norm to
    /// the current one. With
    /// `keep_tangential` the tangential component is added back along the
    /// momenta trajectory. Returns one covector per time point.
    pub fn parallel_transport(
        &mut self,
        momenta: &Array2<f64>,
        keep_tangential: bool,
    ) -> Result<Vec<Array2<f64>>> {
        let shoot = self.shoot.get(Quantity::Shoot)?;
        let control_points_t = &shoot.control_points_t;
        let momenta_t = &shoot.momenta_t;
        if momenta.dim() != momenta_t[0].dim() {
            return Err(Error::ShapeMismatch {
                what: "transported momenta",
                expected: momenta_t[0].dim(),
                got: momenta.dim(),
            });
        }

        // transport always runs on the dense kernel
        let kernel = GaussianKernel::new(self.kernel.kernel_width())?;
        let norm_squared = shoot.norm_squared;
        let split = split_tangential(
            &kernel,
            &control_points_t[0],
            &momenta_t[0],
            momenta,
            norm_squared,
            self.transport.orthogonality_tolerance,
        )?;
        let target_norm = rkhs_norm_squared(&kernel, &control_points_t[0], &split.orthogonal);

        self.cholesky.sync(shoot.generation);

        let number_of_time_points = control_points_t.len();
        let mut transport = Vec::with_capacity(number_of_time_points);
        transport.push(split.orthogonal);

        if target_norm > 0.0 {
            let dt = step_length(number_of_time_points);
            let epsilon = dt;
            for i in 0..number_of_time_points - 1 {
                let perturbation = &transport[i] * epsilon;
                let plus = rk2_position_step(
                    &kernel,
                    &control_points_t[i],
                    &(&momenta_t[i] + &perturbation),
                    dt,
                );
                let minus = rk2_position_step(
                    &kernel,
                    &control_points_t[i],
                    &(&momenta_t[i] - &perturbation),
                    dt,
                );
                let approx_velocity = (&plus - &minus) / (2.0 * epsilon * dt);

                let next_control_points = &control_points_t[i + 1];
                let next_momenta = &momenta_t[i + 1];
                let factor = self.cholesky.factor(i + 1, &kernel, next_control_points)?;
                let mut approx_momenta = cholesky_solve(factor, &approx_velocity);

                if norm_squared > 0.0 {
                    let drift = rkhs_inner(&kernel, next_control_points, &approx_momenta, next_momenta)
                        / norm_squared;
                    approx_momenta.scaled_add(-drift, next_momenta);
                }

                let actual_norm = rkhs_norm_squared(&kernel, next_control_points, &approx_momenta);
                if actual_norm <= 0.0 {
                    return Err(Error::ComputationFailed(format!(
                        "transported momenta vanished at step {}",
                        i + 1
                    )));
                }
                let ratio = actual_norm / target_norm;
                if (ratio - 1.0).abs() > self.transport.renormalization_tolerance {
                    warn!(
                        step = i + 1,
                        factor = ratio,
                        "large renormalization required during parallel transport, use a finer time discretization"
                    );
                }

                approx_momenta *= ratio.recip();
                transport.push(approx_momenta);
            }
        } else {
            let zeros = Array2::zeros(momenta.raw_dim());
            transport.resize(number_of_time_points, zeros);
        }

        if keep_tangential {
            for (transported, momenta) in transport.iter_mut().zip(momenta_t) {
                transported.scaled_add(split.tangential, momenta);
            }
        }

        debug!(
            time_points = number_of_time_points,
            tangential = split.tangential,
            cached_factors = self.cholesky.len(),
            "parallel transport"
        );
        Ok(transport)
    }
}

/// Time step of a trajectory over [0, 1] with `number_of_time_points` samples
pub(crate) fn step_length(number_of_time_points: usize) -> f64 {
    if number_of_time_points > 1 {
        1.0 / (number_of_time_points - 1) as f64
    } else {
        0.0
    }
}

/// Non-empty point set whose columns match the ambient dimension
pub(crate) fn validate_points(
    points: &Array2<f64>,
    dimension: usize,
    what: &'static str,
) -> Result<()> {
    if points.nrows() == 0 {
        return Err(Error::EmptyInput(what));
    }
    if points.ncols() != dimension {
        return Err(Error::DimensionMismatch {
            expected: dimension,
            got: points.ncols(),
        });
    }
    Ok(())
}

/// Deformation kernel of `config`; a deformation cannot run without one
pub(crate) fn required_kernel(config: &DeformationConfig) -> Result<Arc<dyn Kernel>> {
    config.validate()?;
    kernels::factory(config.kernel_type, config.kernel_width)?.ok_or_else(|| {
        Error::InvalidParameter(format!(
            "a deformation needs a kernel, got {}",
            config.kernel_type
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::KernelType;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    fn planar(number_of_time_points: usize, integrator: Integrator) -> Exponential {
        let config = DeformationConfig::new()
            .with_dimension(2)
            .with_kernel(KernelType::Exact, 1.0)
            .with_number_of_time_points(number_of_time_points)
            .with_integrator(integrator);
        Exponential::from_config(&config).unwrap()
    }

    fn two_points() -> (Array2<f64>, Array2<f64>) {
        (
            arr2(&[[0.0, 0.0], [0.7, 0.2]]),
            arr2(&[[0.5, 0.3], [-0.2, 0.6]]),
        )
    }

    #[test]
    fn test_reads_before_update_are_stale() {
        let mut exponential = planar(5, Integrator::Rk2);
        let (cp, mom) = two_points();
        exponential.set_initial_control_points(cp).unwrap();
        exponential.set_initial_momenta(mom).unwrap();

        assert_eq!(exponential.get_norm_squared(), Err(Error::Stale(Quantity::Shoot)));
        assert!(matches!(
            exponential.get_template_data(None),
            Err(Error::Stale(Quantity::Flow))
        ));
        assert!(matches!(
            exponential.parallel_transport(&arr2(&[[1.0, 0.0], [0.0, 1.0]]), true),
            Err(Error::Stale(Quantity::Shoot))
        ));
    }

    #[test]
    fn test_update_requires_both_inputs() {
        let mut exponential = planar(5, Integrator::Rk2);
        exponential
            .set_initial_control_points(arr2(&[[0.0, 0.0]]))
            .unwrap();
        assert_eq!(
            exponential.update(),
            Err(Error::EmptyInput("initial momenta"))
        );

        exponential
            .set_initial_momenta(arr2(&[[1.0, 0.0], [0.0, 1.0]]))
            .unwrap();
        assert!(matches!(
            exponential.update(),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_setters_validate_eagerly() {
        let mut exponential = planar(5, Integrator::Rk2);
        assert!(matches!(
            exponential.set_initial_control_points(arr2(&[[0.0, 0.0, 0.0]])),
            Err(Error::DimensionMismatch { expected: 2, got: 3 })
        ));
        assert_eq!(
            exponential.set_initial_momenta(Array2::zeros((0, 2))),
            Err(Error::EmptyInput("momenta"))
        );
        assert!(exponential.set_number_of_time_points(0).is_err());
    }

    #[test]
    fn test_no_kernel_config_is_rejected() {
        let config = DeformationConfig::new().with_kernel(KernelType::NoKernel, 1.0);
        assert!(matches!(
            Exponential::from_config(&config),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_trajectories_have_one_snapshot_per_time_point() {
        let mut exponential = planar(7, Integrator::Rk2);
        let (cp, mom) = two_points();
        exponential.set_initial_control_points(cp.clone()).unwrap();
        exponential.set_initial_momenta(mom.clone()).unwrap();
        exponential
            .set_initial_template_data(arr2(&[[0.1, 0.1], [0.4, -0.3], [1.0, 1.0]]))
            .unwrap();
        exponential.update().unwrap();

        assert_eq!(exponential.control_points_trajectory().unwrap().len(), 7);
        assert_eq!(exponential.momenta_trajectory().unwrap().len(), 7);
        assert_eq!(exponential.template_trajectory().unwrap().len(), 7);
        assert_eq!(exponential.control_points_trajectory().unwrap()[0], cp);
        assert_eq!(exponential.momenta_trajectory().unwrap()[0], mom);

        let last = exponential.get_template_data(None).unwrap();
        assert_eq!(last, exponential.get_template_data(Some(6)).unwrap());
        assert!(matches!(
            exponential.get_template_data(Some(7)),
            Err(Error::IndexOutOfRange { index: 7, len: 7 })
        ));
    }

    #[test]
    fn test_single_time_point_is_identity() {
        let mut exponential = planar(1, Integrator::Rk2);
        let (cp, mom) = two_points();
        exponential.set_initial_control_points(cp.clone()).unwrap();
        exponential.set_initial_momenta(mom).unwrap();
        exponential.set_initial_template_data(cp.clone()).unwrap();
        exponential.update().unwrap();

        let control_points_t = exponential.control_points_trajectory().unwrap();
        assert_eq!(control_points_t.len(), 1);
        assert_eq!(control_points_t[0], cp);
        assert_eq!(exponential.get_template_data(None).unwrap(), &cp);
    }

    #[test]
    fn test_template_on_single_control_point_follows_it() {
        for integrator in [Integrator::Euler, Integrator::Rk2] {
            let mut exponential = planar(6, integrator);
            let cp = arr2(&[[0.2, -0.1]]);
            exponential.set_initial_control_points(cp.clone()).unwrap();
            exponential.set_initial_momenta(arr2(&[[0.8, 0.4]])).unwrap();
            exponential.set_initial_template_data(cp).unwrap();
            exponential.update().unwrap();

            let control_points_t = exponential.control_points_trajectory().unwrap();
            let template_t = exponential.template_trajectory().unwrap();
            for (x, y) in control_points_t.iter().zip(template_t) {
                assert_relative_eq!(x[[0, 0]], y[[0, 0]], epsilon = 1e-14);
                assert_relative_eq!(x[[0, 1]], y[[0, 1]], epsilon = 1e-14);
            }
            assert_relative_eq!(template_t[5][[0, 0]], 1.0, epsilon = 1e-12);
            assert_relative_eq!(template_t[5][[0, 1]], 0.3, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_unchanged_time_points_keep_shoot() {
        let mut exponential = planar(5, Integrator::Rk2);
        let (cp, mom) = two_points();
        exponential.set_initial_control_points(cp).unwrap();
        exponential.set_initial_momenta(mom).unwrap();
        exponential.update().unwrap();

        exponential.set_number_of_time_points(5).unwrap();
        assert!(!exponential.is_shoot_stale());

        exponential.set_number_of_time_points(9).unwrap();
        assert!(exponential.is_shoot_stale());
        exponential.update().unwrap();
        assert_eq!(exponential.momenta_trajectory().unwrap().len(), 9);
    }

    #[test]
    fn test_flow_only_update_keeps_cholesky_cache() {
        let mut exponential = planar(5, Integrator::Rk2);
        let (cp, mom) = two_points();
        exponential.set_initial_control_points(cp.clone()).unwrap();
        exponential.set_initial_momenta(mom).unwrap();
        exponential.update().unwrap();

        exponential
            .parallel_transport(&arr2(&[[0.0, 1.0], [1.0, 0.0]]), false)
            .unwrap();
        assert_eq!(exponential.cached_factor_count(), 4);

        exponential.set_initial_template_data(cp).unwrap();
        assert!(!exponential.is_shoot_stale());
        exponential.update().unwrap();
        assert_eq!(exponential.cached_factor_count(), 4);

        exponential.set_integrator(Integrator::Euler);
        exponential.update().unwrap();
        assert_eq!(exponential.cached_factor_count(), 0);
    }

    #[test]
    fn test_transport_rejects_wrong_shape() {
        let mut exponential = planar(5, Integrator::Rk2);
        let (cp, mom) = two_points();
        exponential.set_initial_control_points(cp).unwrap();
        exponential.set_initial_momenta(mom).unwrap();
        exponential.update().unwrap();

        assert!(matches!(
            exponential.parallel_transport(&arr2(&[[1.0, 0.0]]), true),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_transport_of_momenta_multiple() {
        let mut exponential = planar(5, Integrator::Rk2);
        let (cp, mom) = two_points();
        exponential.set_initial_control_points(cp).unwrap();
        exponential.set_initial_momenta(mom.clone()).unwrap();
        exponential.update().unwrap();

        let orthogonal_only = exponential.parallel_transport(&(&mom * 2.0), false).unwrap();
        assert_eq!(orthogonal_only.len(), 5);
        for transported in &orthogonal_only {
            assert!(transported.iter().all(|x| x.abs() < 1e-12));
        }

        let with_tangential = exponential.parallel_transport(&(&mom * 2.0), true).unwrap();
        let momenta_t = exponential.momenta_trajectory().unwrap();
        for (transported, momenta) in with_tangential.iter().zip(momenta_t) {
            for (a, b) in transported.iter().zip(momenta.iter()) {
                assert_relative_eq!(*a, 2.0 * b, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_transport_preserves_rkhs_norm() {
        let mut exponential = planar(11, Integrator::Rk2);
        let (cp, mom) = two_points();
        exponential.set_initial_control_points(cp).unwrap();
        exponential.set_initial_momenta(mom).unwrap();
        exponential.update().unwrap();

        let v = arr2(&[[0.3, -0.4], [0.1, 0.2]]);
        let transported = exponential.parallel_transport(&v, false).unwrap();
        let kernel = GaussianKernel::new(1.0).unwrap();
        let control_points_t = exponential.control_points_trajectory().unwrap();

        let target = rkhs_norm_squared(&kernel, &control_points_t[0], &transported[0]);
        for (x, m) in control_points_t.iter().zip(&transported) {
            let ratio = rkhs_norm_squared(&kernel, x, m) / target;
            assert!((ratio - 1.0).abs() < 0.02, "ratio {}", ratio);
        }
    }

    #[test]
    fn test_coarse_transport_rescales_by_norm_ratio() {
        let mut exponential = planar(2, Integrator::Rk2);
        let (cp, mom) = two_points();
        exponential.set_initial_control_points(cp).unwrap();
        exponential.set_initial_momenta(mom).unwrap();
        exponential.update().unwrap();

        let v = arr2(&[[0.3, -0.4], [0.1, 0.2]]);
        let transported = exponential.parallel_transport(&v, false).unwrap();
        assert_eq!(transported.len(), 2);

        // a single step drifts by about 4%, so the rescaled norm is target² / actual
        let kernel = GaussianKernel::new(1.0).unwrap();
        let control_points_t = exponential.control_points_trajectory().unwrap();
        let target = rkhs_norm_squared(&kernel, &control_points_t[0], &transported[0]);
        let ratio = rkhs_norm_squared(&kernel, &control_points_t[1], &transported[1]) / target;
        assert!(ratio > 0.9 && ratio < 0.98, "ratio {}", ratio);
    }
}
