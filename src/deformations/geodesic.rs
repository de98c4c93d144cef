use ndarray::{Array1, Array2};
use std::sync::Arc;
use tracing::debug;

use crate::core::{Cached, DeformationConfig, Error, Kernel, Quantity, Result};
use crate::deformations::exponential::{required_kernel, validate_points, Exponential};
use crate::deformations::integrator::Integrator;
use crate::deformations::transport::{rkhs_norm_squared, split_tangential};
use crate::kernels::GaussianKernel;

/// Spliced time axis and shoot trajectories over [tmin, tmax]
#[derive(Debug, Clone)]
struct GeodesicState {
    times: Vec<f64>,
    control_points_t: Vec<Array2<f64>>,
    momenta_t: Vec<Array2<f64>>,
}

/// Two-sided geodesic anchored at `t0`
///
/// A backward exponential covers [tmin, t0] and a forward one [t0, tmax]; both
/// start from the control points at `t0` with momenta scaled by the length of
/// their side, so that together they trace one geodesic parameterized by
/// physical time. A side whose discretization collapses to a single time
/// point is skipped.
#[derive(Debug)]
pub struct Geodesic {
    dimension: usize,
    concentration_of_time_points: f64,
    t0: f64,
    tmin: f64,
    tmax: f64,
    control_points_t0: Option<Array2<f64>>,
    momenta_t0: Option<Array2<f64>>,
    template_data_t0: Option<Array2<f64>>,
    backward: Exponential,
    forward: Exponential,
    shoot: Cached<GeodesicState>,
    flow: Cached<Vec<Array2<f64>>>,
}

impl Geodesic {
    /// Geodesic driven by `kernel`, with all three times at 0
    pub fn new(kernel: Arc<dyn Kernel>, config: &DeformationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Geodesic {
            dimension: config.dimension,
            concentration_of_time_points: config.concentration_of_time_points,
            t0: 0.0,
            tmin: 0.0,
            tmax: 0.0,
            control_points_t0: None,
            momenta_t0: None,
            template_data_t0: None,
            backward: Exponential::new(Arc::clone(&kernel), config)?,
            forward: Exponential::new(kernel, config)?,
            shoot: Cached::Stale,
            flow: Cached::Stale,
        })
    }

    pub fn from_config(config: &DeformationConfig) -> Result<Self> {
        let kernel = required_kernel(config)?;
        Self::new(kernel, config)
    }

    pub fn t0(&self) -> f64 {
        self.t0
    }

    pub fn tmin(&self) -> f64 {
        self.tmin
    }

    pub fn tmax(&self) -> f64 {
        self.tmax
    }

    pub fn concentration_of_time_points(&self) -> f64 {
        self.concentration_of_time_points
    }

    /// Exponential covering [tmin, t0], running from t0 towards tmin
    pub fn backward(&self) -> &Exponential {
        &self.backward
    }

    /// Exponential covering [t0, tmax]
    pub fn forward(&self) -> &Exponential {
        &self.forward
    }

    pub fn control_points_t0(&self) -> Option<&Array2<f64>> {
        self.control_points_t0.as_ref()
    }

    pub fn momenta_t0(&self) -> Option<&Array2<f64>> {
        self.momenta_t0.as_ref()
    }

    pub fn template_data_t0(&self) -> Option<&Array2<f64>> {
        self.template_data_t0.as_ref()
    }

    pub fn set_kernel(&mut self, kernel: Arc<dyn Kernel>) {
        self.backward.set_kernel(Arc::clone(&kernel));
        self.forward.set_kernel(kernel);
        self.invalidate_shoot();
    }

    pub fn set_integrator(&mut self, integrator: Integrator) {
        self.backward.set_integrator(integrator);
        self.forward.set_integrator(integrator);
        self.invalidate_shoot();
    }

    pub fn set_concentration_of_time_points(&mut self, concentration: f64) -> Result<()> {
        if !(concentration.is_finite() && concentration > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "concentration of time points must be strictly positive, got {}",
                concentration
            )));
        }
        self.concentration_of_time_points = concentration;
        self.invalidate_shoot();
        Ok(())
    }

    pub fn set_t0(&mut self, t0: f64) {
        self.t0 = t0;
        self.invalidate_shoot();
    }

    pub fn set_tmin(&mut self, tmin: f64) {
        self.tmin = tmin;
        self.invalidate_shoot();
    }

    pub fn set_tmax(&mut self, tmax: f64) {
        self.tmax = tmax;
        self.invalidate_shoot();
    }

    pub fn set_control_points_t0(&mut self, control_points: Array2<f64>) -> Result<()> {
        validate_points(&control_points, self.dimension, "control points")?;
        self.control_points_t0 = Some(control_points);
        self.invalidate_shoot();
        Ok(())
    }

    pub fn set_momenta_t0(&mut self, momenta: Array2<f64>) -> Result<()> {
        validate_points(&momenta, self.dimension, "momenta")?;
        self.momenta_t0 = Some(momenta);
        self.invalidate_shoot();
        Ok(())
    }

    pub fn set_template_data_t0(&mut self, template_data: Array2<f64>) -> Result<()> {
        validate_points(&template_data, self.dimension, "template data")?;
        self.template_data_t0 = Some(template_data);
        self.flow.invalidate();
        Ok(())
    }

    fn invalidate_shoot(&mut self) {
        self.shoot.invalidate();
        self.flow.invalidate();
    }

    /// Discretize both sides, shoot and flow them, and splice the results
    ///
    /// Fails with `InvalidTimeBounds` unless tmin ≤ t0 ≤ tmax.
    pub fn update(&mut self) -> Result<()> {
        if !(self.tmin <= self.t0 && self.t0 <= self.tmax) {
            return Err(Error::InvalidTimeBounds {
                tmin: self.tmin,
                t0: self.t0,
                tmax: self.tmax,
            });
        }

        let reshoot = self.shoot.is_stale();
        if reshoot {
            self.prepare_sides()?;
        }
        let reflow = self.flow.is_stale();
        if reflow {
            if let Some(template_data) = &self.template_data_t0 {
                self.backward.set_initial_template_data(template_data.clone())?;
                self.forward.set_initial_template_data(template_data.clone())?;
            }
        }

        for side in [&mut self.backward, &mut self.forward] {
            if side.number_of_time_points() > 1 {
                side.update()?;
            }
        }

        if reshoot {
            self.shoot = Cached::Fresh(self.splice_shoot()?);
        }
        if reflow && self.template_data_t0.is_some() {
            self.flow = Cached::Fresh(self.splice_template()?);
        }

        debug!(
            tmin = self.tmin,
            t0 = self.t0,
            tmax = self.tmax,
            backward_time_points = self.backward.number_of_time_points(),
            forward_time_points = self.forward.number_of_time_points(),
            "geodesic update"
        );
        Ok(())
    }

    fn prepare_sides(&mut self) -> Result<()> {
        let control_points = self
            .control_points_t0
            .as_ref()
            .ok_or(Error::EmptyInput("control points at t0"))?;
        let momenta = self
            .momenta_t0
            .as_ref()
            .ok_or(Error::EmptyInput("momenta at t0"))?;
        if momenta.dim() != control_points.dim() {
            return Err(Error::ShapeMismatch {
                what: "momenta at t0",
                expected: control_points.dim(),
                got: momenta.dim(),
            });
        }

        let backward_length = self.t0 - self.tmin;
        self.backward.set_number_of_time_points(time_points_for(
            backward_length,
            self.concentration_of_time_points,
        ))?;
        self.backward.set_initial_control_points(control_points.clone())?;
        self.backward.set_initial_momenta(momenta * -backward_length)?;

        let forward_length = self.tmax - self.t0;
        self.forward.set_number_of_time_points(time_points_for(
            forward_length,
            self.concentration_of_time_points,
        ))?;
        self.forward.set_initial_control_points(control_points.clone())?;
        self.forward.set_initial_momenta(momenta * forward_length)?;
        Ok(())
    }

    fn splice_shoot(&self) -> Result<GeodesicState> {
        let control_points = self
            .control_points_t0
            .as_ref()
            .ok_or(Error::EmptyInput("control points at t0"))?;
        let momenta = self
            .momenta_t0
            .as_ref()
            .ok_or(Error::EmptyInput("momenta at t0"))?;
        let backward = active(&self.backward);
        let forward = active(&self.forward);

        let backward_times = backward
            .map(|side| Array1::linspace(self.t0, self.tmin, side.number_of_time_points()).to_vec());
        let forward_times = forward
            .map(|side| Array1::linspace(self.t0, self.tmax, side.number_of_time_points()).to_vec());
        let times = splice(backward_times.as_deref(), forward_times.as_deref(), &self.t0);

        let control_points_t = splice(
            backward.map(Exponential::control_points_trajectory).transpose()?,
            forward.map(Exponential::control_points_trajectory).transpose()?,
            control_points,
        );

        // momenta per unit of physical time, oriented from tmin to tmax
        let backward_momenta = backward
            .map(|side| per_unit_time(side, -(self.t0 - self.tmin)))
            .transpose()?;
        let forward_momenta = forward
            .map(|side| per_unit_time(side, self.tmax - self.t0))
            .transpose()?;
        let momenta_t = splice(
            backward_momenta.as_deref(),
            forward_momenta.as_deref(),
            momenta,
        );

        Ok(GeodesicState {
            times,
            control_points_t,
            momenta_t,
        })
    }

    fn splice_template(&self) -> Result<Vec<Array2<f64>>> {
        let template_data = self
            .template_data_t0
            .as_ref()
            .ok_or(Error::EmptyInput("template data at t0"))?;
        Ok(splice(
            active(&self.backward)
                .map(Exponential::template_trajectory)
                .transpose()?,
            active(&self.forward)
                .map(Exponential::template_trajectory)
                .transpose()?,
            template_data,
        ))
    }

    /// Squared norm of the geodesic: the forward side's, or 0 when it is skipped
    pub fn get_norm_squared(&self) -> Result<f64> {
        self.shoot.get(Quantity::Shoot)?;
        match active(&self.forward) {
            Some(forward) => forward.get_norm_squared(),
            None => Ok(0.0),
        }
    }

    /// Time of every snapshot, increasing from tmin to tmax
    pub fn times(&self) -> Result<&[f64]> {
        Ok(self.shoot.get(Quantity::Shoot)?.times.as_slice())
    }

    pub fn control_points_trajectory(&self) -> Result<&[Array2<f64>]> {
        Ok(self.shoot.get(Quantity::Shoot)?.control_points_t.as_slice())
    }

    pub fn momenta_trajectory(&self) -> Result<&[Array2<f64>]> {
        Ok(self.shoot.get(Quantity::Shoot)?.momenta_t.as_slice())
    }

    pub fn template_trajectory(&self) -> Result<&[Array2<f64>]> {
        self.shoot.get(Quantity::Shoot)?;
        Ok(self.flow.get(Quantity::Flow)?.as_slice())
    }

    /// Index of the snapshot closest to `time` (first one on ties)
    pub fn template_index(&self, time: f64) -> Result<usize> {
        if !(self.tmin <= time && time <= self.tmax) {
            return Err(Error::TimeOutOfRange {
                time,
                tmin: self.tmin,
                tmax: self.tmax,
            });
        }
        let times = self.times()?;
        let mut best = 0;
        for (index, t) in times.iter().enumerate() {
            if (t - time).powi(2) < (times[best] - time).powi(2) {
                best = index;
            }
        }
        Ok(best)
    }

    /// Template points at the snapshot nearest to `time`
    ///
    /// Nearest-neighbour lookup, no interpolation between snapshots.
    pub fn get_template_data(&self, time: f64) -> Result<&Array2<f64>> {
        let index = self.template_index(time)?;
        let trajectory = self.template_trajectory()?;
        trajectory.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: trajectory.len(),
        })
    }

    /// Parallel transport of `momenta`, given at t0, over the whole of [tmin, tmax]
    ///
    /// Returns one covector per snapshot of `times()`.
    pub fn parallel_transport(
        &mut self,
        momenta: &Array2<f64>,
        keep_tangential: bool,
    ) -> Result<Vec<Array2<f64>>> {
        let state = self.shoot.get(Quantity::Shoot)?;
        let expected = state.momenta_t[0].dim();
        if momenta.dim() != expected {
            return Err(Error::ShapeMismatch {
                what: "transported momenta",
                expected,
                got: momenta.dim(),
            });
        }

        let backward = if self.backward.number_of_time_points() > 1 {
            Some(self.backward.parallel_transport(momenta, keep_tangential)?)
        } else {
            None
        };
        let forward = if self.forward.number_of_time_points() > 1 {
            Some(self.forward.parallel_transport(momenta, keep_tangential)?)
        } else {
            None
        };

        let anchor = match (&backward, &forward) {
            (_, Some(forward)) => forward[0].clone(),
            (Some(backward), None) => backward[0].clone(),
            (None, None) => self.transport_anchor(momenta, keep_tangential)?,
        };
        Ok(splice(backward.as_deref(), forward.as_deref(), &anchor))
    }

    /// Transported value at t0 when neither side moves
    fn transport_anchor(&self, momenta: &Array2<f64>, keep_tangential: bool) -> Result<Array2<f64>> {
        if keep_tangential {
            return Ok(momenta.clone());
        }
        let control_points = self
            .control_points_t0
            .as_ref()
            .ok_or(Error::EmptyInput("control points at t0"))?;
        let initial_momenta = self
            .momenta_t0
            .as_ref()
            .ok_or(Error::EmptyInput("momenta at t0"))?;
        let kernel = GaussianKernel::new(self.forward.kernel().kernel_width())?;
        let norm_squared = rkhs_norm_squared(&kernel, control_points, initial_momenta);
        let split = split_tangential(
            &kernel,
            control_points,
            initial_momenta,
            momenta,
            norm_squared,
            self.forward.transport_config().orthogonality_tolerance,
        )?;
        Ok(split.orthogonal)
    }
}

/// Number of time points of a side of length `length`, at least 1
///
/// `round(c·length + 0.5)`, i.e. `floor(c·length) + 1`: the fractional part of
/// `c·length` never adds a point.
pub fn time_points_for(length: f64, concentration_of_time_points: f64) -> usize {
    let count = (concentration_of_time_points * length + 0.5).round();
    if count >= 1.0 {
        count as usize
    } else {
        1
    }
}

fn active(side: &Exponential) -> Option<&Exponential> {
    (side.number_of_time_points() > 1).then_some(side)
}

fn per_unit_time(side: &Exponential, length: f64) -> Result<Vec<Array2<f64>>> {
    Ok(side
        .momenta_trajectory()?
        .iter()
        .map(|momenta| momenta / length)
        .collect())
}

/// Reversed backward trajectory followed by the forward one without its first
/// sample; a missing side contributes only the shared `anchor`
fn splice<T: Clone>(backward: Option<&[T]>, forward: Option<&[T]>, anchor: &T) -> Vec<T> {
    let mut out: Vec<T> = match backward {
        Some(backward) => backward.iter().rev().cloned().collect(),
        None => vec![anchor.clone()],
    };
    if let Some(forward) = forward {
        out.extend(forward.iter().skip(1).cloned());
    }
    out
}
