use lddmm::deformations::rkhs_norm_squared;
use lddmm::prelude::*;
use ndarray::arr2;

fn main() -> Result<()> {
    println!("=== Geodesic Shooting Example ===\n");

    let config = DeformationConfig::new()
        .with_dimension(2)
        .with_kernel(KernelType::Exact, 1.0)
        .with_concentration_of_time_points(10.0);

    // Three control points pushed apart by their momenta
    let control_points = arr2(&[[0.0, 0.0], [0.6, 0.2], [-0.3, 0.5]]);
    let momenta = arr2(&[[0.3, 0.1], [-0.2, 0.25], [0.1, -0.3]]);
    let template = arr2(&[[0.1, 0.1], [0.4, 0.3], [-0.2, 0.2], [0.0, 0.6]]);

    let mut geodesic = Geodesic::from_config(&config)?;
    geodesic.set_tmin(-1.0);
    geodesic.set_t0(0.0);
    geodesic.set_tmax(1.0);
    geodesic.set_control_points_t0(control_points)?;
    geodesic.set_momenta_t0(momenta)?;
    geodesic.set_template_data_t0(template.clone())?;
    geodesic.update()?;

    let times = geodesic.times()?;
    println!("Time points: {} over [{}, {}]", times.len(), geodesic.tmin(), geodesic.tmax());
    println!("Squared norm of the geodesic: {:.6}\n", geodesic.get_norm_squared()?);

    println!("Template at t0:");
    println!("{:?}\n", template);
    for time in [-1.0, 1.0] {
        println!("Template at t = {}:", time);
        println!("{:?}\n", geodesic.get_template_data(time)?);
    }

    // Transport a covector along the whole geodesic
    let covector = arr2(&[[0.1, 0.4], [0.2, -0.1], [-0.3, 0.2]]);
    let transported = geodesic.parallel_transport(&covector, false)?;
    let control_points_t = geodesic.control_points_trajectory()?;

    let kernel = GaussianKernel::new(1.0)?;
    let norms: Vec<f64> = control_points_t
        .iter()
        .zip(&transported)
        .map(|(x, m)| rkhs_norm_squared(&kernel, x, m))
        .collect();
    let first = norms[0];
    let drift = norms
        .iter()
        .map(|n| (n / first - 1.0).abs())
        .fold(0.0, f64::max);

    println!("Transported covector at tmax:");
    println!("{:?}\n", transported[transported.len() - 1]);
    println!("Largest relative drift of its RKHS norm: {:.2e}", drift);

    if drift < 0.02 {
        println!("✓ Parallel transport preserves the RKHS norm");
    }
    Ok(())
}
