//! Placement of the initial control points over a template.

use ndarray::Array2;
use tracing::debug;

use crate::core::{DeformationConfig, Error, Result};

/// Axis-aligned bounding box of `points`, one `[min, max]` row per dimension
pub fn bounding_box(points: &Array2<f64>) -> Result<Array2<f64>> {
    if points.nrows() == 0 {
        return Err(Error::EmptyInput("points"));
    }
    let mut bbox = Array2::zeros((points.ncols(), 2));
    for (d, column) in points.columns().into_iter().enumerate() {
        bbox[[d, 0]] = column.iter().copied().fold(f64::INFINITY, f64::min);
        bbox[[d, 1]] = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    }
    Ok(bbox)
}

/// Grow `bbox` so that it also encloses `points`
pub fn extend_bounding_box(bbox: &mut Array2<f64>, points: &Array2<f64>) -> Result<()> {
    if bbox.ncols() != 2 {
        return Err(Error::ShapeMismatch {
            what: "bounding box",
            expected: (points.ncols(), 2),
            got: bbox.dim(),
        });
    }
    if bbox.nrows() != points.ncols() {
        return Err(Error::DimensionMismatch {
            expected: bbox.nrows(),
            got: points.ncols(),
        });
    }
    for point in points.rows() {
        for (d, &x) in point.iter().enumerate() {
            if x < bbox[[d, 0]] {
                bbox[[d, 0]] = x;
            } else if x > bbox[[d, 1]] {
                bbox[[d, 1]] = x;
            }
        }
    }
    Ok(())
}

/// Regular grid with step `spacing` covering `bbox`
///
/// Along each axis the grid is centred in the box: the remainder of the box
/// length modulo `spacing` is split evenly on both ends. A flat axis yields a
/// single coordinate. Points are ordered with the last axis varying fastest.
pub fn regular_grid(bbox: &Array2<f64>, spacing: f64) -> Result<Array2<f64>> {
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(Error::InvalidParameter(format!(
            "grid spacing must be strictly positive, got {}",
            spacing
        )));
    }
    if bbox.ncols() != 2 || bbox.nrows() == 0 {
        return Err(Error::ShapeMismatch {
            what: "bounding box",
            expected: (bbox.nrows().max(1), 2),
            got: bbox.dim(),
        });
    }

    let mut axes = Vec::with_capacity(bbox.nrows());
    for row in bbox.rows() {
        let (min, max) = (row[0], row[1]);
        let length = max - min;
        if !(length >= 0.0 && length.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "invalid bounding box axis [{}, {}]",
                min, max
            )));
        }
        let steps = (length / spacing).floor();
        let offset = 0.5 * (length - spacing * steps);
        let axis: Vec<f64> = (0..=steps as usize)
            .map(|k| min + offset + k as f64 * spacing)
            .collect();
        axes.push(axis);
    }

    let dimension = axes.len();
    let count: usize = axes.iter().map(Vec::len).product();
    let mut grid = Array2::zeros((count, dimension));
    for (index, mut point) in grid.rows_mut().into_iter().enumerate() {
        let mut rest = index;
        for d in (0..dimension).rev() {
            let len = axes[d].len();
            point[d] = axes[d][rest % len];
            rest /= len;
        }
    }
    Ok(grid)
}

/// Initial control points for `template_points`
///
/// In dense mode these are the template points themselves, otherwise a
/// regular grid with step `spacing` over the template bounding box.
pub fn initial_control_points(
    config: &DeformationConfig,
    template_points: &Array2<f64>,
    spacing: f64,
) -> Result<Array2<f64>> {
    if template_points.ncols() != config.dimension {
        return Err(Error::DimensionMismatch {
            expected: config.dimension,
            got: template_points.ncols(),
        });
    }
    let control_points = if config.dense_mode {
        if template_points.nrows() == 0 {
            return Err(Error::EmptyInput("template points"));
        }
        template_points.clone()
    } else {
        regular_grid(&bounding_box(template_points)?, spacing)?
    };
    debug!(
        control_points = control_points.nrows(),
        dense_mode = config.dense_mode,
        "initial control points"
    );
    Ok(control_points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn test_bounding_box() {
        let points = arr2(&[[0.0, 2.0], [1.0, -1.0], [0.5, 0.5]]);
        let bbox = bounding_box(&points).unwrap();
        assert_eq!(bbox, arr2(&[[0.0, 1.0], [-1.0, 2.0]]));

        assert!(matches!(
            bounding_box(&Array2::zeros((0, 2))),
            Err(Error::EmptyInput(_))
        ));
    }

    #[test]
    fn test_extend_bounding_box() {
        let mut bbox = arr2(&[[0.0, 1.0], [0.0, 1.0]]);
        extend_bounding_box(&mut bbox, &arr2(&[[2.0, 0.5], [0.5, -3.0]])).unwrap();
        assert_eq!(bbox, arr2(&[[0.0, 2.0], [-3.0, 1.0]]));

        assert!(extend_bounding_box(&mut bbox, &arr2(&[[0.0, 0.0, 0.0]])).is_err());
    }

    #[test]
    fn test_regular_grid_is_centred() {
        let bbox = arr2(&[[0.0, 1.0], [0.0, 0.5]]);
        let grid = regular_grid(&bbox, 0.4).unwrap();

        let expected = [
            [0.1, 0.05],
            [0.1, 0.45],
            [0.5, 0.05],
            [0.5, 0.45],
            [0.9, 0.05],
            [0.9, 0.45],
        ];
        assert_eq!(grid.dim(), (6, 2));
        for (row, point) in grid.rows().into_iter().zip(expected.iter()) {
            assert_relative_eq!(row[0], point[0], epsilon = 1e-12);
            assert_relative_eq!(row[1], point[1], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_regular_grid_flat_axis() {
        let bbox = arr2(&[[2.0, 2.0], [0.0, 2.0], [-1.0, -1.0]]);
        let grid = regular_grid(&bbox, 1.0).unwrap();

        assert_eq!(grid.dim(), (3, 3));
        for (k, row) in grid.rows().into_iter().enumerate() {
            assert_eq!(row[0], 2.0);
            assert_relative_eq!(row[1], k as f64, epsilon = 1e-12);
            assert_eq!(row[2], -1.0);
        }
    }

    #[test]
    fn test_regular_grid_rejects_bad_spacing() {
        let bbox = arr2(&[[0.0, 1.0]]);
        assert!(regular_grid(&bbox, 0.0).is_err());
        assert!(regular_grid(&bbox, -0.5).is_err());
        assert!(regular_grid(&arr2(&[[1.0, 0.0]]), 0.5).is_err());
    }

    #[test]
    fn test_initial_control_points() {
        let template = arr2(&[[0.0, 0.0], [1.0, 1.0], [0.2, 0.8]]);

        let dense = DeformationConfig::new().with_dimension(2).with_dense_mode(true);
        assert_eq!(initial_control_points(&dense, &template, 0.5).unwrap(), template);

        let sparse = DeformationConfig::new().with_dimension(2);
        let grid = initial_control_points(&sparse, &template, 0.5).unwrap();
        assert_eq!(grid.dim(), (9, 2));

        let wrong = DeformationConfig::new().with_dimension(3);
        assert!(matches!(
            initial_control_points(&wrong, &template, 0.5),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
