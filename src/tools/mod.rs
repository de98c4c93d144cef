pub mod control_points;

pub use control_points::{bounding_box, extend_bounding_box, initial_control_points, regular_grid};
