pub mod config;
pub mod error;
pub mod linalg;
pub mod state;
pub mod traits;

pub use config::{DeformationConfig, TransportConfig};
pub use error::{Error, Quantity, Result};
pub use state::Cached;
pub use traits::Kernel;
