use crate::core::error::{Error, Quantity, Result};

/// A derived quantity that is either up to date with its inputs or stale
///
/// Reading a stale value is an error instead of silently returning
/// whatever was computed from previous inputs.
#[derive(Debug, Clone, Default)]
pub enum Cached<T> {
    #[default]
    Stale,
    Fresh(T),
}

impl<T> Cached<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Cached::Stale)
    }

    /// Drop the cached value; the next read fails until it is recomputed
    pub fn invalidate(&mut self) {
        *self = Cached::Stale;
    }

    /// Borrow the value, or report which quantity needs an update
    pub fn get(&self, quantity: Quantity) -> Result<&T> {
        match self {
            Cached::Fresh(value) => Ok(value),
            Cached::Stale => Err(Error::Stale(quantity)),
        }
    }
}
