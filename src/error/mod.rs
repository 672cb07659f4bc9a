#[allow(clippy::module_inception)]
mod error;

pub use error::{ApiError, Result};
