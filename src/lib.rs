pub mod error;
pub mod math;
pub mod pack;
pub mod params;

pub use error::{PackError, Result};
