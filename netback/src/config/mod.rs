//! Device and model descriptors.
//!
//! Both files are YAML. Everything is validated, and every pattern
//! compiled, before any device is contacted.

mod device;
mod model;

pub use device::{DEFAULT_PORT, DEFAULT_TIMEOUT, Device, RouterDb, parse_duration};
pub use model::{Model, ModelSet};
