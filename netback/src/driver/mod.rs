//! Per-device backup dialogue.
//!
//! A [`DeviceTask`] takes one device from connect to filtered text; a
//! [`BackupResult`] records how that went.

mod result;
mod task;

pub use result::{Artifact, BackupResult, Summary};
pub use task::{DeviceTask, LOGOUT_GRACE};
