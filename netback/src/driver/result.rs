//! Per-device outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Device;
use crate::error::{Error, ErrorKind};

/// A persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Filtered text that was written.
    pub text: String,

    /// Where it was written.
    pub path: PathBuf,
}

/// Outcome of one device's backup. Exactly one is produced per device.
#[derive(Debug)]
pub struct BackupResult {
    pub device: Arc<Device>,

    pub outcome: Result<Artifact, Error>,

    /// Wall time from admission to completion.
    pub elapsed: Duration,
}

impl BackupResult {
    pub fn success(device: Arc<Device>, artifact: Artifact, elapsed: Duration) -> Self {
        Self {
            device,
            outcome: Ok(artifact),
            elapsed,
        }
    }

    pub fn failed(device: Arc<Device>, error: impl Into<Error>, elapsed: Duration) -> Self {
        Self {
            device,
            outcome: Err(error.into()),
            elapsed,
        }
    }

    pub fn name(&self) -> &str {
        &self.device.name
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn path(&self) -> Option<&Path> {
        self.outcome.as_ref().ok().map(|a| a.path.as_path())
    }

    pub fn error(&self) -> Option<&Error> {
        self.outcome.as_ref().err()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error().map(Error::kind)
    }
}

/// Aggregate counts over a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub failed: usize,
}

impl Summary {
    pub fn from_results(results: &[BackupResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
