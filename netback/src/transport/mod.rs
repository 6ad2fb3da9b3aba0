//! SSH transport layer wrapping russh.
//!
//! The orchestrator only sees the [`Connector`] trait, so tests can hand it
//! simulated devices instead of real SSH servers.

pub mod config;
mod ssh;

use std::future::Future;
use std::time::Duration;

pub use config::{HostKeyVerification, SshConfig, SshOptions};
pub use ssh::{SshConnector, SshStream, SshTransport};

use crate::channel::Stream;
use crate::config::Device;
use crate::error::Result;

/// Opens an interactive shell stream to a device.
pub trait Connector: Send + Sync + 'static {
    type Stream: Stream + 'static;

    /// Dial, authenticate and start a shell, bounded by `timeout`.
    fn connect(
        &self,
        device: &Device,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}
