//! SSH connection configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use secrecy::SecretString;

use crate::config::Device;

/// Default PTY width in columns.
pub const DEFAULT_TERMINAL_WIDTH: u32 = 200;

/// Default PTY height in rows.
pub const DEFAULT_TERMINAL_HEIGHT: u32 = 24;

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum HostKeyVerification {
    /// Accept all keys without checking.
    #[default]
    Disabled,

    /// Accept and learn unknown keys, but reject changed keys.
    AcceptNew,

    /// Reject unknown and changed keys.
    Strict,
}

/// Settings shared by every connection of a run.
#[derive(Debug, Clone)]
pub struct SshOptions {
    pub host_key_verification: HostKeyVerification,

    /// known_hosts file; the user's default file when unset.
    pub known_hosts_path: Option<PathBuf>,

    pub terminal_width: u32,
    pub terminal_height: u32,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            terminal_width: DEFAULT_TERMINAL_WIDTH,
            terminal_height: DEFAULT_TERMINAL_HEIGHT,
        }
    }
}

/// Everything needed to open one connection.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    pub port: u16,

    pub username: String,

    pub password: SecretString,

    /// Bounds connection setup.
    pub timeout: Duration,

    pub options: SshOptions,
}

impl SshConfig {
    /// Build the connection settings for `device`.
    pub fn for_device(device: &Device, timeout: Duration, options: SshOptions) -> Self {
        Self {
            host: device.ip.clone(),
            port: device.effective_port(),
            username: device.username.clone(),
            password: device.password.clone(),
            timeout,
            options,
        }
    }

    /// `host:port` for log lines.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
