//! Error types for netback.
//!
//! Every error maps onto one [`ErrorKind`], which is what the per-device
//! report and the exit status care about.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netback operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Descriptor loading and validation errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session stream errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A command's dialogue failed
    #[error("Command {command:?} failed: {source}")]
    Command {
        command: String,
        #[source]
        source: ChannelError,
    },

    /// Persistence errors
    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

impl Error {
    /// Attach the command whose dialogue failed.
    pub(crate) fn command(command: &str, err: Error) -> Self {
        match err {
            Error::Channel(source) => Error::Command {
                command: command.to_string(),
                source,
            },
            other => other,
        }
    }

    /// The failure class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Transport(_) => ErrorKind::Connect,
            Error::Channel(e) | Error::Command { source: e, .. } => e.kind(),
            Error::Output(_) => ErrorKind::Write,
        }
    }
}

/// Failure classes reported per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid descriptor field, unknown model, bad pattern.
    Config,
    /// Dial, handshake or authentication failure.
    Connect,
    /// No prompt match within the deadline.
    Timeout,
    /// Stream fault or unexpected termination.
    Stream,
    /// Persisting the artifact failed.
    Write,
}

/// Descriptor loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Descriptor file could not be read
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Descriptor file is not valid YAML for its schema
    #[error("parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Required device field missing or empty
    #[error("device[{index}] ({name}): {field} is required")]
    MissingField {
        index: usize,
        name: String,
        field: &'static str,
    },

    /// Model file defines nothing
    #[error("no models defined")]
    NoModels,

    /// Model has no prompt
    #[error("model {model:?}: prompt is required")]
    MissingPrompt { model: String },

    /// Model has no capture commands
    #[error("model {model:?}: at least one command is required")]
    NoCommands { model: String },

    /// Pattern failed to compile
    #[error("model {model:?} {field}: invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        model: String,
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Device references a model that was not loaded
    #[error("model {model:?} not found")]
    UnknownModel { model: String },

    /// Duration string could not be parsed
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host is not in known_hosts (strict checking)
    #[error("Host key for {host}:{port} is not known")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection setup timed out
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),
}

/// Session stream errors.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Prompt not matched within the deadline
    #[error("timeout waiting for prompt after {0:?}")]
    Timeout(Duration),

    /// Session was already closed
    #[error("session closed")]
    Closed,

    /// Read or write fault on the stream
    #[error("stream I/O error: {0}")]
    Io(#[from] io::Error),

    /// SSH protocol error on the channel
    #[error("channel SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// One or more close steps failed
    #[error("close errors: {}", .0.join("; "))]
    CloseFailed(Vec<String>),
}

impl ChannelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChannelError::Timeout(_) => ErrorKind::Timeout,
            _ => ErrorKind::Stream,
        }
    }
}

/// Persistence errors.
#[derive(Error, Debug)]
pub enum OutputError {
    /// Directory could not be created
    #[error("create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File could not be written
    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Name or group would escape the output root
    #[error("invalid output path component {0:?}")]
    InvalidComponent(String),
}

/// Result type alias using netback's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err: Error = ChannelError::Timeout(Duration::from_secs(1)).into();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let err: Error = ConfigError::NoModels.into();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err: Error = TransportError::AuthenticationFailed {
            user: "admin".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Connect);

        let err: Error = OutputError::InvalidComponent("..".into()).into();
        assert_eq!(err.kind(), ErrorKind::Write);
    }

    #[test]
    fn test_command_context_keeps_kind() {
        let err = Error::command(
            "show run",
            ChannelError::Timeout(Duration::from_millis(5)).into(),
        );
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("\"show run\""));

        let err = Error::command("show run", ChannelError::Closed.into());
        assert_eq!(err.kind(), ErrorKind::Stream);
    }
}
