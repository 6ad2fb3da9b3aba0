//! SSH transport implementation using russh.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, trace, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg, Disconnect, Pty};
use secrecy::ExposeSecret;

use super::Connector;
use super::config::{HostKeyVerification, SshConfig, SshOptions};
use crate::channel::Stream;
use crate::config::Device;
use crate::error::{ChannelError, Result, TransportError};

/// Terminal modes requested with the PTY: no echo, nominal line speed.
const PTY_MODES: &[(Pty, u32)] = &[
    (Pty::ECHO, 0),
    (Pty::TTY_OP_ISPEED, 14400),
    (Pty::TTY_OP_OSPEED, 14400),
];

/// An authenticated SSH connection.
pub struct SshTransport {
    session: Handle<SshHandler>,
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate, bounded by the
    /// configured timeout.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.timeout),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            options: config.options.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("connecting to {}", config.socket_addr());
        let connect = async {
            let mut session =
                client::connect(ssh_config, (config.host.as_str(), config.port), handler)
                    .await
                    .map_err(|e| Self::connect_error(&config, &host_key_error, e))?;
            Self::authenticate(&mut session, &config).await?;
            Ok::<_, crate::error::Error>(session)
        };

        let session = tokio::time::timeout(config.timeout, connect)
            .await
            .map_err(|_| TransportError::Timeout(config.timeout))??;

        Ok(Self { session, config })
    }

    /// Prefer the detailed host-key error recorded by the handler over the
    /// generic one russh reports.
    fn connect_error(
        config: &SshConfig,
        host_key_error: &Mutex<Option<TransportError>>,
        err: russh::Error,
    ) -> TransportError {
        if let Some(hk_err) = host_key_error.lock().ok().and_then(|mut slot| slot.take()) {
            return hk_err;
        }
        match err {
            russh::Error::IO(source) => TransportError::ConnectionFailed {
                host: config.host.clone(),
                port: config.port,
                source,
            },
            other => TransportError::Ssh(other),
        }
    }

    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = session
            .authenticate_password(&config.username, config.password.expose_secret())
            .await
            .map_err(TransportError::Ssh)?
            .success();

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Open a PTY session channel running an interactive shell.
    pub async fn open_shell(self) -> Result<SshStream> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "xterm",
                self.config.options.terminal_width,
                self.config.options.terminal_height,
                0,
                0,
                PTY_MODES,
            )
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(SshStream {
            session: self.session,
            channel,
            closed: false,
        })
    }
}

/// An interactive shell channel plus the connection that owns it.
pub struct SshStream {
    session: Handle<SshHandler>,
    channel: Channel<Msg>,
    closed: bool,
}

impl Stream for SshStream {
    async fn read_chunk(&mut self) -> std::result::Result<Option<Vec<u8>>, ChannelError> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { ref data }) => return Ok(Some(data.to_vec())),
                Some(ChannelMsg::ExtendedData { ref data, .. }) => return Ok(Some(data.to_vec())),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => return Ok(None),
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    trace!("shell exited with status {}", exit_status);
                }
                Some(_) => {}
            }
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> std::result::Result<(), ChannelError> {
        self.channel.data(data).await?;
        Ok(())
    }

    async fn close(&mut self) -> std::result::Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut errors = Vec::new();
        if let Err(e) = self.channel.eof().await {
            errors.push(format!("eof: {e}"));
        }
        if let Err(e) = self.channel.close().await {
            errors.push(format!("channel close: {e}"));
        }
        if let Err(e) = self
            .session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            errors.push(format!("disconnect: {e}"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ChannelError::CloseFailed(errors))
        }
    }
}

/// Opens real SSH shells.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    options: SshOptions,
}

impl SshConnector {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }
}

impl Connector for SshConnector {
    type Stream = SshStream;

    async fn connect(&self, device: &Device, timeout: Duration) -> Result<SshStream> {
        let config = SshConfig::for_device(device, timeout, self.options.clone());
        let transport = SshTransport::connect(config).await?;
        transport.open_shell().await
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    options: SshOptions,
    /// Detailed host-key error for `connect` to surface.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// `Ok(true)` if the key matches, `Ok(false)` if the host is unknown.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> std::result::Result<bool, TransportError> {
        let result = match self.options.known_hosts_path {
            Some(ref path) => russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, pubkey),
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = match self.options.known_hosts_path {
            Some(ref path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey),
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, err: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(err);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let mode = self.options.host_key_verification;
        if mode == HostKeyVerification::Disabled {
            return Ok(true);
        }

        Ok(match (mode, self.check_known_hosts(server_public_key)) {
            (_, Ok(true)) => true,
            (HostKeyVerification::Strict, Ok(false)) => self.reject(TransportError::HostKeyUnknown {
                host: self.host.clone(),
                port: self.port,
            }),
            (_, Ok(false)) => {
                if let Err(e) = self.learn_host_key(server_public_key) {
                    warn!("failed to save host key for {}: {}", self.host, e);
                }
                true
            }
            (_, Err(e)) => self.reject(e),
        })
    }
}
