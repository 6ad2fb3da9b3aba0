//! The per-device unit of work.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::channel::{Session, Stream};
use crate::config::{Device, Model};
use crate::error::Result;
use crate::filter::{self, Capture};
use crate::transport::Connector;

/// Pause after the pre-disconnect command before the stream is closed.
pub const LOGOUT_GRACE: Duration = Duration::from_millis(100);

/// Connects to one device, runs its model's command lists and filters the
/// captured output.
pub struct DeviceTask<'a, C: Connector> {
    connector: &'a C,
    device: &'a Device,
    model: Arc<Model>,
    timeout: Duration,
}

impl<'a, C: Connector> DeviceTask<'a, C> {
    /// `timeout` bounds connection setup and every prompt wait.
    pub fn new(connector: &'a C, device: &'a Device, model: Arc<Model>, timeout: Duration) -> Self {
        Self {
            connector,
            device,
            model,
            timeout,
        }
    }

    /// Run the full dialogue and return the filtered artifact text.
    ///
    /// The session is closed on every path once connected; close errors
    /// are logged and never change the outcome.
    pub async fn run(self) -> Result<String> {
        let name = &self.device.name;
        info!("{}: connecting to {}:{}", name, self.device.ip, self.device.effective_port());

        let stream = self.connector.connect(self.device, self.timeout).await?;
        let mut session = Session::new(stream, Arc::clone(&self.model), self.timeout);

        let capture = Self::converse(&mut session, &self.model).await;

        if let Err(e) = session.close().await {
            warn!("{}: close failed: {}", name, e);
        }

        let capture = capture?;
        debug!(
            "{}: captured {} annotation and {} command outputs",
            name,
            capture.annotations.len(),
            capture.captures.len()
        );
        Ok(filter::render(&capture, &self.model))
    }

    async fn converse<S: Stream>(session: &mut Session<S>, model: &Model) -> Result<Capture> {
        session.read_until_prompt().await?;
        session.run_post_connect().await?;

        let mut capture = Capture::default();
        for command in &model.comments {
            capture.annotations.push(session.execute(command).await?);
        }
        for command in &model.commands {
            capture.captures.push(session.execute(command).await?);
        }

        session.run_pre_disconnect().await;
        if model.pre_logout.is_some() {
            tokio::time::sleep(LOGOUT_GRACE).await;
        }
        Ok(capture)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::channel::IoStream;
    use crate::error::{ErrorKind, TransportError};

    /// Hands out one pre-scripted mock stream.
    struct MockConnector {
        mock: Mutex<Option<Mock>>,
    }

    impl MockConnector {
        fn new(mock: Mock) -> Self {
            Self {
                mock: Mutex::new(Some(mock)),
            }
        }
    }

    impl Connector for MockConnector {
        type Stream = IoStream<Mock>;

        async fn connect(&self, _device: &Device, _timeout: Duration) -> Result<IoStream<Mock>> {
            let mock = self.mock.lock().unwrap().take();
            let mock = mock.ok_or_else(|| TransportError::Timeout(Duration::ZERO))?;
            Ok(IoStream::new(mock))
        }
    }

    fn device() -> Device {
        Device::new("r1", "10.0.0.1", "ios", "core").with_credentials("backup", "pw")
    }

    fn model() -> Model {
        Model::new("ios", r"^\S+[#>]$")
            .unwrap()
            .with_comment("! ")
            .with_post_login("terminal length 0")
            .with_pre_logout("exit")
            .with_annotation("show version")
            .with_command("show run")
    }

    #[tokio::test]
    async fn test_full_dialogue() {
        let mock = Builder::new()
            .read(b"Welcome\r\nr1#")
            .write(b"terminal length 0\n")
            .read(b"terminal length 0\r\nr1#")
            .write(b"show version\n")
            .read(b"show version\r\nIOS 15.2\r\nr1#")
            .write(b"show run\n")
            .read(b"show run\r\nhostname r1\r\nr1#")
            .write(b"exit\n")
            .build();
        let connector = MockConnector::new(mock);
        let device = device();

        let text = DeviceTask::new(&connector, &device, Arc::new(model()), Duration::from_secs(5))
            .run()
            .await
            .unwrap();

        assert_eq!(
            text,
            "! show version\r\n! IOS 15.2\r\n! r1#\n! show run\r\nhostname r1\r\n! r1#"
        );
    }

    #[tokio::test]
    async fn test_command_failure_skips_remaining_commands() {
        let model = model().with_command("show startup");
        let mock = Builder::new()
            .read(b"r1#")
            .write(b"terminal length 0\n")
            .read(b"r1#")
            .write(b"show version\n")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let connector = MockConnector::new(mock);
        let device = device();

        let err = DeviceTask::new(&connector, &device, Arc::new(model), Duration::from_secs(5))
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Stream);
        assert!(err.to_string().contains("show version"));
    }

    #[tokio::test]
    async fn test_connect_failure_is_connect_error() {
        let connector = MockConnector {
            mock: Mutex::new(None),
        };
        let device = device();

        let err = DeviceTask::new(&connector, &device, Arc::new(model()), Duration::from_secs(5))
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Connect);
    }
}
