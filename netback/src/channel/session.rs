//! Interactive session engine.
//!
//! A [`Session`] drives a request/response dialogue over an unstructured
//! byte stream. The only framing is pattern matching: a read ends when the
//! model's prompt shows up, and interrupt rules are checked on every chunk
//! so pagers and confirmations are dealt with while the read is running.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use tokio::time::Instant;

use super::buffer::{PatternBuffer, preview};
use super::interrupt;
use super::stream::Stream;
use crate::config::Model;
use crate::error::{ChannelError, Error, Result};

/// Line terminator appended to every command.
pub const LINE_TERMINATOR: &str = "\n";

/// One interactive session with a device.
pub struct Session<S: Stream> {
    /// `None` once the session has been closed.
    stream: Option<S>,

    model: Arc<Model>,

    /// Per-read deadline.
    timeout: Duration,

    buffer: PatternBuffer,
}

impl<S: Stream> Session<S> {
    /// Wrap an established stream.
    pub fn new(stream: S, model: Arc<Model>, timeout: Duration) -> Self {
        let buffer = if model.strip_ansi {
            PatternBuffer::new(model.search_depth)
        } else {
            PatternBuffer::raw(model.search_depth)
        };
        Self {
            stream: Some(stream),
            model,
            timeout,
            buffer,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Read until the prompt matches, using the session timeout.
    pub async fn read_until_prompt(&mut self) -> Result<String> {
        self.read_until_prompt_with_timeout(self.timeout).await
    }

    /// Read until the prompt matches, the deadline passes or the stream ends.
    ///
    /// Interrupt rules run against the whole buffer after every chunk, and
    /// the prompt is tested against the rewritten buffer. End of stream
    /// returns whatever was accumulated.
    pub async fn read_until_prompt_with_timeout(&mut self, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        let stream = self.stream.as_mut().ok_or(ChannelError::Closed)?;
        self.buffer.clear();

        loop {
            let chunk = match tokio::time::timeout_at(deadline, stream.read_chunk()).await {
                Err(_) => {
                    debug!(
                        "timeout after {:?}, buffer tail: {:?}",
                        timeout,
                        preview(self.buffer.as_str(), 80)
                    );
                    return Err(ChannelError::Timeout(timeout).into());
                }
                Ok(Ok(Some(chunk))) => chunk,
                Ok(Ok(None)) => {
                    debug!("stream ended before prompt");
                    break;
                }
                Ok(Err(e)) => return Err(e.into()),
            };

            trace!("read {} bytes", chunk.len());
            self.buffer.extend(&chunk);

            let pass = interrupt::evaluate(self.buffer.as_str(), &self.model.expect);
            for send in &pass.sends {
                trace!("interrupt rule fired, sending {} bytes", send.len());
                stream.write_all(send.as_bytes()).await?;
            }
            if let Some(rewritten) = pass.rewritten {
                self.buffer.replace(rewritten);
            }

            if self.buffer.tail_contains(&self.model.prompt) {
                break;
            }
        }

        Ok(self.buffer.take())
    }

    /// Write `text` as-is.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(ChannelError::Closed)?;
        stream.write_all(text.as_bytes()).await?;
        Ok(())
    }

    /// Write `text` followed by the line terminator.
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        let line = format!("{text}{LINE_TERMINATOR}");
        self.send(&line).await
    }

    /// Send a command and capture everything up to and including the next
    /// prompt.
    pub async fn execute(&mut self, command: &str) -> Result<String> {
        debug!("executing {:?}", command);
        self.send_line(command)
            .await
            .map_err(|e| Error::command(command, e))?;
        self.read_until_prompt()
            .await
            .map_err(|e| Error::command(command, e))
    }

    /// Run the model's post-connect commands in order, stopping at the
    /// first failure.
    pub async fn run_post_connect(&mut self) -> Result<()> {
        let model = Arc::clone(&self.model);
        for command in &model.post_login {
            self.execute(command).await?;
        }
        Ok(())
    }

    /// Send the pre-disconnect command, if any, without waiting for a
    /// response. Failures are logged and swallowed.
    pub async fn run_pre_disconnect(&mut self) {
        let Some(command) = self.model.pre_logout.clone() else {
            return;
        };
        debug!("sending pre-disconnect {:?}", command);
        if let Err(e) = self.send_line(&command).await {
            warn!("pre-disconnect {:?} failed: {}", command, e);
        }
    }

    /// Release the stream. Closing an already closed session is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        self.buffer.clear();
        stream.close().await?;
        Ok(())
    }
}
