//! The byte stream a session talks over.

use std::future::Future;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ChannelError;

/// Chunk size for reads from an [`IoStream`].
const READ_CHUNK: usize = 4096;

/// A bidirectional byte stream to one device shell.
pub trait Stream: Send {
    /// Read the next chunk. `Ok(None)` means the peer ended the stream.
    fn read_chunk(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, ChannelError>> + Send;

    /// Write all of `data`.
    fn write_all(&mut self, data: &[u8]) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Release the stream. Every close step is attempted; failures are
    /// collected into one error.
    fn close(&mut self) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Adapter exposing any tokio `AsyncRead + AsyncWrite` as a [`Stream`].
#[derive(Debug)]
pub struct IoStream<T> {
    inner: T,
    buf: BytesMut,
}

impl<T> IoStream<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }
}

impl<T> Stream for IoStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, ChannelError> {
        self.buf.clear();
        self.buf.reserve(READ_CHUNK);
        let n = self.inner.read_buf(&mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf.split().to_vec()))
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        self.inner.write_all(data).await?;
        self.inner.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_until_end_of_stream() {
        let mock = tokio_test::io::Builder::new()
            .read(b"hello")
            .read(b" world")
            .build();
        let mut stream = IoStream::new(mock);

        assert_eq!(stream.read_chunk().await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(stream.read_chunk().await.unwrap(), Some(b" world".to_vec()));
        assert_eq!(stream.read_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let mock = tokio_test::io::Builder::new()
            .write(b"show clock\n")
            .read(b"12:00\n")
            .build();
        let mut stream = IoStream::new(mock);

        stream.write_all(b"show clock\n").await.unwrap();
        assert_eq!(stream.read_chunk().await.unwrap(), Some(b"12:00\n".to_vec()));
    }

    #[tokio::test]
    async fn test_read_error_is_stream_error() {
        let mock = tokio_test::io::Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut stream = IoStream::new(mock);

        let err = stream.read_chunk().await.unwrap_err();
        assert!(matches!(err, ChannelError::Io(_)));
    }
}
