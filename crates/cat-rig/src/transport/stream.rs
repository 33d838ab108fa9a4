//! Transport over any async byte stream
//!
//! Used directly with `tokio::io::duplex()` to talk to a virtual radio, and
//! wrapped by [`SerialTransport`](super::SerialTransport) for real ports.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{trace, warn};

use super::{ReadBuffer, Transport};
use crate::error::{Result, RigError};

const READ_CHUNK: usize = 256;

/// Transport over an `AsyncRead + AsyncWrite` stream
///
/// The stream is open from construction until [`close`](Transport::close);
/// a closed stream transport cannot be reopened.
pub struct StreamTransport<S> {
    name: String,
    stream: Option<S>,
    buffer: ReadBuffer,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an open stream
    pub fn new(name: impl Into<String>, stream: S) -> Self {
        Self {
            name: name.into(),
            stream: Some(stream),
            buffer: ReadBuffer::default(),
        }
    }

    /// Name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mutable access to the underlying stream, if open
    pub fn stream_mut(&mut self) -> Option<&mut S> {
        self.stream.as_mut()
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            Ok(())
        } else {
            Err(RigError::NotConnected)
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.buffer.clear();
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("{}: error shutting down stream: {}", self.name, e);
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.buffer.clear();
        let stream = self.stream.as_mut().ok_or(RigError::NotConnected)?;

        // Drain whatever is already waiting without blocking
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match tokio::time::timeout(Duration::ZERO, stream.read(&mut buf)).await {
                Ok(Ok(n)) if n > 0 => {
                    trace!("{}: discarded {} stale bytes", self.name, n);
                }
                _ => break,
            }
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(RigError::NotConnected)?;
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_until(&mut self, terminator: u8, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; READ_CHUNK];

        loop {
            if let Some(chunk) = self.buffer.take_through(terminator) {
                return Ok(chunk);
            }

            let stream = self.stream.as_mut().ok_or(RigError::NotConnected)?;
            match tokio::time::timeout_at(deadline, stream.read(&mut buf)).await {
                Ok(Ok(0)) => {
                    warn!("{}: stream closed by peer", self.name);
                    self.stream = None;
                    return Err(RigError::NotConnected);
                }
                Ok(Ok(n)) => self.buffer.extend(&buf[..n]),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    if self.buffer.is_empty() {
                        return Err(RigError::Timeout);
                    }
                    let partial = self.buffer.take_all();
                    return Err(RigError::invalid("reply not terminated before timeout", &partial));
                }
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_until_splits_chunks() {
        let (client, mut radio) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new("test", client);

        radio.write_all(b"FA00014250000;MD2;").await.unwrap();
        let timeout = Duration::from_millis(100);
        assert_eq!(
            transport.read_until(b';', timeout).await.unwrap(),
            b"FA00014250000;"
        );
        assert_eq!(transport.read_until(b';', timeout).await.unwrap(), b"MD2;");
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_stream_times_out() {
        let (client, _radio) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new("silent", client);

        let start = Instant::now();
        let err = transport
            .read_until(b';', Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, RigError::Timeout));
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_reply_is_invalid() {
        let (client, mut radio) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new("partial", client);
        radio.write_all(b"FA000").await.unwrap();

        let err = transport
            .read_until(b';', Duration::from_millis(50))
            .await
            .unwrap_err();
        match err {
            RigError::InvalidResponse { bytes, .. } => assert_eq!(bytes, b"FA000"),
            other => panic!("expected InvalidResponse, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_flush_discards_stale_input() {
        let (client, mut radio) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new("flush", client);
        radio.write_all(b"FA00007000000;").await.unwrap();
        tokio::task::yield_now().await;

        transport.flush().await.unwrap();
        radio.write_all(b"MD3;").await.unwrap();
        assert_eq!(
            transport
                .read_until(b';', Duration::from_millis(100))
                .await
                .unwrap(),
            b"MD3;"
        );
    }

    #[tokio::test]
    async fn test_close_then_use() {
        let (client, _radio) = tokio::io::duplex(64);
        let mut transport = StreamTransport::new("closed", client);
        transport.close().await.unwrap();
        assert!(!transport.is_open());
        assert!(matches!(transport.open().await, Err(RigError::NotConnected)));
        assert!(matches!(
            transport.write(b"FA;").await,
            Err(RigError::NotConnected)
        ));
    }
}
