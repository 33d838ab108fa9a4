//! Byte transports to a radio
//!
//! The [`Transport`] trait abstracts over the physical link. Protocol
//! engines only see terminated chunks of bytes, never the port itself, so
//! the same engine runs against a serial port, an in-memory duplex stream
//! to a virtual radio, or a scripted mock.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub mod mock;
pub mod serial;
pub mod stream;

pub use mock::{MockHandle, MockTransport};
pub use serial::{list_ports, FlowControl, SerialConfig, SerialTransport, StopBits};
pub use stream::StreamTransport;

/// Asynchronous byte-level transport to a radio
///
/// A transport is acquired by [`open`](Transport::open) and released by
/// [`close`](Transport::close); the session owning it closes it on every
/// exit path.
#[async_trait]
pub trait Transport: Send {
    /// Acquire the underlying link
    async fn open(&mut self) -> Result<()>;

    /// Release the underlying link
    async fn close(&mut self) -> Result<()>;

    /// Discard any input received but not yet read
    async fn flush(&mut self) -> Result<()>;

    /// Write all bytes
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read up to and including the next `terminator` byte
    ///
    /// Fails with [`RigError::Timeout`](crate::RigError::Timeout) if no byte
    /// arrives within `timeout`, and with
    /// [`RigError::InvalidResponse`](crate::RigError::InvalidResponse) if
    /// bytes arrived but the terminator did not.
    async fn read_until(&mut self, terminator: u8, timeout: Duration) -> Result<Vec<u8>>;

    /// Returns true while the link is open
    fn is_open(&self) -> bool;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn open(&mut self) -> Result<()> {
        (**self).open().await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }

    async fn flush(&mut self) -> Result<()> {
        (**self).flush().await
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data).await
    }

    async fn read_until(&mut self, terminator: u8, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_until(terminator, timeout).await
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Bytes received but not yet handed out as a terminated chunk
#[derive(Debug, Default)]
pub(crate) struct ReadBuffer {
    pending: Vec<u8>,
}

impl ReadBuffer {
    pub(crate) fn extend(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Remove and return everything through the first `terminator`
    pub(crate) fn take_through(&mut self, terminator: u8) -> Option<Vec<u8>> {
        let pos = self.pending.iter().position(|&b| b == terminator)?;
        Some(self.pending.drain(..=pos).collect())
    }

    /// Remove and return whatever is buffered
    pub(crate) fn take_all(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_buffer_chunks() {
        let mut buf = ReadBuffer::default();
        buf.extend(b"FA00014250000;MD");
        assert_eq!(buf.take_through(b';').unwrap(), b"FA00014250000;");
        assert!(buf.take_through(b';').is_none());
        buf.extend(b"2;");
        assert_eq!(buf.take_through(b';').unwrap(), b"MD2;");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_read_buffer_partial() {
        let mut buf = ReadBuffer::default();
        buf.extend(&[0xFE, 0xFE, 0xE0]);
        assert!(buf.take_through(0xFD).is_none());
        assert_eq!(buf.take_all(), vec![0xFE, 0xFE, 0xE0]);
        assert!(buf.is_empty());
    }
}
