//! Scripted transport for testing protocol engines
//!
//! [`MockTransport`] holds an ordered queue of request/response pairs.
//! Each write is recorded and matched against the next expectation; the
//! paired response becomes readable. A [`MockHandle`] shares the same state
//! so a test can inspect traffic after the transport has been moved into a
//! session.
//!
//! ```
//! use cat_rig::transport::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! mock.expect(&[0xFE, 0xFE, 0x94, 0xE0, 0x03, 0xFD],
//!             &[0xFE, 0xFE, 0xE0, 0x94, 0x03, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD]);
//! let handle = mock.handle();
//! assert_eq!(handle.write_count(), 0);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{ReadBuffer, Transport};
use crate::error::{Result, RigError};

#[derive(Debug)]
struct Expectation {
    request: Vec<u8>,
    response: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockState {
    expectations: VecDeque<Expectation>,
    input: ReadBuffer,
    sent: Vec<Vec<u8>>,
    open: bool,
    echo: bool,
    opens: usize,
    closes: usize,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// A scripted [`Transport`]
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a closed mock with no expectations
    pub fn new() -> Self {
        Self::default()
    }

    /// Reflect every write back as input, like an echoing CI-V bus
    pub fn with_echo(self) -> Self {
        lock(&self.state).echo = true;
        self
    }

    /// When `request` is written, make `response` readable
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        lock(&self.state).expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Expect `request` and never answer it
    pub fn expect_silence(&mut self, request: &[u8]) {
        self.expect(request, &[]);
    }

    /// Handle for inspecting traffic later
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.open = true;
        state.opens += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.open = false;
        state.closes += 1;
        state.input.clear();
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(RigError::NotConnected);
        }
        state.input.clear();
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(RigError::NotConnected);
        }
        state.sent.push(data.to_vec());
        if state.echo {
            state.input.extend(data);
        }

        let expected = state.expectations.front().map(|e| e.request.clone());
        match expected {
            Some(request) if request == data => {
                if let Some(exp) = state.expectations.pop_front() {
                    state.input.extend(&exp.response);
                }
                Ok(())
            }
            Some(request) => {
                warn!(
                    "mock: unexpected write {:02X?}, expected {:02X?}",
                    data, request
                );
                Err(RigError::Io(std::io::Error::other(format!(
                    "unexpected write {:02X?}",
                    data
                ))))
            }
            None => Ok(()),
        }
    }

    async fn read_until(&mut self, terminator: u8, timeout: Duration) -> Result<Vec<u8>> {
        let partial = {
            let mut state = lock(&self.state);
            if !state.open {
                return Err(RigError::NotConnected);
            }
            if let Some(chunk) = state.input.take_through(terminator) {
                return Ok(chunk);
            }
            state.input.take_all()
        };

        // Nothing terminated will ever arrive; behave like a silent line
        tokio::time::sleep(timeout).await;
        if partial.is_empty() {
            Err(RigError::Timeout)
        } else {
            Err(RigError::invalid(
                "reply not terminated before timeout",
                &partial,
            ))
        }
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }
}

/// Shared view of a [`MockTransport`]'s traffic
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Every write so far, one element per `write` call
    pub fn sent(&self) -> Vec<Vec<u8>> {
        lock(&self.state).sent.clone()
    }

    /// Number of writes so far
    pub fn write_count(&self) -> usize {
        lock(&self.state).sent.len()
    }

    /// Expectations not yet consumed
    pub fn remaining(&self) -> usize {
        lock(&self.state).expectations.len()
    }

    /// Returns true while the transport is open
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Number of `close` calls
    pub fn close_count(&self) -> usize {
        lock(&self.state).closes
    }

    /// Number of `open` calls
    pub fn open_count(&self) -> usize {
        lock(&self.state).opens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_exchange() {
        let mut mock = MockTransport::new();
        mock.expect(b"FA;", b"FA00014250000;");
        let handle = mock.handle();

        mock.open().await.unwrap();
        mock.write(b"FA;").await.unwrap();
        let reply = mock
            .read_until(b';', Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(reply, b"FA00014250000;");
        assert_eq!(handle.sent(), vec![b"FA;".to_vec()]);
        assert_eq!(handle.remaining(), 0);
    }

    #[tokio::test]
    async fn test_unexpected_write_is_error() {
        let mut mock = MockTransport::new();
        mock.expect(b"FA;", b"FA00014250000;");
        mock.open().await.unwrap();
        assert!(matches!(mock.write(b"FB;").await, Err(RigError::Io(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_times_out() {
        let mut mock = MockTransport::new();
        mock.expect_silence(b"FA;");
        mock.open().await.unwrap();
        mock.write(b"FA;").await.unwrap();
        assert!(matches!(
            mock.read_until(b';', Duration::from_millis(100)).await,
            Err(RigError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_echo_precedes_reply() {
        let mut mock = MockTransport::new().with_echo();
        mock.expect(b"ID;", b"ID019;");
        mock.open().await.unwrap();
        mock.write(b"ID;").await.unwrap();
        let timeout = Duration::from_millis(10);
        assert_eq!(mock.read_until(b';', timeout).await.unwrap(), b"ID;");
        assert_eq!(mock.read_until(b';', timeout).await.unwrap(), b"ID019;");
    }

    #[tokio::test]
    async fn test_closed_mock_not_connected() {
        let mut mock = MockTransport::new();
        assert!(matches!(mock.write(b"ID;").await, Err(RigError::NotConnected)));
    }
}
