//! Connection session
//!
//! A [`Session`] owns the transport for the lifetime of a connection and
//! applies the quirk policy to every exchange: inter-command spacing, echo
//! stripping (pinned or detected on the first reply), busy classification,
//! and one deadline per command covering echo and reply together.

use std::time::Duration;

use cat_protocol::{AckMode, EchoMode, RadioCapabilities};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, RigError};
use crate::quirks::{EchoState, Pacer, QuirkPolicy};
use crate::transport::Transport;

/// An open connection to one radio
pub struct Session {
    transport: Box<dyn Transport>,
    caps: RadioCapabilities,
    quirks: QuirkPolicy,
    pacer: Pacer,
    timeout: Duration,
    terminator: u8,
    last_sent: Vec<u8>,
    echo_pending: bool,
    deadline: Instant,
}

impl Session {
    /// Open `transport` and start a session for a radio with `caps`
    pub async fn open(
        mut transport: Box<dyn Transport>,
        caps: RadioCapabilities,
        timeout: Duration,
        echo_override: Option<EchoMode>,
    ) -> Result<Self> {
        transport.open().await?;
        let quirks = QuirkPolicy::new(&caps.quirks, echo_override);
        info!(
            "Session opened ({}, echo {:?}, delay {:?})",
            caps.protocol, quirks.echo, quirks.inter_command_delay
        );
        Ok(Self {
            transport,
            terminator: caps.protocol.terminator(),
            pacer: Pacer::new(quirks.inter_command_delay),
            quirks,
            caps,
            timeout,
            last_sent: Vec::new(),
            echo_pending: false,
            deadline: Instant::now(),
        })
    }

    /// Capability descriptor of the connected radio
    pub fn capabilities(&self) -> &RadioCapabilities {
        &self.caps
    }

    /// Current echo state
    pub fn echo(&self) -> EchoState {
        self.quirks.echo
    }

    /// How SET commands are acknowledged
    pub fn set_ack(&self) -> AckMode {
        self.quirks.set_ack
    }

    /// Per-command timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns true while the transport is open
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Send one command, starting its deadline
    pub async fn send(&mut self, request: &[u8]) -> Result<()> {
        self.pacer.wait().await;
        self.transport.flush().await?;
        debug!("TX {:02X?}", request);
        self.transport.write(request).await?;
        self.pacer.mark();

        self.last_sent.clear();
        self.last_sent.extend_from_slice(request);
        self.echo_pending = self.quirks.echo != EchoState::Off;
        self.deadline = Instant::now() + self.timeout;
        Ok(())
    }

    /// Read the next reply chunk for the command last sent
    ///
    /// The echo of the command, if any, is consumed here. Callers that skip
    /// unrelated frames may call this repeatedly; all reads share the
    /// command's deadline.
    pub async fn read_reply(&mut self) -> Result<Vec<u8>> {
        loop {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            let chunk = self
                .transport
                .read_until(self.terminator, remaining)
                .await?;
            self.pacer.mark();
            debug!("RX {:02X?}", chunk);

            if self.echo_pending {
                self.echo_pending = false;
                let is_echo = chunk == self.last_sent;
                match self.quirks.echo {
                    EchoState::Detecting => {
                        self.quirks.echo = if is_echo {
                            EchoState::On
                        } else {
                            EchoState::Off
                        };
                        info!("Echo detected: {:?}", self.quirks.echo);
                        if is_echo {
                            continue;
                        }
                    }
                    EchoState::On if is_echo => {
                        trace!("discarded echo");
                        continue;
                    }
                    EchoState::On => {
                        warn!(
                            "expected echo of {:02X?}, got {:02X?}; treating it as the reply",
                            self.last_sent, chunk
                        );
                    }
                    EchoState::Off => {}
                }
            }

            if self.quirks.is_busy(&chunk) {
                debug!("radio busy");
                return Err(RigError::Busy);
            }
            return Ok(chunk);
        }
    }

    /// Read the confirmation of a SET on a radio that repeats accepted SETs
    ///
    /// The confirmation is byte-identical to the command, so it says
    /// nothing about link echo; an undecided echo state stays undecided
    /// until the next query.
    pub async fn read_confirmation(&mut self) -> Result<Vec<u8>> {
        if self.quirks.echo == EchoState::Detecting {
            self.echo_pending = false;
        }
        self.read_reply().await
    }

    /// End an exchange that expects no reply
    ///
    /// On an echoing link the echo is still consumed so it cannot be
    /// mistaken for the next command's reply.
    pub async fn finish(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.echo_pending);
        if pending && self.quirks.echo == EchoState::On {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            let chunk = self
                .transport
                .read_until(self.terminator, remaining)
                .await?;
            self.pacer.mark();
            if chunk != self.last_sent {
                warn!("expected echo of {:02X?}, got {:02X?}", self.last_sent, chunk);
            }
        }
        Ok(())
    }

    /// Release the transport
    pub async fn close(&mut self) -> Result<()> {
        self.echo_pending = false;
        self.transport.close().await?;
        info!("Session closed ({})", self.caps.protocol);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use cat_protocol::QuirkProfile;

    const READ_FREQ: &[u8] = &[0xFE, 0xFE, 0x94, 0xE0, 0x03, 0xFD];
    const FREQ_REPLY: &[u8] = &[
        0xFE, 0xFE, 0xE0, 0x94, 0x03, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD,
    ];

    async fn session(mock: MockTransport, caps: RadioCapabilities) -> Session {
        Session::open(Box::new(mock), caps, Duration::from_millis(100), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_echo_session_matches_plain_session() {
        let mut echoing = MockTransport::new().with_echo();
        echoing.expect(READ_FREQ, FREQ_REPLY);
        let mut plain = MockTransport::new();
        plain.expect(READ_FREQ, FREQ_REPLY);

        let mut caps = RadioCapabilities::default();
        caps.quirks.echo = EchoMode::On;
        let mut with_echo = session(echoing, caps.clone()).await;
        caps.quirks.echo = EchoMode::Off;
        let mut without = session(plain, caps).await;

        with_echo.send(READ_FREQ).await.unwrap();
        without.send(READ_FREQ).await.unwrap();
        assert_eq!(
            with_echo.read_reply().await.unwrap(),
            without.read_reply().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_echo_auto_detection() {
        let mut mock = MockTransport::new().with_echo();
        mock.expect(READ_FREQ, FREQ_REPLY);
        mock.expect(READ_FREQ, FREQ_REPLY);
        let mut s = session(mock, RadioCapabilities::default()).await;
        assert_eq!(s.echo(), EchoState::Detecting);

        s.send(READ_FREQ).await.unwrap();
        assert_eq!(s.read_reply().await.unwrap(), FREQ_REPLY);
        assert_eq!(s.echo(), EchoState::On);

        s.send(READ_FREQ).await.unwrap();
        assert_eq!(s.read_reply().await.unwrap(), FREQ_REPLY);
    }

    #[tokio::test]
    async fn test_no_echo_detected() {
        let mut mock = MockTransport::new();
        mock.expect(READ_FREQ, FREQ_REPLY);
        let mut s = session(mock, RadioCapabilities::default()).await;
        s.send(READ_FREQ).await.unwrap();
        assert_eq!(s.read_reply().await.unwrap(), FREQ_REPLY);
        assert_eq!(s.echo(), EchoState::Off);
    }

    #[tokio::test]
    async fn test_busy_token_classified() {
        let mut mock = MockTransport::new();
        mock.expect(b"FA;", b"?;");
        let mut caps = RadioCapabilities::default();
        caps.protocol = cat_protocol::Protocol::Kenwood;
        caps.quirks = QuirkProfile::kenwood();
        let mut s = session(mock, caps).await;
        s.send(b"FA;").await.unwrap();
        assert!(matches!(s.read_reply().await, Err(RigError::Busy)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_covers_whole_command() {
        let mut mock = MockTransport::new();
        mock.expect_silence(READ_FREQ);
        let mut s = session(mock, RadioCapabilities::default()).await;
        let start = Instant::now();
        s.send(READ_FREQ).await.unwrap();
        assert!(matches!(s.read_reply().await, Err(RigError::Timeout)));
        assert!(start.elapsed() <= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_finish_consumes_echo() {
        let mut mock = MockTransport::new().with_echo();
        mock.expect(b"FA00014250000;", b"");
        mock.expect(b"FA;", b"FA00014250000;");
        let mut caps = RadioCapabilities::default();
        caps.protocol = cat_protocol::Protocol::Kenwood;
        caps.quirks = QuirkProfile::ascii();
        caps.quirks.echo = EchoMode::On;
        let mut s = session(mock, caps).await;

        s.send(b"FA00014250000;").await.unwrap();
        s.finish().await.unwrap();
        s.send(b"FA;").await.unwrap();
        assert_eq!(s.read_reply().await.unwrap(), b"FA00014250000;");
    }

    #[tokio::test]
    async fn test_close_releases_transport() {
        let mock = MockTransport::new();
        let handle = mock.handle();
        let mut s = session(mock, RadioCapabilities::default()).await;
        assert!(handle.is_open());
        s.close().await.unwrap();
        assert!(!handle.is_open());
        assert!(matches!(s.send(READ_FREQ).await, Err(RigError::NotConnected)));
    }
}
