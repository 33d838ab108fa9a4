//! Per-session quirk and timing policy
//!
//! Built once per session from the model's [`QuirkProfile`], optionally
//! overridden by configuration. Both protocol engines consume it through
//! the session.

use std::time::Duration;

use cat_protocol::{AckMode, EchoMode, QuirkProfile};
use tokio::time::Instant;

/// Echo state of a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoState {
    /// Not yet known; decided by the first reply read
    Detecting,
    /// Every write is reflected back before the reply
    On,
    /// No reflection
    Off,
}

impl From<EchoMode> for EchoState {
    fn from(mode: EchoMode) -> Self {
        match mode {
            EchoMode::Auto => EchoState::Detecting,
            EchoMode::On => EchoState::On,
            EchoMode::Off => EchoState::Off,
        }
    }
}

/// Resolved quirk parameters for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuirkPolicy {
    /// Minimum spacing between writes
    pub inter_command_delay: Duration,
    /// Current echo state
    pub echo: EchoState,
    /// SET acknowledgement mode
    pub set_ack: AckMode,
    /// Reply classified as busy
    pub busy_token: Option<Vec<u8>>,
}

impl QuirkPolicy {
    /// Resolve a profile, with an optional echo override from configuration
    pub fn new(profile: &QuirkProfile, echo_override: Option<EchoMode>) -> Self {
        Self {
            inter_command_delay: profile.inter_command_delay,
            echo: echo_override.unwrap_or(profile.echo).into(),
            set_ack: profile.set_ack,
            busy_token: profile.busy_token.as_ref().map(|t| t.as_bytes().to_vec()),
        }
    }

    /// Returns true if `reply` is the busy token
    pub fn is_busy(&self, reply: &[u8]) -> bool {
        self.busy_token.as_deref() == Some(reply)
    }
}

/// Enforces the inter-command delay as a minimum spacing between writes
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    last: Option<Instant>,
}

impl Pacer {
    /// Pacer with the given minimum spacing
    pub fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }

    /// Wait until the next write is allowed
    pub async fn wait(&self) {
        if self.delay.is_zero() {
            return;
        }
        if let Some(last) = self.last {
            tokio::time::sleep_until(last + self.delay).await;
        }
    }

    /// Record the end of an exchange
    pub fn mark(&mut self) {
        self.last = Some(Instant::now());
    }
}
