//! Error types for rig control

use cat_protocol::ParseError;
use thiserror::Error;

/// Errors returned by rig operations
#[derive(Debug, Error)]
pub enum RigError {
    /// No open session (never connected, or disconnected)
    #[error("not connected")]
    NotConnected,

    /// No reply within the command timeout
    #[error("timed out waiting for reply")]
    Timeout,

    /// Reply was malformed or not what the command expects
    #[error("invalid response ({context}): {bytes:02X?}")]
    InvalidResponse {
        /// What was being parsed and why it failed
        context: String,
        /// Offending bytes
        bytes: Vec<u8>,
    },

    /// Radio explicitly rejected the command
    #[error("command rejected ({context}): {bytes:02X?}")]
    CommandFailed {
        /// Command that was rejected
        context: String,
        /// Rejection reply
        bytes: Vec<u8>,
    },

    /// Radio is busy (e.g. transmitting); the command may be retried
    #[error("radio busy")]
    Busy,

    /// The model or protocol cannot do this
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Input out of range or of the wrong kind
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port error
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),
}

impl RigError {
    /// Build an [`RigError::InvalidResponse`] carrying the offending bytes
    pub fn invalid(context: impl Into<String>, bytes: &[u8]) -> Self {
        RigError::InvalidResponse {
            context: context.into(),
            bytes: bytes.to_vec(),
        }
    }

    /// Build a [`RigError::CommandFailed`] carrying the rejection reply
    pub fn rejected(context: impl Into<String>, bytes: &[u8]) -> Self {
        RigError::CommandFailed {
            context: context.into(),
            bytes: bytes.to_vec(),
        }
    }

    /// Map a codec error on `bytes` to [`RigError::InvalidResponse`]
    pub fn parse(err: ParseError, bytes: &[u8]) -> Self {
        Self::invalid(err.to_string(), bytes)
    }

    /// Returns true if the caller may retry the same command
    ///
    /// After a timeout the command may or may not have taken effect, so
    /// callers should re-query state before retrying a SET.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RigError::Busy | RigError::Timeout)
    }
}

impl From<ParseError> for RigError {
    fn from(err: ParseError) -> Self {
        RigError::InvalidResponse {
            context: err.to_string(),
            bytes: Vec::new(),
        }
    }
}

/// Result alias for rig operations
pub type Result<T> = std::result::Result<T, RigError>;
