//! Simulator errors

use thiserror::Error;

/// Errors building or running a virtual radio
#[derive(Debug, Error)]
pub enum SimError {
    /// No reference model with this name
    #[error("unknown radio model: {0}")]
    UnknownModel(String),

    /// A CI-V radio needs a bus address
    #[error("CI-V radio {0} has no address")]
    MissingCivAddress(String),

    /// Configuration could not be parsed
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The stream to the controller failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;
