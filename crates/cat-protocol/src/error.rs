//! Error types for CAT protocol parsing and encoding

use thiserror::Error;

/// Errors that can occur while encoding or parsing protocol data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Buffer is incomplete - need more data
    #[error("incomplete data: need {needed} more bytes")]
    Incomplete { needed: usize },

    /// Invalid frame structure
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// A packed-decimal byte held a nibble above 9
    #[error("invalid BCD byte 0x{byte:02X} at offset {offset}")]
    InvalidBcd { byte: u8, offset: usize },

    /// Value does not fit the fixed-width field it is encoded into
    #[error("value {value} does not fit in {width} {unit}")]
    Overflow {
        value: u64,
        width: usize,
        unit: &'static str,
    },

    /// Reply carried a different mnemonic than the one queried
    #[error("expected mnemonic {expected}, got {actual:?}")]
    UnexpectedMnemonic { expected: String, actual: String },

    /// A fixed-width field slice would run past the response body
    #[error("field {start}..{end} out of bounds for body of length {len}")]
    FieldOutOfBounds { start: usize, end: usize, len: usize },

    /// A fixed-width field held something other than decimal digits
    #[error("invalid digits in field: {0:?}")]
    InvalidDigits(String),

    /// Mode code not present in the vendor table
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    /// Response was not valid ASCII
    #[error("non-ASCII response")]
    NotAscii,
}
