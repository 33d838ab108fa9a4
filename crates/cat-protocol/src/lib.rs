//! CAT Protocol Library
//!
//! This crate provides the wire-level codecs for amateur radio
//! CAT (Computer Aided Transceiver) control:
//!
//! - **Icom CI-V**: addressed binary frames with packed-decimal fields ([`civ`], [`bcd`])
//! - **Kenwood / Elecraft / Yaesu ASCII**: semicolon-terminated mnemonics with
//!   fixed-width decimal fields ([`ascii`]), parameterised per vendor by a
//!   [`dialect::Dialect`]
//!
//! Everything here is synchronous and allocation-light; sessions, timing and
//! VFO addressing live in `cat-rig`.
//!
//! # Example
//!
//! ```rust
//! use cat_protocol::ascii::parse_response;
//! use cat_protocol::dialect::KENWOOD;
//! use cat_protocol::OperatingMode;
//!
//! let reply = parse_response(b"MD2;", KENWOOD.mode).unwrap();
//! assert_eq!(KENWOOD.mode_from_code(reply.body()).unwrap(), OperatingMode::Usb);
//! ```

pub mod ascii;
pub mod bcd;
pub mod civ;
pub mod dialect;
pub mod error;
pub mod meter;
pub mod models;
pub mod types;

pub use dialect::{Dialect, RitOffsetStyle};
pub use error::ParseError;
pub use meter::SMeterCalibration;
pub use models::{
    AckMode, EchoMode, QuirkProfile, RadioCapabilities, RadioDatabase, RadioModel, Topology,
};
pub use types::{Band, OperatingMode, RitState, SMeterReading, Slot, Vfo};

/// Identifies which CAT protocol family a radio uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Protocol {
    /// Icom CI-V protocol (framed variable-length messages)
    IcomCiv,
    /// Kenwood protocol (ASCII semicolon-terminated)
    Kenwood,
    /// Elecraft protocol (Kenwood-compatible with extensions)
    Elecraft,
    /// Yaesu ASCII protocol (semicolon-terminated for FT-991/FTDX series)
    YaesuAscii,
}

impl Protocol {
    /// Returns a human-readable name for the protocol
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::IcomCiv => "Icom CI-V",
            Protocol::Kenwood => "Kenwood",
            Protocol::Elecraft => "Elecraft",
            Protocol::YaesuAscii => "Yaesu ASCII",
        }
    }

    /// The ASCII dialect, or `None` for the binary CI-V protocol
    pub fn dialect(&self) -> Option<&'static Dialect> {
        match self {
            Protocol::IcomCiv => None,
            Protocol::Kenwood => Some(&dialect::KENWOOD),
            Protocol::Elecraft => Some(&dialect::ELECRAFT),
            Protocol::YaesuAscii => Some(&dialect::YAESU),
        }
    }

    /// Reply terminator byte
    pub fn terminator(&self) -> u8 {
        match self {
            Protocol::IcomCiv => civ::TERMINATOR,
            _ => ascii::TERMINATOR,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
