//! Protocol engines
//!
//! An [`Engine`] turns a uniform [`Operation`] into wire commands for one
//! protocol family and decodes the replies into a [`Value`]. The set of
//! families is closed, so this is an enum rather than a trait object.

use cat_protocol::{OperatingMode, RadioCapabilities, RitState, SMeterReading, Topology};

use crate::config::RigConfig;
use crate::error::{Result, RigError};
use crate::session::Session;
use crate::vfo::{Address, Axis, Selection, Targeting};

pub mod ascii;
pub mod civ;

pub use ascii::AsciiEngine;
pub use civ::CivEngine;

/// A readable or writable radio parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Operation {
    /// Frequency of a slot
    Frequency,
    /// Operating mode of a slot
    Mode,
    /// Transmitter keyed
    Ptt,
    /// RF output power in watts
    Power,
    /// Split operation
    Split,
    /// Receiver incremental tuning
    Rit,
    /// Transmitter incremental tuning
    Xit,
    /// Signal strength (read-only)
    SMeter,
    /// Radio identification (read-only)
    Identify,
}

impl Operation {
    /// Returns true for operations addressed to a band/VFO slot
    pub fn is_slot_addressed(self) -> bool {
        matches!(self, Operation::Frequency | Operation::Mode)
    }

    /// Returns true if reads of this operation may be served from cache
    pub fn is_cacheable(self) -> bool {
        !matches!(self, Operation::Ptt | Operation::SMeter)
    }

    /// Returns true if the operation can only be read
    pub fn is_read_only(self) -> bool {
        matches!(self, Operation::SMeter | Operation::Identify)
    }
}

/// The value of an [`Operation`]
#[derive(Debug, Clone, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Value {
    /// Frequency in Hz
    Frequency(u64),
    /// Operating mode
    Mode(OperatingMode),
    /// Transmitting
    Ptt(bool),
    /// Power in watts
    Power(u16),
    /// Split on
    Split(bool),
    /// RIT state
    Rit(RitState),
    /// XIT state
    Xit(RitState),
    /// Calibrated S-meter reading
    SMeter(SMeterReading),
    /// Identification string as reported
    Identity(String),
}

impl Value {
    /// The operation this value belongs to
    pub fn operation(&self) -> Operation {
        match self {
            Value::Frequency(_) => Operation::Frequency,
            Value::Mode(_) => Operation::Mode,
            Value::Ptt(_) => Operation::Ptt,
            Value::Power(_) => Operation::Power,
            Value::Split(_) => Operation::Split,
            Value::Rit(_) => Operation::Rit,
            Value::Xit(_) => Operation::Xit,
            Value::SMeter(_) => Operation::SMeter,
            Value::Identity(_) => Operation::Identify,
        }
    }
}

/// Engine for the session's protocol family
#[derive(Debug, Clone)]
pub enum Engine {
    /// Icom CI-V binary frames
    Civ(CivEngine),
    /// Kenwood / Elecraft / Yaesu ASCII
    Ascii(AsciiEngine),
}

impl Engine {
    /// Pick the engine for a radio
    pub fn for_radio(caps: &RadioCapabilities, config: &RigConfig) -> Result<Self> {
        match caps.protocol.dialect() {
            Some(dialect) => {
                if caps.topology == Topology::DualReceiverDualVfo
                    && dialect.vfo_select == dialect.band_select
                {
                    return Err(RigError::UnsupportedOperation(format!(
                        "{} selects receivers and VFOs with one command",
                        dialect.name
                    )));
                }
                Ok(Engine::Ascii(AsciiEngine::new(dialect, caps)))
            }
            None => {
                let address = config
                    .civ_address
                    .or(caps.civ_address)
                    .ok_or_else(|| RigError::InvalidParameter("no CI-V address".into()))?;
                Ok(Engine::Civ(CivEngine::new(
                    address,
                    config.controller_address,
                    caps,
                )))
            }
        }
    }

    /// How this engine's command for `op` can address a slot
    pub fn targeting(&self, op: Operation) -> Targeting {
        match self {
            Engine::Civ(_) => Targeting::Current,
            Engine::Ascii(e) => e.targeting(op),
        }
    }

    /// Issue one selection command
    pub async fn select(&self, session: &mut Session, selection: Selection) -> Result<()> {
        match self {
            Engine::Civ(e) => e.select(session, selection).await,
            Engine::Ascii(e) => e.select(session, selection).await,
        }
    }

    /// Read `op` from the addressed slot
    pub async fn read(&self, session: &mut Session, op: Operation, address: Address) -> Result<Value> {
        match self {
            Engine::Civ(e) => e.read(session, op).await,
            Engine::Ascii(e) => e.read(session, op, address).await,
        }
    }

    /// Write `value` to the addressed slot
    pub async fn write(&self, session: &mut Session, address: Address, value: &Value) -> Result<()> {
        match self {
            Engine::Civ(e) => e.write(session, value).await,
            Engine::Ascii(e) => e.write(session, address, value).await,
        }
    }

    /// Fails if this radio cannot exchange along `axis`; sends nothing
    pub fn check_exchange(&self, axis: Axis) -> Result<()> {
        match self {
            Engine::Civ(e) => e.check_exchange(axis),
            Engine::Ascii(e) => e.check_exchange(axis),
        }
    }

    /// Fails if this radio cannot equalize along `axis`; sends nothing
    pub fn check_equalize(&self, axis: Axis) -> Result<()> {
        match self {
            // 07 A0 and 07 B1 exist on every radio with the matching pair
            Engine::Civ(_) => Ok(()),
            Engine::Ascii(e) => e.check_equalize(axis),
        }
    }

    /// Swap the two slots along `axis` with one native command
    pub async fn exchange(&self, session: &mut Session, axis: Axis) -> Result<()> {
        match self {
            Engine::Civ(e) => e.exchange(session, axis).await,
            Engine::Ascii(e) => e.exchange(session, axis).await,
        }
    }

    /// Copy the first slot along `axis` (A, or main) onto the second
    pub async fn equalize(&self, session: &mut Session, axis: Axis) -> Result<()> {
        match self {
            Engine::Civ(e) => e.equalize(session, axis).await,
            Engine::Ascii(e) => e.equalize(session, axis).await,
        }
    }
}

/// Error for a value written through the wrong operation
pub(crate) fn mismatch(op: &str, value: &Value) -> RigError {
    RigError::InvalidParameter(format!("{} cannot be set from {:?}", op, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cat_protocol::RadioDatabase;

    #[test]
    fn test_operation_classes() {
        assert!(Operation::Frequency.is_slot_addressed());
        assert!(!Operation::Power.is_slot_addressed());
        assert!(!Operation::Ptt.is_cacheable());
        assert!(!Operation::SMeter.is_cacheable());
        assert!(Operation::Rit.is_cacheable());
        assert!(Operation::Identify.is_read_only());
        assert_eq!(Value::Power(50).operation(), Operation::Power);
    }

    #[test]
    fn test_engine_per_protocol() {
        let config = RigConfig::default();
        let icom = RadioDatabase::by_name("IC-7300").unwrap().capabilities;
        assert!(matches!(Engine::for_radio(&icom, &config), Ok(Engine::Civ(_))));

        let k3 = RadioDatabase::by_name("K3").unwrap().capabilities;
        let engine = Engine::for_radio(&k3, &config).unwrap();
        assert!(matches!(engine, Engine::Ascii(_)));
        assert_eq!(engine.targeting(Operation::Frequency), Targeting::Indexed);
    }

    #[test]
    fn test_shared_selector_needs_single_axis() {
        let config = RigConfig::default();
        let ftdx = RadioDatabase::by_name("FTDX101D").unwrap().capabilities;
        assert!(Engine::for_radio(&ftdx, &config).is_ok());

        let four_state = RadioCapabilities {
            topology: Topology::DualReceiverDualVfo,
            ..ftdx
        };
        assert!(matches!(
            Engine::for_radio(&four_state, &config),
            Err(RigError::UnsupportedOperation(_))
        ));

        let kenwood = RadioCapabilities {
            topology: Topology::DualReceiverDualVfo,
            ..RadioDatabase::by_name("TS-2000").unwrap().capabilities
        };
        assert!(Engine::for_radio(&kenwood, &config).is_ok());
    }

    #[test]
    fn test_civ_without_address_rejected() {
        let mut caps = RadioCapabilities::default();
        caps.civ_address = None;
        assert!(matches!(
            Engine::for_radio(&caps, &RigConfig::default()),
            Err(RigError::InvalidParameter(_))
        ));
    }
}
