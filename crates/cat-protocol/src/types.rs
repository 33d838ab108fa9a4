//! Normalized radio vocabulary
//!
//! These types are shared by every protocol family. Vendor codecs translate
//! to and from them so the control layer never sees vendor mode codes or
//! VFO numbering.

use std::fmt;

use crate::models::Topology;

/// Operating modes supported by amateur radio transceivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperatingMode {
    /// Lower Sideband
    Lsb,
    /// Upper Sideband
    Usb,
    /// Continuous Wave
    Cw,
    /// CW Reverse
    CwR,
    /// Amplitude Modulation
    Am,
    /// Frequency Modulation
    Fm,
    /// FM Narrow
    FmN,
    /// RTTY
    Rtty,
    /// RTTY Reverse
    RttyR,
    /// Data Lower
    DataL,
    /// Data Upper
    DataU,
    /// Data FM
    DataFm,
}

impl OperatingMode {
    /// Returns whether this is a voice mode
    pub fn is_voice(&self) -> bool {
        matches!(
            self,
            Self::Lsb | Self::Usb | Self::Am | Self::Fm | Self::FmN
        )
    }

    /// Returns whether this is a CW mode
    pub fn is_cw(&self) -> bool {
        matches!(self, Self::Cw | Self::CwR)
    }

    /// Returns whether this is a digital/data mode
    pub fn is_digital(&self) -> bool {
        matches!(
            self,
            Self::Rtty | Self::RttyR | Self::DataL | Self::DataU | Self::DataFm
        )
    }
}

/// VFO register within one receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Vfo {
    /// VFO A
    A,
    /// VFO B
    B,
}

impl Vfo {
    /// The other VFO of the pair
    pub fn other(self) -> Self {
        match self {
            Vfo::A => Vfo::B,
            Vfo::B => Vfo::A,
        }
    }

    /// Index into two-element per-VFO tables
    pub fn index(self) -> usize {
        match self {
            Vfo::A => 0,
            Vfo::B => 1,
        }
    }
}

/// Receiver (band) of a dual-receiver radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Band {
    /// Main (primary) receiver
    Main,
    /// Sub (secondary) receiver
    Sub,
}

impl Band {
    /// The other receiver
    pub fn other(self) -> Self {
        match self {
            Band::Main => Band::Sub,
            Band::Sub => Band::Main,
        }
    }

    /// Index into two-element per-band tables
    pub fn index(self) -> usize {
        match self {
            Band::Main => 0,
            Band::Sub => 1,
        }
    }
}

/// One addressable frequency/mode register: a receiver and one of its VFOs
///
/// Radios without independent receivers only use `Band::Main`; radios
/// whose receivers have no A/B pair only use `Vfo::A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Slot {
    /// Receiver
    pub band: Band,
    /// VFO within the receiver
    pub vfo: Vfo,
}

impl Slot {
    /// VFO A of the main receiver
    pub const MAIN_A: Slot = Slot::new(Band::Main, Vfo::A);
    /// VFO B of the main receiver
    pub const MAIN_B: Slot = Slot::new(Band::Main, Vfo::B);
    /// VFO A of the sub receiver
    pub const SUB_A: Slot = Slot::new(Band::Sub, Vfo::A);
    /// VFO B of the sub receiver
    pub const SUB_B: Slot = Slot::new(Band::Sub, Vfo::B);

    /// Create a slot
    pub const fn new(band: Band, vfo: Vfo) -> Self {
        Self { band, vfo }
    }

    /// VFO on a radio with a single receiver
    pub const fn vfo(vfo: Vfo) -> Self {
        Self::new(Band::Main, vfo)
    }

    /// Receiver on a radio whose receivers have no A/B pair
    pub const fn band(band: Band) -> Self {
        Self::new(band, Vfo::A)
    }

    /// Canonical form of this slot for a topology
    ///
    /// Returns `None` when the slot names a receiver or VFO the topology
    /// does not have (the sub receiver of a single-receiver radio, VFO B of
    /// a receiver without an A/B pair).
    pub fn normalize(self, topology: Topology) -> Option<Slot> {
        match topology {
            Topology::DualVfo if self.band == Band::Sub => None,
            Topology::DualReceiver if self.vfo == Vfo::B => None,
            _ => Some(self),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.band, self.vfo)
    }
}

/// RIT or XIT state: on/off plus a signed offset in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RitState {
    /// Offset applied while enabled
    pub enabled: bool,
    /// Signed offset in Hz
    pub offset_hz: i32,
}

impl RitState {
    /// Create a RIT/XIT state
    pub fn new(enabled: bool, offset_hz: i32) -> Self {
        Self { enabled, offset_hz }
    }
}

/// S-meter reading: raw vendor value plus its calibrated interpretation
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SMeterReading {
    /// Raw value reported by the radio
    pub raw: u16,
    /// S-units, 0.0 to 9.0
    pub s_units: f32,
    /// dB above S9 (zero at or below S9)
    pub db_over_s9: f32,
}

impl fmt::Display for SMeterReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.db_over_s9 > 0.0 {
            write!(f, "S9+{:.0}dB", self.db_over_s9)
        } else {
            write!(f, "S{:.1}", self.s_units)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_constructors() {
        assert_eq!(Slot::vfo(Vfo::B), Slot::MAIN_B);
        assert_eq!(Slot::band(Band::Sub), Slot::SUB_A);
        assert_eq!(Slot::SUB_B.to_string(), "Sub/B");
    }

    #[test]
    fn test_normalize_per_topology() {
        assert_eq!(Slot::MAIN_B.normalize(Topology::DualVfo), Some(Slot::MAIN_B));
        assert_eq!(Slot::SUB_A.normalize(Topology::DualVfo), None);
        assert_eq!(Slot::SUB_A.normalize(Topology::DualReceiver), Some(Slot::SUB_A));
        assert_eq!(Slot::MAIN_B.normalize(Topology::DualReceiver), None);
        assert_eq!(
            Slot::SUB_B.normalize(Topology::DualReceiverDualVfo),
            Some(Slot::SUB_B)
        );
    }

    #[test]
    fn test_other() {
        assert_eq!(Vfo::A.other(), Vfo::B);
        assert_eq!(Band::Sub.other(), Band::Main);
    }

    #[test]
    fn test_mode_classes() {
        assert!(OperatingMode::Usb.is_voice());
        assert!(OperatingMode::CwR.is_cw());
        assert!(OperatingMode::DataU.is_digital());
        assert!(!OperatingMode::Am.is_digital());
    }

    #[test]
    fn test_smeter_display() {
        let weak = SMeterReading {
            raw: 60,
            s_units: 4.5,
            db_over_s9: 0.0,
        };
        assert_eq!(weak.to_string(), "S4.5");
        let strong = SMeterReading {
            raw: 200,
            s_units: 9.0,
            db_over_s9: 40.0,
        };
        assert_eq!(strong.to_string(), "S9+40dB");
    }
}
