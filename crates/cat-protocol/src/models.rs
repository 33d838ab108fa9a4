//! Radio model database
//!
//! Capability descriptors tell the control layer what a model can do, how
//! its receivers are addressed, and which protocol quirks its firmware has.
//! Only a handful of reference models ship here; applications can build
//! their own [`RadioCapabilities`] (or deserialize them with the `serde`
//! feature) for anything else.

use std::time::Duration;

use crate::meter::SMeterCalibration;
use crate::{OperatingMode, Protocol};

/// How a model's receivers and VFOs are addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Topology {
    /// One receiver with a VFO A/B pair
    #[default]
    DualVfo,
    /// Two independent receivers (main/sub), one VFO each
    DualReceiver,
    /// Two receivers, each with its own VFO A/B pair
    DualReceiverDualVfo,
}

impl Topology {
    /// Returns true if the model has a sub receiver
    pub fn has_sub_receiver(&self) -> bool {
        !matches!(self, Topology::DualVfo)
    }

    /// Returns true if each receiver has an A/B pair
    pub fn has_vfo_pair(&self) -> bool {
        !matches!(self, Topology::DualReceiver)
    }
}

/// Whether the interface reflects transmitted bytes back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EchoMode {
    /// Detect on the first exchange of the session
    #[default]
    Auto,
    /// Always echoed
    On,
    /// Never echoed
    Off,
}

/// How a SET command is acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AckMode {
    /// An explicit OK/NG frame follows every SET
    #[default]
    Frame,
    /// The radio echoes the SET back as confirmation
    Echo,
    /// Nothing comes back; success is assumed after send plus delay
    None,
}

/// Per-model protocol quirks
///
/// These are stated explicitly per model rather than guessed from other
/// capability fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuirkProfile {
    /// Minimum spacing between consecutive commands
    pub inter_command_delay: Duration,
    /// Echo behaviour of the interface
    pub echo: EchoMode,
    /// Acknowledgement of SET commands
    pub set_ack: AckMode,
    /// Reply meaning "busy, try again" (e.g. `?;` while transmitting)
    pub busy_token: Option<String>,
}

impl QuirkProfile {
    /// Modern CI-V radio: no delay, echo detected, OK/NG frames
    pub fn civ() -> Self {
        Self::default()
    }

    /// Legacy CI-V radio: slow MCU, echo on the shared bus
    pub fn civ_legacy() -> Self {
        Self {
            inter_command_delay: Duration::from_millis(20),
            echo: EchoMode::On,
            set_ack: AckMode::Frame,
            busy_token: None,
        }
    }

    /// ASCII radio that never acknowledges SETs
    pub fn ascii() -> Self {
        Self {
            inter_command_delay: Duration::ZERO,
            echo: EchoMode::Off,
            set_ack: AckMode::None,
            busy_token: None,
        }
    }

    /// Kenwood: `?;` while transmitting means busy
    pub fn kenwood() -> Self {
        Self {
            busy_token: Some("?;".to_string()),
            ..Self::ascii()
        }
    }
}

/// Capabilities of a specific radio model
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RadioCapabilities {
    /// Wire protocol family
    pub protocol: Protocol,
    /// Supported operating modes
    pub modes: Vec<OperatingMode>,
    /// Minimum frequency in Hz
    pub min_frequency_hz: u64,
    /// Maximum frequency in Hz
    pub max_frequency_hz: u64,
    /// Maximum TX power in watts
    pub max_power_watts: u16,
    /// Receiver/VFO addressing
    pub topology: Topology,
    /// Supports split operation
    pub has_split: bool,
    /// Supports RIT
    pub has_rit: bool,
    /// Supports XIT
    pub has_xit: bool,
    /// Largest RIT/XIT offset magnitude in Hz
    pub rit_max_hz: i32,
    /// Factory default baud rate
    pub default_baud: u32,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// RTS/CTS hardware flow control
    pub hardware_flow_control: bool,
    /// Firmware quirks
    pub quirks: QuirkProfile,
    /// S-meter raw scale
    pub s_meter: SMeterCalibration,
    /// Default CI-V address (Icom only)
    pub civ_address: Option<u8>,
    /// Width of the CI-V frequency field in bytes
    pub civ_frequency_bytes: usize,
}

impl RadioCapabilities {
    /// Returns true if the model can operate in `mode`
    pub fn supports_mode(&self, mode: OperatingMode) -> bool {
        self.modes.contains(&mode)
    }

    /// Returns true if `hz` is inside the model's tuning range
    pub fn frequency_in_range(&self, hz: u64) -> bool {
        (self.min_frequency_hz..=self.max_frequency_hz).contains(&hz)
    }
}

impl Default for RadioCapabilities {
    fn default() -> Self {
        Self {
            protocol: Protocol::IcomCiv,
            modes: ICOM_MODES.to_vec(),
            min_frequency_hz: 30_000,
            max_frequency_hz: 74_800_000,
            max_power_watts: 100,
            topology: Topology::DualVfo,
            has_split: true,
            has_rit: true,
            has_xit: true,
            rit_max_hz: 9_999,
            default_baud: 19_200,
            stop_bits: 1,
            hardware_flow_control: false,
            quirks: QuirkProfile::civ(),
            s_meter: SMeterCalibration::ICOM,
            civ_address: Some(0x94),
            civ_frequency_bytes: 5,
        }
    }
}

/// Information about a specific radio model
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RadioModel {
    /// Manufacturer name
    pub manufacturer: String,
    /// Model name/number
    pub model: String,
    /// Radio capabilities
    pub capabilities: RadioCapabilities,
}

const ICOM_MODES: &[OperatingMode] = &[
    OperatingMode::Lsb,
    OperatingMode::Usb,
    OperatingMode::Am,
    OperatingMode::Cw,
    OperatingMode::CwR,
    OperatingMode::Rtty,
    OperatingMode::RttyR,
    OperatingMode::Fm,
];

const KENWOOD_MODES: &[OperatingMode] = &[
    OperatingMode::Lsb,
    OperatingMode::Usb,
    OperatingMode::Cw,
    OperatingMode::CwR,
    OperatingMode::Fm,
    OperatingMode::Am,
    OperatingMode::Rtty,
    OperatingMode::RttyR,
    OperatingMode::DataL,
    OperatingMode::DataU,
];

const ELECRAFT_MODES: &[OperatingMode] = &[
    OperatingMode::Lsb,
    OperatingMode::Usb,
    OperatingMode::Cw,
    OperatingMode::CwR,
    OperatingMode::Fm,
    OperatingMode::Am,
    OperatingMode::DataL,
    OperatingMode::DataU,
];

const YAESU_MODES: &[OperatingMode] = &[
    OperatingMode::Lsb,
    OperatingMode::Usb,
    OperatingMode::Cw,
    OperatingMode::CwR,
    OperatingMode::Fm,
    OperatingMode::FmN,
    OperatingMode::Am,
    OperatingMode::Rtty,
    OperatingMode::RttyR,
    OperatingMode::DataL,
    OperatingMode::DataU,
    OperatingMode::DataFm,
];

fn icom(model: &str, address: u8, topology: Topology, max_hz: u64) -> RadioModel {
    RadioModel {
        manufacturer: "Icom".to_string(),
        model: model.to_string(),
        capabilities: RadioCapabilities {
            topology,
            max_frequency_hz: max_hz,
            civ_address: Some(address),
            ..RadioCapabilities::default()
        },
    }
}

fn ascii(
    manufacturer: &str,
    model: &str,
    protocol: Protocol,
    modes: &[OperatingMode],
    topology: Topology,
) -> RadioModel {
    let (quirks, s_meter) = match protocol {
        Protocol::Kenwood => (QuirkProfile::kenwood(), SMeterCalibration::KENWOOD),
        Protocol::Elecraft => (QuirkProfile::ascii(), SMeterCalibration::ELECRAFT),
        _ => (QuirkProfile::ascii(), SMeterCalibration::YAESU),
    };
    RadioModel {
        manufacturer: manufacturer.to_string(),
        model: model.to_string(),
        capabilities: RadioCapabilities {
            protocol,
            modes: modes.to_vec(),
            topology,
            max_frequency_hz: 60_000_000,
            rit_max_hz: 9_990,
            default_baud: 38_400,
            quirks,
            s_meter,
            civ_address: None,
            ..RadioCapabilities::default()
        },
    }
}

/// Reference model database
pub struct RadioDatabase;

impl RadioDatabase {
    /// All reference models
    pub fn all() -> Vec<RadioModel> {
        let mut ic706 = icom("IC-706MKIIG", 0x58, Topology::DualVfo, 200_000_000);
        ic706.capabilities.quirks = QuirkProfile::civ_legacy();
        ic706.capabilities.has_rit = false;
        ic706.capabilities.has_xit = false;
        ic706.capabilities.default_baud = 9_600;

        let mut ic9700 = icom("IC-9700", 0xA2, Topology::DualReceiverDualVfo, 1_320_000_000);
        ic9700.capabilities.min_frequency_hz = 144_000_000;
        ic9700.capabilities.has_rit = false;
        ic9700.capabilities.has_xit = false;

        let mut k3 = ascii(
            "Elecraft",
            "K3",
            Protocol::Elecraft,
            ELECRAFT_MODES,
            Topology::DualVfo,
        );
        k3.capabilities.rit_max_hz = 9_999;

        let mut ts590 = ascii(
            "Kenwood",
            "TS-590SG",
            Protocol::Kenwood,
            KENWOOD_MODES,
            Topology::DualVfo,
        );
        ts590.capabilities.default_baud = 9_600;
        ts590.capabilities.hardware_flow_control = true;

        let mut ts2000 = ascii(
            "Kenwood",
            "TS-2000",
            Protocol::Kenwood,
            KENWOOD_MODES,
            Topology::DualReceiver,
        );
        ts2000.capabilities.default_baud = 9_600;
        ts2000.capabilities.max_frequency_hz = 1_300_000_000;

        let mut ft991 = ascii(
            "Yaesu",
            "FT-991A",
            Protocol::YaesuAscii,
            YAESU_MODES,
            Topology::DualVfo,
        );
        ft991.capabilities.default_baud = 4_800;
        ft991.capabilities.stop_bits = 2;
        ft991.capabilities.max_frequency_hz = 470_000_000;

        let ftdx101 = ascii(
            "Yaesu",
            "FTDX101D",
            Protocol::YaesuAscii,
            YAESU_MODES,
            Topology::DualReceiver,
        );

        vec![
            icom("IC-7300", 0x94, Topology::DualVfo, 74_800_000),
            icom("IC-7610", 0x98, Topology::DualReceiverDualVfo, 60_000_000),
            ic9700,
            ic706,
            ts590,
            ts2000,
            k3,
            ft991,
            ftdx101,
        ]
    }

    /// Look up a model by name, ignoring case and punctuation
    pub fn by_name(name: &str) -> Option<RadioModel> {
        let wanted = normalize_name(name);
        Self::all()
            .into_iter()
            .find(|m| normalize_name(&m.model) == wanted)
    }

    /// Look up an Icom model by its default CI-V address
    pub fn by_civ_address(address: u8) -> Option<RadioModel> {
        Self::all()
            .into_iter()
            .find(|m| m.capabilities.civ_address == Some(address))
    }

    /// All reference models speaking `protocol`
    pub fn radios_for_protocol(protocol: Protocol) -> Vec<RadioModel> {
        Self::all()
            .into_iter()
            .filter(|m| m.capabilities.protocol == protocol)
            .collect()
    }
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
