//! Virtual transceiver
//!
//! A [`VirtualRadio`] holds the state of a radio and answers controller
//! traffic the way the real one would: CI-V frames with OK/NG
//! acknowledgements, or one of the ASCII dialects. Bytes from the
//! controller go in through [`VirtualRadio::receive`]; whatever the radio
//! sends back (echo included, when the interface echoes) comes out.
//!
//! Each slot (receiver and VFO) keeps its own frequency and mode. Which
//! slot the "current" commands act on follows the selection commands the
//! radio has been sent, so addressing bugs in a controller show up as wrong
//! values rather than being papered over.

mod ascii;
mod civ;

use cat_protocol::civ::FrameReader;
use cat_protocol::{
    Band, EchoMode, OperatingMode, Protocol, RadioDatabase, RitState, Slot, Topology, Vfo,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SimError};

/// Default starting frequency (20 m)
const DEFAULT_FREQUENCY_HZ: u64 = 14_250_000;

/// Longest ASCII command accepted before the line is thrown away
const MAX_LINE_LEN: usize = 128;

/// Frequency and mode of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotState {
    /// Frequency in Hz
    pub frequency_hz: u64,
    /// Operating mode
    pub mode: OperatingMode,
}

/// Configuration for creating a virtual radio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualRadioConfig {
    /// Display name/identifier
    pub id: String,
    /// Wire protocol spoken
    pub protocol: Protocol,
    /// Receiver/VFO layout
    pub topology: Topology,
    /// CI-V bus address (CI-V only, required there)
    pub civ_address: Option<u8>,
    /// Width of CI-V frequency fields in bytes
    pub civ_frequency_bytes: usize,
    /// Body of the ASCII `ID` reply; a vendor default when unset
    pub identity: Option<String>,
    /// Frequency of every slot at power-on
    pub initial_frequency_hz: u64,
    /// Mode of every slot at power-on
    pub initial_mode: OperatingMode,
    /// Full-scale RF power in watts
    pub max_power_watts: u16,
    /// Reflect every received command back before answering
    pub echo: bool,
    /// Answer the error token to everything but PTT while transmitting
    pub busy_while_transmitting: bool,
    /// Receive but never answer
    pub silent: bool,
}

impl Default for VirtualRadioConfig {
    fn default() -> Self {
        Self {
            id: "Virtual Radio".to_string(),
            protocol: Protocol::Kenwood,
            topology: Topology::DualVfo,
            civ_address: None,
            civ_frequency_bytes: 5,
            identity: None,
            initial_frequency_hz: DEFAULT_FREQUENCY_HZ,
            initial_mode: OperatingMode::Usb,
            max_power_watts: 100,
            echo: false,
            busy_while_transmitting: false,
            silent: false,
        }
    }
}

impl VirtualRadioConfig {
    /// Configuration matching a reference model
    pub fn for_model(name: &str) -> Result<Self> {
        let model =
            RadioDatabase::by_name(name).ok_or_else(|| SimError::UnknownModel(name.to_string()))?;
        let caps = &model.capabilities;
        Ok(Self {
            id: model.model.clone(),
            protocol: caps.protocol,
            topology: caps.topology,
            civ_address: caps.civ_address,
            civ_frequency_bytes: caps.civ_frequency_bytes,
            identity: model_identity(&model.model).map(str::to_string),
            initial_frequency_hz: DEFAULT_FREQUENCY_HZ
                .max(caps.min_frequency_hz)
                .min(caps.max_frequency_hz),
            initial_mode: OperatingMode::Usb,
            max_power_watts: caps.max_power_watts,
            echo: caps.quirks.echo == EchoMode::On,
            busy_while_transmitting: caps.quirks.busy_token.is_some(),
            silent: false,
        })
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// `ID` reply bodies of the ASCII reference models
fn model_identity(model: &str) -> Option<&'static str> {
    match model {
        "TS-590SG" => Some("023"),
        "TS-2000" => Some("019"),
        "K3" => Some("017"),
        "FT-991A" => Some("0670"),
        "FTDX101D" => Some("0681"),
        _ => None,
    }
}

fn default_identity(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Elecraft => "017",
        Protocol::YaesuAscii => "0670",
        _ => "019",
    }
}

/// A simulated transceiver
#[derive(Debug)]
pub struct VirtualRadio {
    id: String,
    protocol: Protocol,
    topology: Topology,
    civ_address: u8,
    civ_frequency_bytes: usize,
    identity: String,
    /// Indexed `[band][vfo]`
    slots: [[SlotState; 2]; 2],
    band: Band,
    /// Selected VFO of each receiver
    vfo: [Vfo; 2],
    split: bool,
    ptt: bool,
    power_watts: u16,
    max_power_watts: u16,
    rit_on: bool,
    xit_on: bool,
    /// Shared RIT/XIT offset
    offset_hz: i32,
    s_meter_raw: u16,
    echo: bool,
    busy_while_transmitting: bool,
    silent: bool,
    requests: usize,
    frames: FrameReader,
    line: Vec<u8>,
}

impl VirtualRadio {
    /// Create a virtual radio from configuration
    pub fn from_config(config: VirtualRadioConfig) -> Result<Self> {
        let civ_address = match (config.protocol, config.civ_address) {
            (Protocol::IcomCiv, None) => return Err(SimError::MissingCivAddress(config.id)),
            (_, address) => address.unwrap_or_default(),
        };
        let identity = config
            .identity
            .unwrap_or_else(|| default_identity(config.protocol).to_string());
        let slot = SlotState {
            frequency_hz: config.initial_frequency_hz,
            mode: config.initial_mode,
        };

        Ok(Self {
            id: config.id,
            protocol: config.protocol,
            topology: config.topology,
            civ_address,
            civ_frequency_bytes: config.civ_frequency_bytes,
            identity,
            slots: [[slot; 2]; 2],
            band: Band::Main,
            vfo: [Vfo::A; 2],
            split: false,
            ptt: false,
            power_watts: config.max_power_watts,
            max_power_watts: config.max_power_watts,
            rit_on: false,
            xit_on: false,
            offset_hz: 0,
            s_meter_raw: 0,
            echo: config.echo,
            busy_while_transmitting: config.busy_while_transmitting,
            silent: config.silent,
            requests: 0,
            frames: FrameReader::new(),
            line: Vec::new(),
        })
    }

    /// Create a virtual radio behaving like a reference model
    pub fn for_model(name: &str) -> Result<Self> {
        Self::from_config(VirtualRadioConfig::for_model(name)?)
    }

    /// Get the radio's identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the protocol spoken by this radio
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Receiver/VFO layout
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// CI-V address (meaningless for ASCII radios)
    pub fn civ_address(&self) -> u8 {
        self.civ_address
    }

    /// Frequency and mode of a slot
    pub fn slot(&self, slot: Slot) -> SlotState {
        self.slots[slot.band.index()][slot.vfo.index()]
    }

    /// Frequency of a slot in Hz
    pub fn frequency(&self, slot: Slot) -> u64 {
        self.slot(slot).frequency_hz
    }

    /// Set a slot's frequency directly
    pub fn set_frequency(&mut self, slot: Slot, hz: u64) {
        self.slot_mut(slot).frequency_hz = hz;
    }

    /// Mode of a slot
    pub fn mode(&self, slot: Slot) -> OperatingMode {
        self.slot(slot).mode
    }

    /// Set a slot's mode directly
    pub fn set_mode(&mut self, slot: Slot, mode: OperatingMode) {
        self.slot_mut(slot).mode = mode;
    }

    /// Slot the "current" commands act on
    pub fn active_slot(&self) -> Slot {
        Slot::new(self.band, self.vfo[self.band.index()])
    }

    /// PTT state
    pub fn ptt(&self) -> bool {
        self.ptt
    }

    /// Key or unkey the transmitter directly
    pub fn set_ptt(&mut self, active: bool) {
        self.ptt = active;
    }

    /// Split state
    pub fn split(&self) -> bool {
        self.split
    }

    /// RF power in watts
    pub fn power_watts(&self) -> u16 {
        self.power_watts
    }

    /// RIT state
    pub fn rit(&self) -> RitState {
        RitState::new(self.rit_on, self.offset_hz)
    }

    /// XIT state
    pub fn xit(&self) -> RitState {
        RitState::new(self.xit_on, self.offset_hz)
    }

    /// Set the raw value reported by the S-meter
    pub fn set_s_meter_raw(&mut self, raw: u16) {
        self.s_meter_raw = raw;
    }

    /// Stop (or resume) answering
    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    /// Number of complete commands received so far
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Feed bytes from the controller, returning the bytes sent back
    ///
    /// Partial commands are buffered until their terminator arrives.
    pub fn receive(&mut self, data: &[u8]) -> Vec<u8> {
        let mut output = Vec::new();
        match self.protocol.dialect() {
            None => {
                self.frames.push_bytes(data);
                while let Some(frame) = self.frames.next_frame() {
                    let frame = match frame {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("{}: dropping malformed frame: {}", self.id, e);
                            continue;
                        }
                    };
                    self.requests += 1;
                    let reply = self.handle_civ(&frame);
                    if self.silent {
                        continue;
                    }
                    if self.echo {
                        output.extend_from_slice(&frame.encode());
                    }
                    if let Some(reply) = reply {
                        output.extend_from_slice(&reply.encode());
                    }
                }
            }
            Some(dialect) => {
                for &byte in data {
                    if byte != b';' {
                        self.line.push(byte);
                        if self.line.len() > MAX_LINE_LEN {
                            warn!("{}: discarding unterminated input", self.id);
                            self.line.clear();
                        }
                        continue;
                    }
                    let line = std::mem::take(&mut self.line);
                    self.requests += 1;
                    let reply = match std::str::from_utf8(&line) {
                        Ok(command) if command.is_ascii() => self.handle_ascii(dialect, command),
                        _ => dialect.error_tokens.first().map(|t| t.to_string()),
                    };
                    if self.silent {
                        continue;
                    }
                    if self.echo {
                        output.extend_from_slice(&line);
                        output.push(b';');
                    }
                    if let Some(reply) = reply {
                        output.extend_from_slice(reply.as_bytes());
                    }
                }
            }
        }
        if !output.is_empty() {
            debug!("{} -> {:02X?}", self.id, output);
        }
        output
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut SlotState {
        &mut self.slots[slot.band.index()][slot.vfo.index()]
    }

    fn active_mut(&mut self) -> &mut SlotState {
        let slot = self.active_slot();
        self.slot_mut(slot)
    }

    /// Select a VFO of the active receiver; false if the radio has no pair
    fn select_vfo(&mut self, vfo: Vfo) -> bool {
        if !self.topology.has_vfo_pair() {
            return false;
        }
        self.vfo[self.band.index()] = vfo;
        true
    }

    /// Select a receiver; false on a single-receiver radio
    fn select_band(&mut self, band: Band) -> bool {
        if !self.topology.has_sub_receiver() {
            return false;
        }
        self.band = band;
        true
    }

    /// Swap A and B of the active receiver
    fn exchange_vfos(&mut self) {
        self.slots[self.band.index()].swap(0, 1);
    }

    /// Swap the main and sub receivers
    fn exchange_bands(&mut self) {
        self.slots.swap(0, 1);
    }

    /// Copy A onto B in the active receiver
    fn equalize_vfos(&mut self) {
        let band = self.band.index();
        self.slots[band][1] = self.slots[band][0];
    }

    /// Copy the main receiver onto the sub receiver
    fn equalize_bands(&mut self) {
        self.slots[1] = self.slots[0];
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_for_model() {
        let config = VirtualRadioConfig::for_model("IC-9700").unwrap();
        assert_eq!(config.protocol, Protocol::IcomCiv);
        assert_eq!(config.civ_address, Some(0xA2));
        assert_eq!(config.topology, Topology::DualReceiverDualVfo);
        assert_eq!(config.initial_frequency_hz, 144_000_000);

        let ts590 = VirtualRadioConfig::for_model("ts590sg").unwrap();
        assert!(ts590.busy_while_transmitting);
        assert_eq!(ts590.identity.as_deref(), Some("023"));

        assert!(VirtualRadioConfig::for_model("IC-706MKIIG").unwrap().echo);
        assert!(matches!(
            VirtualRadioConfig::for_model("FT-1000"),
            Err(SimError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_civ_needs_address() {
        let config = VirtualRadioConfig {
            protocol: Protocol::IcomCiv,
            ..VirtualRadioConfig::default()
        };
        assert!(matches!(
            VirtualRadio::from_config(config),
            Err(SimError::MissingCivAddress(_))
        ));
    }

    #[test]
    fn test_config_from_json() {
        let config = VirtualRadioConfig::from_json(
            r#"{"id": "bench", "protocol": "Elecraft", "echo": true}"#,
        )
        .unwrap();
        assert_eq!(config.id, "bench");
        assert_eq!(config.protocol, Protocol::Elecraft);
        assert!(config.echo);
        assert_eq!(config.initial_frequency_hz, DEFAULT_FREQUENCY_HZ);

        assert!(matches!(
            VirtualRadioConfig::from_json(r#"{"protocol": "Morse"}"#),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_slots_are_independent() {
        let mut radio = VirtualRadio::for_model("IC-7610").unwrap();
        radio.set_frequency(Slot::SUB_B, 7_150_000);
        assert_eq!(radio.frequency(Slot::SUB_B), 7_150_000);
        assert_eq!(radio.frequency(Slot::MAIN_A), DEFAULT_FREQUENCY_HZ);
        assert_eq!(radio.active_slot(), Slot::MAIN_A);
    }

    #[test]
    fn test_selection_respects_topology() {
        let mut ts2000 = VirtualRadio::for_model("TS-2000").unwrap();
        assert!(!ts2000.select_vfo(Vfo::B));
        assert!(ts2000.select_band(Band::Sub));
        assert_eq!(ts2000.active_slot(), Slot::SUB_A);

        let mut ic7300 = VirtualRadio::for_model("IC-7300").unwrap();
        assert!(!ic7300.select_band(Band::Sub));
        assert!(ic7300.select_vfo(Vfo::B));
        assert_eq!(ic7300.active_slot(), Slot::MAIN_B);
    }

    #[test]
    fn test_partial_input_is_buffered() {
        let mut radio = VirtualRadio::for_model("TS-590SG").unwrap();
        assert!(radio.receive(b"FA").is_empty());
        assert_eq!(radio.requests(), 0);
        assert_eq!(radio.receive(b";"), b"FA00014250000;");
        assert_eq!(radio.requests(), 1);
    }

    #[test]
    fn test_silent_radio_counts_but_never_answers() {
        let mut radio = VirtualRadio::for_model("K3").unwrap();
        radio.set_silent(true);
        assert!(radio.receive(b"FA;MD;").is_empty());
        assert_eq!(radio.requests(), 2);
    }

    proptest! {
        #[test]
        fn prop_exchange_twice_restores(a in 30_000u64..60_000_000, b in 30_000u64..60_000_000) {
            let mut radio = VirtualRadio::for_model("IC-7610").unwrap();
            radio.set_frequency(Slot::MAIN_A, a);
            radio.set_frequency(Slot::SUB_A, b);

            radio.exchange_bands();
            prop_assert_eq!(radio.frequency(Slot::MAIN_A), b);
            prop_assert_eq!(radio.frequency(Slot::SUB_A), a);

            radio.exchange_bands();
            prop_assert_eq!(radio.frequency(Slot::MAIN_A), a);
            prop_assert_eq!(radio.frequency(Slot::SUB_A), b);
        }
    }
}
