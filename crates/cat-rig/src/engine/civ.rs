//! Icom CI-V engine
//!
//! Every command is one addressed frame. Reads answer with a frame carrying
//! the same opcode (and sub-command); SETs answer with OK (`FB`) or NG
//! (`FA`) unless the model never acknowledges. Frames that are not
//! addressed back to us are skipped while waiting.
//!
//! CI-V has no opcode addressing both the receiver and the VFO, so this
//! engine always selects first and then uses the current-slot commands.

use cat_protocol::bcd;
use cat_protocol::civ::{self, opcode, vfo_sub, Frame, FrameReader};
use cat_protocol::{AckMode, Band, RadioCapabilities, RitState, SMeterCalibration, Topology, Vfo};
use tracing::trace;

use super::{mismatch, Operation, Value};
use crate::error::{Result, RigError};
use crate::session::Session;
use crate::vfo::{Axis, Selection};

/// Sub-commands of `0x1C`
const PTT_SUB: u8 = 0x00;
/// Sub-command of `0x14` for RF power
const RF_POWER_SUB: u8 = 0x0A;
/// Sub-command of `0x15` for the S-meter
const S_METER_SUB: u8 = 0x02;
/// Sub-command of `0x19` for the transceiver ID
const ID_SUB: u8 = 0x00;
/// Sub-commands of `0x21`
const RIT_OFFSET_SUB: u8 = 0x00;
const RIT_ON_SUB: u8 = 0x01;
const XIT_ON_SUB: u8 = 0x02;

/// Full scale of CI-V level and meter fields
const LEVEL_MAX: u64 = 255;

/// CI-V protocol engine
#[derive(Debug, Clone)]
pub struct CivEngine {
    radio: u8,
    controller: u8,
    frequency_bytes: usize,
    max_power_watts: u16,
    s_meter: SMeterCalibration,
    topology: Topology,
}

impl CivEngine {
    /// Engine talking to the radio at `radio` from `controller`
    pub fn new(radio: u8, controller: u8, caps: &RadioCapabilities) -> Self {
        Self {
            radio,
            controller,
            frequency_bytes: caps.civ_frequency_bytes,
            max_power_watts: caps.max_power_watts,
            s_meter: caps.s_meter,
            topology: caps.topology,
        }
    }

    fn frame(&self, cmd: u8, sub: Option<u8>, data: &[u8]) -> Frame {
        Frame::new(self.radio, self.controller, cmd, sub, data)
    }

    /// Send `request` and return the first frame addressed back to us
    async fn transact(&self, session: &mut Session, request: &Frame) -> Result<Frame> {
        session.send(&request.encode()).await?;
        let mut reader = FrameReader::new();
        loop {
            let chunk = session.read_reply().await?;
            reader.push_bytes(&chunk);
            while let Some(parsed) = reader.next_frame() {
                let frame = parsed.map_err(|e| RigError::parse(e, &chunk))?;
                if !frame.is_reply_to(request) {
                    trace!("skipping frame not addressed to us: {:02X?}", frame);
                    continue;
                }
                if frame.is_ng() {
                    return Err(RigError::rejected(
                        format!("CI-V command 0x{:02X}", request.cmd),
                        &frame.encode(),
                    ));
                }
                return Ok(frame);
            }
        }
    }

    /// Read command: the reply must echo the opcode and `sub_len` sub bytes
    async fn query(&self, session: &mut Session, request: Frame, sub_len: usize) -> Result<Frame> {
        let reply = self.transact(session, &request).await?;
        if reply.answers(&request, sub_len) {
            Ok(reply)
        } else if reply.is_ok() {
            Err(RigError::invalid(
                format!("OK where data for 0x{:02X} was expected", request.cmd),
                &reply.encode(),
            ))
        } else {
            Err(RigError::invalid(
                format!("reply does not answer 0x{:02X}", request.cmd),
                &reply.encode(),
            ))
        }
    }

    /// SET command, acknowledged per the model's quirks
    async fn command(&self, session: &mut Session, request: Frame) -> Result<()> {
        match session.set_ack() {
            AckMode::Frame => {
                let reply = self.transact(session, &request).await?;
                if reply.is_ok() {
                    Ok(())
                } else {
                    Err(RigError::invalid(
                        format!("expected OK for 0x{:02X}", request.cmd),
                        &reply.encode(),
                    ))
                }
            }
            AckMode::Echo | AckMode::None => {
                session.send(&request.encode()).await?;
                session.finish().await
            }
        }
    }

    pub(crate) async fn select(&self, session: &mut Session, selection: Selection) -> Result<()> {
        let sub = match selection {
            Selection::Band(Band::Main) => vfo_sub::SELECT_MAIN,
            Selection::Band(Band::Sub) => vfo_sub::SELECT_SUB,
            Selection::Vfo(Vfo::A) => vfo_sub::SELECT_A,
            Selection::Vfo(Vfo::B) => vfo_sub::SELECT_B,
        };
        self.command(session, self.frame(opcode::VFO, Some(sub), &[]))
            .await
    }

    pub(crate) async fn read(&self, session: &mut Session, op: Operation) -> Result<Value> {
        match op {
            Operation::Frequency => {
                let reply = self
                    .query(session, self.frame(opcode::READ_FREQUENCY, None, &[]), 0)
                    .await?;
                if reply.payload.len() != self.frequency_bytes {
                    return Err(RigError::invalid(
                        format!("frequency field is not {} bytes", self.frequency_bytes),
                        &reply.encode(),
                    ));
                }
                let hz = bcd::decode_decimal(&reply.payload)
                    .map_err(|e| RigError::parse(e, &reply.encode()))?;
                Ok(Value::Frequency(hz))
            }
            Operation::Mode => {
                let reply = self
                    .query(session, self.frame(opcode::READ_MODE, None, &[]), 0)
                    .await?;
                let code = reply
                    .payload
                    .first()
                    .copied()
                    .ok_or_else(|| RigError::invalid("empty mode reply", &reply.encode()))?;
                let mode = civ::civ_mode_to_operating_mode(code)
                    .map_err(|e| RigError::parse(e, &reply.encode()))?;
                Ok(Value::Mode(mode))
            }
            Operation::Ptt => {
                let reply = self
                    .query(session, self.frame(opcode::PTT, Some(PTT_SUB), &[]), 1)
                    .await?;
                Ok(Value::Ptt(switch(reply.data(), &reply)?))
            }
            Operation::Split => {
                let reply = self
                    .query(session, self.frame(opcode::SPLIT, None, &[]), 0)
                    .await?;
                Ok(Value::Split(switch(&reply.payload, &reply)?))
            }
            Operation::Power => {
                let level = self.read_level(session, opcode::LEVEL, RF_POWER_SUB).await?;
                let max = u64::from(self.max_power_watts);
                let watts = (level * max + LEVEL_MAX / 2) / LEVEL_MAX;
                Ok(Value::Power(watts as u16))
            }
            Operation::Rit | Operation::Xit => {
                let on_sub = if op == Operation::Rit {
                    RIT_ON_SUB
                } else {
                    XIT_ON_SUB
                };
                let reply = self
                    .query(session, self.frame(opcode::RIT, Some(on_sub), &[]), 1)
                    .await?;
                let enabled = switch(reply.data(), &reply)?;
                let reply = self
                    .query(session, self.frame(opcode::RIT, Some(RIT_OFFSET_SUB), &[]), 1)
                    .await?;
                let offset = civ::decode_offset(reply.data())
                    .map_err(|e| RigError::parse(e, &reply.encode()))?;
                let state = RitState::new(enabled, offset);
                Ok(if op == Operation::Rit {
                    Value::Rit(state)
                } else {
                    Value::Xit(state)
                })
            }
            Operation::SMeter => {
                let raw = self.read_level(session, opcode::METER, S_METER_SUB).await?;
                Ok(Value::SMeter(self.s_meter.convert(raw as u16)))
            }
            Operation::Identify => {
                let reply = self
                    .query(session, self.frame(opcode::READ_ID, Some(ID_SUB), &[]), 1)
                    .await?;
                match reply.data() {
                    [address] => Ok(Value::Identity(format!("{:02X}", address))),
                    _ => Err(RigError::invalid("transceiver ID reply", &reply.encode())),
                }
            }
        }
    }

    /// Read a two-byte 0..255 level or meter field
    async fn read_level(&self, session: &mut Session, cmd: u8, sub: u8) -> Result<u64> {
        let reply = self.query(session, self.frame(cmd, Some(sub), &[]), 1).await?;
        if reply.data().len() != 2 {
            return Err(RigError::invalid("level field is not 2 bytes", &reply.encode()));
        }
        let level = bcd::decode_decimal_be(reply.data())
            .map_err(|e| RigError::parse(e, &reply.encode()))?;
        if level > LEVEL_MAX {
            return Err(RigError::invalid("level above 255", &reply.encode()));
        }
        Ok(level)
    }

    pub(crate) async fn write(&self, session: &mut Session, value: &Value) -> Result<()> {
        match value {
            Value::Frequency(hz) => {
                let payload = civ::frequency_payload(*hz, self.frequency_bytes)
                    .map_err(|e| RigError::InvalidParameter(e.to_string()))?;
                self.command(session, self.frame(opcode::SET_FREQUENCY, None, &payload))
                    .await
            }
            Value::Mode(mode) => {
                let code = civ::operating_mode_to_civ(*mode).ok_or_else(|| {
                    RigError::UnsupportedOperation(format!("{:?} has no CI-V mode code", mode))
                })?;
                self.command(session, self.frame(opcode::SET_MODE, None, &[code]))
                    .await
            }
            Value::Ptt(on) => {
                self.command(session, self.frame(opcode::PTT, Some(PTT_SUB), &[u8::from(*on)]))
                    .await
            }
            Value::Split(on) => {
                self.command(session, self.frame(opcode::SPLIT, None, &[u8::from(*on)]))
                    .await
            }
            Value::Power(watts) => {
                let max = u64::from(self.max_power_watts.max(1));
                let level = (u64::from(*watts) * LEVEL_MAX + max / 2) / max;
                let data = bcd::encode_decimal_be(level.min(LEVEL_MAX), 2)
                    .map_err(|e| RigError::InvalidParameter(e.to_string()))?;
                self.command(session, self.frame(opcode::LEVEL, Some(RF_POWER_SUB), &data))
                    .await
            }
            Value::Rit(state) | Value::Xit(state) => {
                let on_sub = if matches!(value, Value::Rit(_)) {
                    RIT_ON_SUB
                } else {
                    XIT_ON_SUB
                };
                let offset = civ::offset_payload(state.offset_hz)
                    .map_err(|e| RigError::InvalidParameter(e.to_string()))?;
                self.command(
                    session,
                    self.frame(opcode::RIT, Some(on_sub), &[u8::from(state.enabled)]),
                )
                .await?;
                self.command(session, self.frame(opcode::RIT, Some(RIT_OFFSET_SUB), &offset))
                    .await
            }
            Value::SMeter(_) | Value::Identity(_) => Err(mismatch("CI-V write", value)),
        }
    }

    /// Fails unless `07 B0` swaps along `axis` on this radio
    ///
    /// The one exchange command swaps A/B on single-receiver radios and
    /// main/sub otherwise.
    pub(crate) fn check_exchange(&self, axis: Axis) -> Result<()> {
        let native = match axis {
            Axis::Vfo => !self.topology.has_sub_receiver(),
            Axis::Band => self.topology.has_sub_receiver(),
        };
        if native {
            Ok(())
        } else {
            Err(RigError::UnsupportedOperation(format!(
                "CI-V has no {:?} exchange on a {:?} radio",
                axis, self.topology
            )))
        }
    }

    pub(crate) async fn exchange(&self, session: &mut Session, axis: Axis) -> Result<()> {
        self.check_exchange(axis)?;
        self.command(session, self.frame(opcode::VFO, Some(vfo_sub::EXCHANGE), &[]))
            .await
    }

    pub(crate) async fn equalize(&self, session: &mut Session, axis: Axis) -> Result<()> {
        let sub = match axis {
            Axis::Vfo => vfo_sub::EQUALIZE_AB,
            Axis::Band => vfo_sub::EQUALIZE_MAIN_SUB,
        };
        self.command(session, self.frame(opcode::VFO, Some(sub), &[]))
            .await
    }
}

/// Decode a one-byte on/off field
fn switch(data: &[u8], reply: &Frame) -> Result<bool> {
    match data {
        [0x00] => Ok(false),
        [0x01] => Ok(true),
        _ => Err(RigError::invalid("on/off field", &reply.encode())),
    }
}
