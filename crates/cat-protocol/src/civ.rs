//! Icom CI-V frame codec
//!
//! The CI-V (Communication Interface V) protocol is used by Icom transceivers.
//! It uses framed variable-length binary messages with address-based routing
//! on a shared half-duplex bus.
//!
//! # Frame Format
//! ```text
//! FE FE [to] [from] [cmd] [subcmd] [data...] FD
//! ```
//!
//! - `FE FE`: Preamble (two bytes)
//! - `to`: Destination address (radio address, or 0xE0 for the controller)
//! - `from`: Source address
//! - `cmd`: Command code
//! - `subcmd`: Sub-command code (optional, depends on command)
//! - `data`: Variable length data (packed decimal for numeric fields)
//! - `FD`: Terminator
//!
//! A reply from the radio carries the request's addresses swapped. Anything
//! else seen on the bus (our own echo, another controller's traffic,
//! transceive broadcasts) is not a reply and is skipped by the caller.

use bytes::{BufMut, BytesMut};

use crate::bcd;
use crate::error::ParseError;
use crate::types::OperatingMode;

/// CI-V frame preamble byte
pub const PREAMBLE: u8 = 0xFE;
/// CI-V frame terminator byte
pub const TERMINATOR: u8 = 0xFD;
/// Default controller address
pub const CONTROLLER_ADDR: u8 = 0xE0;
/// Broadcast address (transceive updates are sent here)
pub const BROADCAST_ADDR: u8 = 0x00;
/// Collision marker seen on the bus when two stations talk at once
pub const COLLISION: u8 = 0xFC;

/// Maximum frame length (reasonable limit)
const MAX_FRAME_LEN: usize = 64;

/// Minimum frame: FE FE to from cmd FD
const MIN_FRAME_LEN: usize = 6;

/// CI-V command codes used by the control engine
pub mod opcode {
    /// Read operating frequency
    pub const READ_FREQUENCY: u8 = 0x03;
    /// Read operating mode
    pub const READ_MODE: u8 = 0x04;
    /// Set operating frequency
    pub const SET_FREQUENCY: u8 = 0x05;
    /// Set operating mode
    pub const SET_MODE: u8 = 0x06;
    /// VFO / band selection and exchange
    pub const VFO: u8 = 0x07;
    /// Split on/off
    pub const SPLIT: u8 = 0x0F;
    /// Level settings (sub 0x0A = RF power)
    pub const LEVEL: u8 = 0x14;
    /// Meter readings (sub 0x02 = S-meter)
    pub const METER: u8 = 0x15;
    /// Transceiver ID (sub 0x00)
    pub const READ_ID: u8 = 0x19;
    /// PTT (sub 0x00)
    pub const PTT: u8 = 0x1C;
    /// RIT/XIT (sub 0x00 offset, 0x01 RIT on/off, 0x02 XIT on/off)
    pub const RIT: u8 = 0x21;
    /// Positive acknowledgement
    pub const OK: u8 = 0xFB;
    /// Negative acknowledgement
    pub const NG: u8 = 0xFA;
}

/// Sub-commands of [`opcode::VFO`]
pub mod vfo_sub {
    /// Select VFO A
    pub const SELECT_A: u8 = 0x00;
    /// Select VFO B
    pub const SELECT_B: u8 = 0x01;
    /// Copy VFO A to VFO B
    pub const EQUALIZE_AB: u8 = 0xA0;
    /// Exchange VFO A and B (single receiver) or main and sub (dual receiver)
    pub const EXCHANGE: u8 = 0xB0;
    /// Copy main receiver to sub receiver
    pub const EQUALIZE_MAIN_SUB: u8 = 0xB1;
    /// Select main receiver
    pub const SELECT_MAIN: u8 = 0xD0;
    /// Select sub receiver
    pub const SELECT_SUB: u8 = 0xD1;
}

/// A parsed CI-V frame
///
/// `payload` holds everything between the command byte and the terminator,
/// including the sub-command byte when the command has one. Whether the
/// first payload byte is a sub-command depends on the opcode, so the split
/// is left to the caller ([`Frame::sub`], [`Frame::data`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Destination address
    pub dst: u8,
    /// Source address
    pub src: u8,
    /// Command byte
    pub cmd: u8,
    /// Sub-command and data bytes
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame from its parts
    pub fn new(dst: u8, src: u8, cmd: u8, sub: Option<u8>, data: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(data.len() + 1);
        if let Some(sub) = sub {
            payload.push(sub);
        }
        payload.extend_from_slice(data);
        Self {
            dst,
            src,
            cmd,
            payload,
        }
    }

    /// Sub-command byte, for opcodes that carry one
    pub fn sub(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Data bytes following a one-byte sub-command
    pub fn data(&self) -> &[u8] {
        self.payload.get(1..).unwrap_or(&[])
    }

    /// Returns true for the OK acknowledgement
    pub fn is_ok(&self) -> bool {
        self.cmd == opcode::OK && self.payload.is_empty()
    }

    /// Returns true for the NG (rejected) acknowledgement
    pub fn is_ng(&self) -> bool {
        self.cmd == opcode::NG && self.payload.is_empty()
    }

    /// Returns true if this frame is addressed as the reply to `request`
    ///
    /// The reply must come from the request's destination and be addressed
    /// to the request's source.
    pub fn is_reply_to(&self, request: &Frame) -> bool {
        self.src == request.dst && self.dst == request.src
    }

    /// Returns true if this is a data reply to `request` (same opcode and
    /// sub-command prefix), as opposed to an OK/NG acknowledgement
    pub fn answers(&self, request: &Frame, sub_len: usize) -> bool {
        self.is_reply_to(request)
            && self.cmd == request.cmd
            && self.payload.len() >= sub_len
            && request.payload.len() >= sub_len
            && self.payload[..sub_len] == request.payload[..sub_len]
    }

    /// Encode to wire bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(MIN_FRAME_LEN + self.payload.len());
        buf.put_u8(PREAMBLE);
        buf.put_u8(PREAMBLE);
        buf.put_u8(self.dst);
        buf.put_u8(self.src);
        buf.put_u8(self.cmd);
        buf.put_slice(&self.payload);
        buf.put_u8(TERMINATOR);
        buf.to_vec()
    }
}

/// Encode a CI-V frame into raw bytes ready for transmission
///
/// ```
/// use cat_protocol::civ::{encode_frame, CONTROLLER_ADDR};
///
/// // Read-frequency command to IC-7300 (addr 0x94)
/// let bytes = encode_frame(0x94, CONTROLLER_ADDR, 0x03, None, &[]);
/// assert_eq!(bytes, vec![0xFE, 0xFE, 0x94, 0xE0, 0x03, 0xFD]);
/// ```
pub fn encode_frame(dst: u8, src: u8, cmd: u8, sub: Option<u8>, data: &[u8]) -> Vec<u8> {
    Frame::new(dst, src, cmd, sub, data).encode()
}

/// Parse exactly one complete frame
///
/// The input must start with the preamble and end with the terminator.
/// Payload bytes are not interpreted here.
pub fn parse_frame(bytes: &[u8]) -> Result<Frame, ParseError> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(ParseError::Incomplete {
            needed: MIN_FRAME_LEN - bytes.len(),
        });
    }

    if bytes[0] != PREAMBLE || bytes[1] != PREAMBLE {
        return Err(ParseError::InvalidFrame("missing preamble".into()));
    }

    if bytes[bytes.len() - 1] != TERMINATOR {
        return Err(ParseError::InvalidFrame("missing terminator".into()));
    }

    let body = &bytes[2..bytes.len() - 1];
    if body.contains(&COLLISION) {
        return Err(ParseError::InvalidFrame("bus collision".into()));
    }
    if body.contains(&TERMINATOR) || body.contains(&PREAMBLE) {
        return Err(ParseError::InvalidFrame(
            "framing byte inside frame body".into(),
        ));
    }

    Ok(Frame {
        dst: body[0],
        src: body[1],
        cmd: body[2],
        payload: body[3..].to_vec(),
    })
}

/// Streaming frame extractor
///
/// Bytes are pushed as they arrive from the transport; complete frames are
/// pulled out one at a time. Noise before a preamble is skipped and frames
/// damaged by a bus collision are dropped.
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: Vec<u8>,
}

impl FrameReader {
    /// Create an empty reader
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_FRAME_LEN),
        }
    }

    /// Push raw bytes into the reader's buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Prevent unbounded growth from a stream with no terminators
        if self.buffer.len() > MAX_FRAME_LEN * 4 {
            let start = self.buffer.len() - MAX_FRAME_LEN;
            self.buffer.drain(..start);
        }
    }

    /// Bytes still waiting for a terminator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Try to extract the next complete frame
    ///
    /// Returns `None` when no complete frame is buffered, `Some(Err(_))` for
    /// a terminated but malformed frame (already removed from the buffer).
    pub fn next_frame(&mut self) -> Option<Result<Frame, ParseError>> {
        loop {
            let start = self
                .buffer
                .windows(2)
                .position(|w| w[0] == PREAMBLE && w[1] == PREAMBLE)?;
            if start > 0 {
                tracing::trace!("discarding {} bytes before CI-V preamble", start);
                self.buffer.drain(..start);
            }

            // Skip any run of extra preamble bytes
            let body_start = self.buffer[2..]
                .iter()
                .position(|&b| b != PREAMBLE)
                .map(|p| p + 2)?;
            if body_start > 2 {
                self.buffer.drain(..body_start - 2);
            }

            let term = self.buffer.iter().position(|&b| b == TERMINATOR)?;
            let raw: Vec<u8> = self.buffer.drain(..=term).collect();

            if raw.contains(&COLLISION) {
                tracing::warn!("dropping CI-V frame damaged by collision: {:02X?}", raw);
                continue;
            }
            return Some(parse_frame(&raw));
        }
    }
}

/// Build a frequency payload of `width` bytes
pub fn frequency_payload(hz: u64, width: usize) -> Result<Vec<u8>, ParseError> {
    bcd::encode_decimal(hz, width)
}

/// Build a RIT/XIT offset payload: two BCD bytes (LSB first) and a sign byte
pub fn offset_payload(offset_hz: i32) -> Result<Vec<u8>, ParseError> {
    let mut out = bcd::encode_decimal(u64::from(offset_hz.unsigned_abs()), 2)?;
    out.push(if offset_hz < 0 { 0x01 } else { 0x00 });
    Ok(out)
}

/// Decode a RIT/XIT offset payload
pub fn decode_offset(data: &[u8]) -> Result<i32, ParseError> {
    if data.len() != 3 {
        return Err(ParseError::InvalidFrame(format!(
            "offset field is {} bytes, expected 3",
            data.len()
        )));
    }
    let magnitude = bcd::decode_decimal(&data[..2])? as i32;
    match data[2] {
        0x00 => Ok(magnitude),
        0x01 => Ok(-magnitude),
        other => Err(ParseError::InvalidFrame(format!(
            "offset sign byte 0x{:02X}",
            other
        ))),
    }
}

/// Convert CI-V mode number to OperatingMode
pub fn civ_mode_to_operating_mode(mode: u8) -> Result<OperatingMode, ParseError> {
    match mode {
        0x00 => Ok(OperatingMode::Lsb),
        0x01 => Ok(OperatingMode::Usb),
        0x02 => Ok(OperatingMode::Am),
        0x03 => Ok(OperatingMode::Cw),
        0x04 => Ok(OperatingMode::Rtty),
        0x05 => Ok(OperatingMode::Fm),
        0x07 => Ok(OperatingMode::CwR),
        0x08 => Ok(OperatingMode::RttyR),
        _ => Err(ParseError::InvalidMode(format!("CI-V mode 0x{:02X}", mode))),
    }
}

/// Convert OperatingMode to the CI-V mode number
///
/// Data modes are a separate data-mode flag on CI-V radios, not a mode
/// number, so they have no mapping here.
pub fn operating_mode_to_civ(mode: OperatingMode) -> Option<u8> {
    match mode {
        OperatingMode::Lsb => Some(0x00),
        OperatingMode::Usb => Some(0x01),
        OperatingMode::Am => Some(0x02),
        OperatingMode::Cw => Some(0x03),
        OperatingMode::Rtty => Some(0x04),
        OperatingMode::Fm => Some(0x05),
        OperatingMode::CwR => Some(0x07),
        OperatingMode::RttyR => Some(0x08),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_set_frequency() {
        let payload = frequency_payload(14_250_000, 5).unwrap();
        let encoded = encode_frame(0x94, CONTROLLER_ADDR, opcode::SET_FREQUENCY, None, &payload);
        assert_eq!(
            encoded,
            vec![0xFE, 0xFE, 0x94, 0xE0, 0x05, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD]
        );
    }

    #[test]
    fn test_encode_with_sub_command() {
        let encoded = encode_frame(0x98, CONTROLLER_ADDR, opcode::VFO, Some(vfo_sub::SELECT_SUB), &[]);
        assert_eq!(encoded, vec![0xFE, 0xFE, 0x98, 0xE0, 0x07, 0xD1, 0xFD]);
    }

    #[test]
    fn test_parse_frequency_response() {
        let frame = parse_frame(&[
            0xFE, 0xFE, 0xE0, 0x94, 0x03, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD,
        ])
        .unwrap();
        assert_eq!(frame.dst, CONTROLLER_ADDR);
        assert_eq!(frame.src, 0x94);
        assert_eq!(frame.cmd, opcode::READ_FREQUENCY);
        assert_eq!(bcd::decode_decimal(&frame.payload).unwrap(), 14_250_000);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            parse_frame(&[0xFE, 0xFE, 0xE0, 0xFD]),
            Err(ParseError::Incomplete { needed: 2 })
        ));
        assert!(matches!(
            parse_frame(&[0xFE, 0x00, 0xE0, 0x94, 0xFB, 0xFD]),
            Err(ParseError::InvalidFrame(_))
        ));
        assert!(matches!(
            parse_frame(&[0xFE, 0xFE, 0xE0, 0x94, 0xFB, 0x00]),
            Err(ParseError::InvalidFrame(_))
        ));
        assert!(matches!(
            parse_frame(&[0xFE, 0xFE, 0xE0, 0x94, 0xFC, 0xFD]),
            Err(ParseError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_reply_addressing() {
        let request = Frame::new(0x94, CONTROLLER_ADDR, opcode::READ_FREQUENCY, None, &[]);
        let reply = Frame::new(CONTROLLER_ADDR, 0x94, opcode::READ_FREQUENCY, None, &[0; 5]);
        let echo = request.clone();
        let other_radio = Frame::new(CONTROLLER_ADDR, 0x98, opcode::READ_FREQUENCY, None, &[0; 5]);
        let broadcast = Frame::new(BROADCAST_ADDR, 0x94, 0x00, None, &[0; 5]);

        assert!(reply.is_reply_to(&request));
        assert!(reply.answers(&request, 0));
        assert!(!echo.is_reply_to(&request));
        assert!(!other_radio.is_reply_to(&request));
        assert!(!broadcast.is_reply_to(&request));
    }

    #[test]
    fn test_answers_checks_sub_command() {
        let request = Frame::new(0x94, CONTROLLER_ADDR, opcode::LEVEL, Some(0x0A), &[]);
        let power = Frame::new(CONTROLLER_ADDR, 0x94, opcode::LEVEL, Some(0x0A), &[0x01, 0x28]);
        let af_gain = Frame::new(CONTROLLER_ADDR, 0x94, opcode::LEVEL, Some(0x01), &[0x01, 0x28]);
        assert!(power.answers(&request, 1));
        assert!(!af_gain.answers(&request, 1));
        assert_eq!(power.data(), &[0x01, 0x28]);
    }

    #[test]
    fn test_ok_ng() {
        let ok = parse_frame(&[0xFE, 0xFE, 0xE0, 0x94, 0xFB, 0xFD]).unwrap();
        let ng = parse_frame(&[0xFE, 0xFE, 0xE0, 0x94, 0xFA, 0xFD]).unwrap();
        assert!(ok.is_ok() && !ok.is_ng());
        assert!(ng.is_ng() && !ng.is_ok());
    }

    #[test]
    fn test_streaming_reader() {
        let mut reader = FrameReader::new();

        // Noise, then a partial frame
        reader.push_bytes(&[0x12, 0x34, 0xFE, 0xFE, 0xE0, 0x94]);
        assert!(reader.next_frame().is_none());

        // Rest of it
        reader.push_bytes(&[0xFB, 0xFD]);
        let frame = reader.next_frame().unwrap().unwrap();
        assert!(frame.is_ok());
        assert_eq!(reader.pending(), 0);
    }

    #[test]
    fn test_reader_skips_extra_preamble_and_collisions() {
        let mut reader = FrameReader::new();
        reader.push_bytes(&[0xFE, 0xFE, 0xFE, 0xE0, 0x94, 0xFB, 0xFD]);
        assert!(reader.next_frame().unwrap().unwrap().is_ok());

        reader.push_bytes(&[0xFE, 0xFE, 0xE0, 0xFC, 0xFD]);
        reader.push_bytes(&[0xFE, 0xFE, 0xE0, 0x94, 0xFA, 0xFD]);
        assert!(reader.next_frame().unwrap().unwrap().is_ng());
    }

    #[test]
    fn test_offset_payload() {
        assert_eq!(offset_payload(150).unwrap(), vec![0x50, 0x01, 0x00]);
        assert_eq!(offset_payload(-9999).unwrap(), vec![0x99, 0x99, 0x01]);
        assert_eq!(decode_offset(&[0x50, 0x01, 0x01]).unwrap(), -150);
        assert!(decode_offset(&[0x50, 0x01, 0x02]).is_err());
        assert!(offset_payload(10_000).is_err());
    }

    #[test]
    fn test_mode_mapping() {
        for mode in [
            OperatingMode::Lsb,
            OperatingMode::Usb,
            OperatingMode::Cw,
            OperatingMode::CwR,
            OperatingMode::Am,
            OperatingMode::Fm,
            OperatingMode::Rtty,
            OperatingMode::RttyR,
        ] {
            let code = operating_mode_to_civ(mode).unwrap();
            assert_eq!(civ_mode_to_operating_mode(code).unwrap(), mode);
        }
        assert_eq!(operating_mode_to_civ(OperatingMode::DataU), None);
        assert!(civ_mode_to_operating_mode(0x42).is_err());
    }
}
