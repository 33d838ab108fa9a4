//! CI-V side of the virtual radio

use cat_protocol::bcd;
use cat_protocol::civ::{self, opcode, vfo_sub, Frame};
use tracing::trace;

use super::VirtualRadio;

const PTT_SUB: u8 = 0x00;
const RF_POWER_SUB: u8 = 0x0A;
const S_METER_SUB: u8 = 0x02;
const ID_SUB: u8 = 0x00;
const RIT_OFFSET_SUB: u8 = 0x00;
const RIT_ON_SUB: u8 = 0x01;
const XIT_ON_SUB: u8 = 0x02;

/// Full scale of levels and meters
const LEVEL_MAX: u64 = 255;

/// What the radio answers to one frame
enum Answer {
    Ok,
    Ng,
    /// Same opcode, this payload
    Data(Vec<u8>),
}

impl VirtualRadio {
    /// Answer one frame; `None` if it was not addressed to this radio
    pub(super) fn handle_civ(&mut self, frame: &Frame) -> Option<Frame> {
        if frame.dst != self.civ_address {
            trace!(
                "{}: ignoring frame for 0x{:02X}",
                self.id,
                frame.dst
            );
            return None;
        }

        let reply = match self.civ_answer(frame.cmd, &frame.payload) {
            Answer::Ok => Frame::new(frame.src, self.civ_address, opcode::OK, None, &[]),
            Answer::Ng => Frame::new(frame.src, self.civ_address, opcode::NG, None, &[]),
            Answer::Data(payload) => Frame {
                dst: frame.src,
                src: self.civ_address,
                cmd: frame.cmd,
                payload,
            },
        };
        Some(reply)
    }

    fn civ_answer(&mut self, cmd: u8, payload: &[u8]) -> Answer {
        match (cmd, payload) {
            (opcode::READ_FREQUENCY, []) => {
                let hz = self.slot(self.active_slot()).frequency_hz;
                match bcd::encode_decimal(hz, self.civ_frequency_bytes) {
                    Ok(data) => Answer::Data(data),
                    Err(_) => Answer::Ng,
                }
            }
            (opcode::SET_FREQUENCY, data) if data.len() == self.civ_frequency_bytes => {
                match bcd::decode_decimal(data) {
                    Ok(hz) => {
                        self.active_mut().frequency_hz = hz;
                        Answer::Ok
                    }
                    Err(_) => Answer::Ng,
                }
            }
            (opcode::READ_MODE, []) => {
                let mode = self.slot(self.active_slot()).mode;
                match civ::operating_mode_to_civ(mode) {
                    // Second byte is the filter width (FIL1)
                    Some(code) => Answer::Data(vec![code, 0x01]),
                    None => Answer::Ng,
                }
            }
            (opcode::SET_MODE, [code, ..]) => match civ::civ_mode_to_operating_mode(*code) {
                Ok(mode) => {
                    self.active_mut().mode = mode;
                    Answer::Ok
                }
                Err(_) => Answer::Ng,
            },
            (opcode::VFO, [sub]) => self.civ_vfo(*sub),
            (opcode::SPLIT, []) => Answer::Data(vec![u8::from(self.split)]),
            (opcode::SPLIT, [on @ (0 | 1)]) => {
                self.split = *on == 1;
                Answer::Ok
            }
            (opcode::LEVEL, [RF_POWER_SUB]) => {
                let max = u64::from(self.max_power_watts.max(1));
                let level = (u64::from(self.power_watts) * LEVEL_MAX + max / 2) / max;
                level_reply(RF_POWER_SUB, level)
            }
            (opcode::LEVEL, [RF_POWER_SUB, data @ ..]) if data.len() == 2 => {
                match bcd::decode_decimal_be(data) {
                    Ok(level) if level <= LEVEL_MAX => {
                        let max = u64::from(self.max_power_watts);
                        self.power_watts = ((level * max + LEVEL_MAX / 2) / LEVEL_MAX) as u16;
                        Answer::Ok
                    }
                    _ => Answer::Ng,
                }
            }
            (opcode::METER, [S_METER_SUB]) => {
                level_reply(S_METER_SUB, u64::from(self.s_meter_raw).min(LEVEL_MAX))
            }
            (opcode::READ_ID, [ID_SUB]) => Answer::Data(vec![ID_SUB, self.civ_address]),
            (opcode::PTT, [PTT_SUB]) => Answer::Data(vec![PTT_SUB, u8::from(self.ptt)]),
            (opcode::PTT, [PTT_SUB, on @ (0 | 1)]) => {
                self.ptt = *on == 1;
                Answer::Ok
            }
            (opcode::RIT, [RIT_OFFSET_SUB]) => match civ::offset_payload(self.offset_hz) {
                Ok(data) => {
                    let mut payload = vec![RIT_OFFSET_SUB];
                    payload.extend_from_slice(&data);
                    Answer::Data(payload)
                }
                Err(_) => Answer::Ng,
            },
            (opcode::RIT, [RIT_OFFSET_SUB, data @ ..]) => match civ::decode_offset(data) {
                Ok(offset) => {
                    self.offset_hz = offset;
                    Answer::Ok
                }
                Err(_) => Answer::Ng,
            },
            (opcode::RIT, [RIT_ON_SUB]) => Answer::Data(vec![RIT_ON_SUB, u8::from(self.rit_on)]),
            (opcode::RIT, [RIT_ON_SUB, on @ (0 | 1)]) => {
                self.rit_on = *on == 1;
                Answer::Ok
            }
            (opcode::RIT, [XIT_ON_SUB]) => Answer::Data(vec![XIT_ON_SUB, u8::from(self.xit_on)]),
            (opcode::RIT, [XIT_ON_SUB, on @ (0 | 1)]) => {
                self.xit_on = *on == 1;
                Answer::Ok
            }
            _ => {
                trace!("{}: unsupported command {:02X} {:02X?}", self.id, cmd, payload);
                Answer::Ng
            }
        }
    }

    fn civ_vfo(&mut self, sub: u8) -> Answer {
        let accepted = match sub {
            vfo_sub::SELECT_A => self.select_vfo(cat_protocol::Vfo::A),
            vfo_sub::SELECT_B => self.select_vfo(cat_protocol::Vfo::B),
            vfo_sub::SELECT_MAIN => self.select_band(cat_protocol::Band::Main),
            vfo_sub::SELECT_SUB => self.select_band(cat_protocol::Band::Sub),
            // Whole receivers on dual-receiver radios, A/B otherwise
            vfo_sub::EXCHANGE => {
                if self.topology.has_sub_receiver() {
                    self.exchange_bands();
                } else {
                    self.exchange_vfos();
                }
                true
            }
            vfo_sub::EQUALIZE_AB if self.topology.has_vfo_pair() => {
                self.equalize_vfos();
                true
            }
            vfo_sub::EQUALIZE_MAIN_SUB if self.topology.has_sub_receiver() => {
                self.equalize_bands();
                true
            }
            _ => false,
        };
        if accepted {
            Answer::Ok
        } else {
            Answer::Ng
        }
    }
}

fn level_reply(sub: u8, level: u64) -> Answer {
    match bcd::encode_decimal_be(level, 2) {
        Ok(data) => {
            let mut payload = vec![sub];
            payload.extend_from_slice(&data);
            Answer::Data(payload)
        }
        Err(_) => Answer::Ng,
    }
}
