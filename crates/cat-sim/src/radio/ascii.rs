//! ASCII side of the virtual radio
//!
//! One interpreter serves every dialect; the mnemonics, code tables and
//! `IF` layout come from the [`Dialect`] tables the controller uses too.

use cat_protocol::dialect::{Dialect, PttStyle, RitOffsetStyle};
use cat_protocol::{Band, Slot, Vfo};
use tracing::trace;

use super::VirtualRadio;

/// Digits of the power field
const POWER_DIGITS: usize = 3;

/// What the radio answers to one command
enum Answer {
    /// SET taken; ASCII radios say nothing
    Accepted,
    /// Query answered
    Report(String),
    /// Error token
    Rejected,
}

impl VirtualRadio {
    /// Answer one command (terminator already stripped)
    pub(super) fn handle_ascii(&mut self, d: &'static Dialect, command: &str) -> Option<String> {
        let answer = if self.busy_while_transmitting
            && self.ptt
            && !command.starts_with("TX")
            && !command.starts_with("RX")
        {
            Answer::Rejected
        } else {
            self.ascii_answer(d, command)
        };

        match answer {
            Answer::Accepted => None,
            Answer::Report(reply) => Some(reply),
            Answer::Rejected => {
                trace!("{}: rejecting {:?}", self.id, command);
                Some(d.error_tokens.first().copied().unwrap_or("?;").to_string())
            }
        }
    }

    fn ascii_answer(&mut self, d: &'static Dialect, command: &str) -> Answer {
        let full = format!("{};", command);
        if d.exchange == Some(full.as_str()) {
            return self.ascii_pair(true);
        }
        if d.equalize == Some(full.as_str()) {
            return self.ascii_pair(false);
        }
        if command.len() < 2 {
            return Answer::Rejected;
        }
        let (mnemonic, params) = command.split_at(2);

        if let Some(index) = d.frequency.iter().position(|m| *m == mnemonic) {
            return self.ascii_frequency(d, mnemonic, self.indexed_slot(index), params);
        }
        if mnemonic == d.mode {
            return self.ascii_mode(d, params);
        }
        if d.vfo_select == Some(mnemonic) && self.topology.has_vfo_pair() {
            let current = self.vfo[self.band.index()] == Vfo::B;
            return match flag_param(params) {
                Some(None) => Answer::Report(flag_report(mnemonic, current)),
                Some(Some(b)) => accepted(self.select_vfo(if b { Vfo::B } else { Vfo::A })),
                None => Answer::Rejected,
            };
        }
        if d.band_select == Some(mnemonic) && self.topology.has_sub_receiver() {
            let current = self.band == Band::Sub;
            return match flag_param(params) {
                Some(None) => Answer::Report(flag_report(mnemonic, current)),
                Some(Some(b)) => accepted(self.select_band(if b { Band::Sub } else { Band::Main })),
                None => Answer::Rejected,
            };
        }
        if mnemonic == d.split {
            return flag_command(mnemonic, params, &mut self.split);
        }
        if mnemonic == "TX" || mnemonic == "RX" {
            return self.ascii_ptt(d, mnemonic, params);
        }
        if mnemonic == d.power {
            return self.ascii_power(mnemonic, params);
        }
        if mnemonic == d.rit {
            return flag_command(mnemonic, params, &mut self.rit_on);
        }
        if mnemonic == d.xit {
            return flag_command(mnemonic, params, &mut self.xit_on);
        }
        if mnemonic == d.rit_clear && params.is_empty() {
            self.offset_hz = 0;
            return Answer::Accepted;
        }
        match d.rit_offset {
            RitOffsetStyle::Absolute {
                mnemonic: offset,
                digits,
            } if offset == mnemonic => {
                if params.is_empty() {
                    return Answer::Report(format!(
                        "{}{};",
                        mnemonic,
                        signed_field(self.offset_hz, digits + 1)
                    ));
                }
                return match parse_signed(params, digits) {
                    Some(hz) => {
                        self.offset_hz = hz;
                        Answer::Accepted
                    }
                    None => Answer::Rejected,
                };
            }
            RitOffsetStyle::Relative { up, down, digits } if up == mnemonic || down == mnemonic => {
                let step = if params.is_empty() {
                    Some(d.rit_step_hz)
                } else {
                    parse_digits(params, digits).and_then(|n| i32::try_from(n).ok())
                };
                return match step {
                    Some(step) => {
                        let step = if mnemonic == up { step } else { -step };
                        self.offset_hz = self.offset_hz.saturating_add(step);
                        Answer::Accepted
                    }
                    None => Answer::Rejected,
                };
            }
            _ => {}
        }
        if mnemonic == d.s_meter {
            if params != d.s_meter_selector {
                return Answer::Rejected;
            }
            let max = 10u64.pow(d.s_meter_digits as u32) - 1;
            let raw = u64::from(self.s_meter_raw).min(max);
            return Answer::Report(format!(
                "{}{}{:0width$};",
                mnemonic,
                params,
                raw,
                width = d.s_meter_digits
            ));
        }
        if mnemonic == d.identify && params.is_empty() {
            return Answer::Report(format!("{}{};", mnemonic, self.identity));
        }
        if mnemonic == "IF" && params.is_empty() {
            return Answer::Report(self.info_report(d));
        }
        Answer::Rejected
    }

    /// Slot addressed by index `index` of an indexed mnemonic
    fn indexed_slot(&self, index: usize) -> Slot {
        let second = index == 1;
        if self.topology.has_vfo_pair() {
            Slot::new(self.band, if second { Vfo::B } else { Vfo::A })
        } else {
            Slot::new(if second { Band::Sub } else { Band::Main }, Vfo::A)
        }
    }

    fn ascii_frequency(&mut self, d: &Dialect, mnemonic: &str, slot: Slot, params: &str) -> Answer {
        if params.is_empty() {
            return Answer::Report(format!(
                "{}{:0width$};",
                mnemonic,
                self.frequency(slot),
                width = d.frequency_digits
            ));
        }
        match parse_digits(params, d.frequency_digits) {
            Some(hz) => {
                self.set_frequency(slot, hz);
                Answer::Accepted
            }
            None => Answer::Rejected,
        }
    }

    fn ascii_mode(&mut self, d: &Dialect, params: &str) -> Answer {
        let (slot, index, code) = if d.mode_indexed {
            let index = match params.get(..1) {
                Some("0") => "0",
                Some("1") => "1",
                _ => return Answer::Rejected,
            };
            (self.indexed_slot(usize::from(index == "1")), index, &params[1..])
        } else {
            (self.active_slot(), "", params)
        };

        if code.is_empty() {
            return match d.mode_code(self.mode(slot)) {
                Some(code) => Answer::Report(format!("{}{}{};", d.mode, index, code)),
                None => Answer::Rejected,
            };
        }
        match d.mode_from_code(code) {
            Ok(mode) => {
                self.set_mode(slot, mode);
                Answer::Accepted
            }
            Err(_) => Answer::Rejected,
        }
    }

    fn ascii_ptt(&mut self, d: &Dialect, mnemonic: &str, params: &str) -> Answer {
        match (d.ptt, mnemonic, params) {
            // Kenwood TX takes an optional audio source digit
            (PttStyle::TxRx, "TX", _) => {
                self.ptt = true;
                Answer::Accepted
            }
            (PttStyle::TxRx, "RX", "") => {
                self.ptt = false;
                Answer::Accepted
            }
            (PttStyle::TxDigit, "TX", _) => flag_command(mnemonic, params, &mut self.ptt),
            _ => Answer::Rejected,
        }
    }

    fn ascii_power(&mut self, mnemonic: &str, params: &str) -> Answer {
        if params.is_empty() {
            return Answer::Report(format!(
                "{}{:0width$};",
                mnemonic,
                self.power_watts,
                width = POWER_DIGITS
            ));
        }
        match parse_digits(params, POWER_DIGITS).and_then(|w| u16::try_from(w).ok()) {
            Some(watts) if watts <= self.max_power_watts => {
                self.power_watts = watts;
                Answer::Accepted
            }
            _ => Answer::Rejected,
        }
    }

    /// Exchange (`true`) or equalize on the dialect's one axis
    fn ascii_pair(&mut self, exchange: bool) -> Answer {
        let bands = self.topology.has_sub_receiver();
        match (exchange, bands) {
            (true, true) => self.exchange_bands(),
            (true, false) => self.exchange_vfos(),
            (false, true) => self.equalize_bands(),
            (false, false) => self.equalize_vfos(),
        }
        Answer::Accepted
    }

    /// Build the `IF` reply from the dialect's layout
    ///
    /// Fields the layout does not name are reported as zeros.
    fn info_report(&self, d: &Dialect) -> String {
        let layout = d.info;
        let (freq_start, freq_len) = layout.frequency;
        let (offset_start, offset_len) = layout.offset;
        let mut len = (freq_start + freq_len)
            .max(offset_start + offset_len)
            .max(layout.rit + 1)
            .max(layout.xit + 1);
        if let Some(tx) = layout.tx {
            len = len.max(tx + 1);
        }

        let mut body = vec![b'0'; len];
        let hz = self.frequency(self.active_slot()) % 10u64.pow(freq_len as u32);
        let frequency = format!("{:0width$}", hz, width = freq_len);
        body[freq_start..freq_start + freq_len].copy_from_slice(frequency.as_bytes());
        let offset = signed_field(self.offset_hz, offset_len);
        body[offset_start..offset_start + offset_len].copy_from_slice(&offset.as_bytes()[..offset_len]);
        body[layout.rit] = flag_digit(self.rit_on);
        body[layout.xit] = flag_digit(self.xit_on);
        if let Some(tx) = layout.tx {
            body[tx] = flag_digit(self.ptt);
        }

        let body: String = body.into_iter().map(char::from).collect();
        format!("IF{};", body)
    }
}

fn accepted(ok: bool) -> Answer {
    if ok {
        Answer::Accepted
    } else {
        Answer::Rejected
    }
}

fn flag_digit(on: bool) -> u8 {
    if on {
        b'1'
    } else {
        b'0'
    }
}

fn flag_report(mnemonic: &str, on: bool) -> String {
    format!("{}{};", mnemonic, char::from(flag_digit(on)))
}

/// `Some(None)` for a query, `Some(Some(_))` for a valid set
fn flag_param(params: &str) -> Option<Option<bool>> {
    match params {
        "" => Some(None),
        "0" => Some(Some(false)),
        "1" => Some(Some(true)),
        _ => None,
    }
}

/// Query or set a one-digit flag
fn flag_command(mnemonic: &str, params: &str, flag: &mut bool) -> Answer {
    match flag_param(params) {
        Some(None) => Answer::Report(flag_report(mnemonic, *flag)),
        Some(Some(on)) => {
            *flag = on;
            Answer::Accepted
        }
        None => Answer::Rejected,
    }
}

/// Exactly `width` decimal digits
fn parse_digits(text: &str, width: usize) -> Option<u64> {
    if text.len() != width || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Sign followed by exactly `width` digits
fn parse_signed(text: &str, width: usize) -> Option<i32> {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'+') => (false, &text[1..]),
        Some(b'-') => (true, &text[1..]),
        _ => return None,
    };
    let magnitude = i32::try_from(parse_digits(digits, width)?).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Sign and digits filling `len` characters, clamped to what fits
fn signed_field(value: i32, len: usize) -> String {
    let digits = len.saturating_sub(1);
    let max = 10u64.pow(digits as u32) - 1;
    let magnitude = u64::from(value.unsigned_abs()).min(max);
    let sign = if value < 0 { '-' } else { '+' };
    format!("{}{:0width$}", sign, magnitude, width = digits)
}

#[cfg(test)]
mod tests {
    use cat_protocol::OperatingMode;

    use super::*;

    fn ask(radio: &mut VirtualRadio, command: &str) -> String {
        String::from_utf8(radio.receive(command.as_bytes())).unwrap()
    }

    #[test]
    fn test_kenwood_vfo_frequencies() {
        let mut radio = VirtualRadio::for_model("TS-590SG").unwrap();
        assert_eq!(ask(&mut radio, "FB00007074000;"), "");
        assert_eq!(ask(&mut radio, "FA;FB;"), "FA00014250000;FB00007074000;");
        assert_eq!(radio.frequency(Slot::MAIN_B), 7_074_000);
    }

    #[test]
    fn test_dual_receiver_indexes_bands() {
        let mut radio = VirtualRadio::for_model("TS-2000").unwrap();
        assert_eq!(ask(&mut radio, "FB00007100000;"), "");
        assert_eq!(radio.frequency(Slot::SUB_A), 7_100_000);
        assert_eq!(ask(&mut radio, "FR1;"), "?;");
        assert_eq!(ask(&mut radio, "CB1;CB;"), "CB1;");
        assert_eq!(radio.active_slot(), Slot::SUB_A);
    }

    #[test]
    fn test_kenwood_mode_follows_selection() {
        let mut radio = VirtualRadio::for_model("TS-590SG").unwrap();
        assert_eq!(ask(&mut radio, "FR1;MD3;"), "");
        assert_eq!(radio.mode(Slot::MAIN_B), OperatingMode::Cw);
        assert_eq!(radio.mode(Slot::MAIN_A), OperatingMode::Usb);
        assert_eq!(ask(&mut radio, "MD;"), "MD3;");
    }

    #[test]
    fn test_yaesu_indexed_mode() {
        let mut radio = VirtualRadio::for_model("FT-991A").unwrap();
        assert_eq!(ask(&mut radio, "MD1C;"), "");
        assert_eq!(radio.mode(Slot::MAIN_B), OperatingMode::DataU);
        assert_eq!(ask(&mut radio, "MD0;MD1;"), "MD02;MD1C;");
        assert_eq!(ask(&mut radio, "MD2;"), "?;");
        assert_eq!(ask(&mut radio, "FA;"), "FA014250000;");
    }

    #[test]
    fn test_busy_while_transmitting() {
        let mut radio = VirtualRadio::for_model("TS-590SG").unwrap();
        assert_eq!(ask(&mut radio, "TX;"), "");
        assert!(radio.ptt());
        assert_eq!(ask(&mut radio, "FA;"), "?;");
        assert_eq!(ask(&mut radio, "RX;FA;"), "FA00014250000;");
    }

    #[test]
    fn test_info_layouts() {
        let mut kenwood = VirtualRadio::for_model("TS-590SG").unwrap();
        kenwood.set_ptt(true);
        kenwood.busy_while_transmitting = false;
        assert_eq!(ask(&mut kenwood, "RT1;RD00120;"), "");
        assert_eq!(ask(&mut kenwood, "IF;"), "IF0001425000000000-01201000001;");

        let mut yaesu = VirtualRadio::for_model("FT-991A").unwrap();
        assert_eq!(ask(&mut yaesu, "XT1;RU0050;"), "");
        assert_eq!(ask(&mut yaesu, "IF;"), "IF000014250000+005001;");
    }

    #[test]
    fn test_elecraft_absolute_offset_and_exchange() {
        let mut radio = VirtualRadio::for_model("K3").unwrap();
        assert_eq!(ask(&mut radio, "RO-0125;RO;"), "RO-0125;");
        assert_eq!(radio.rit().offset_hz, -125);
        assert_eq!(ask(&mut radio, "RC;RO;"), "RO+0000;");

        radio.set_frequency(Slot::MAIN_B, 3_573_000);
        assert_eq!(ask(&mut radio, "SWT11;FA;"), "FA00003573000;");
        assert_eq!(ask(&mut radio, "SWT13;FB;"), "FB00003573000;");
    }

    #[test]
    fn test_s_meter_and_identity() {
        let mut radio = VirtualRadio::for_model("TS-590SG").unwrap();
        radio.set_s_meter_raw(15);
        assert_eq!(ask(&mut radio, "SM0;ID;"), "SM00015;ID023;");
        assert_eq!(ask(&mut radio, "SM1;"), "?;");
    }

    #[test]
    fn test_echo_precedes_reply() {
        let mut radio = VirtualRadio::from_config(crate::VirtualRadioConfig {
            echo: true,
            ..crate::VirtualRadioConfig::default()
        })
        .unwrap();
        assert_eq!(ask(&mut radio, "PC;"), "PC;PC100;");
        assert_eq!(ask(&mut radio, "PC050;"), "PC050;");
        assert_eq!(radio.power_watts(), 50);
    }

    #[test]
    fn test_unknown_command_rejected() {
        let mut radio = VirtualRadio::for_model("FT-991A").unwrap();
        assert_eq!(ask(&mut radio, "ZZ;"), "?;");
        assert_eq!(ask(&mut radio, "X;"), "?;");
    }
}
