//! Vendor dialects of the ASCII wire shape
//!
//! The same two-letter mnemonics carry different code tables and field
//! layouts across vendors (`MD2` is USB on a Kenwood, `MD02` is USB on a
//! Yaesu). A [`Dialect`] captures everything vendor-specific so one engine
//! can drive all three families.

use crate::error::ParseError;
use crate::types::OperatingMode;

/// How a dialect changes the RIT/XIT offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RitOffsetStyle {
    /// A signed absolute offset can be written directly
    Absolute {
        /// Mnemonic taking a signed offset, e.g. `RO`
        mnemonic: &'static str,
        /// Digits after the sign
        digits: usize,
    },
    /// Only clear and relative up/down steps exist
    Relative {
        /// Step up by N Hz
        up: &'static str,
        /// Step down by N Hz
        down: &'static str,
        /// Digits of the step parameter
        digits: usize,
    },
}

/// How PTT is keyed and read back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PttStyle {
    /// `TX;` keys, `RX;` unkeys, state read from the `IF` reply
    TxRx,
    /// `TX1;`/`TX0;` sets, `TX;` reads back a digit
    TxDigit,
}

/// Field positions in the body of an `IF` (information) reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoLayout {
    /// Frequency digits `(start, len)`
    pub frequency: (usize, usize),
    /// Signed RIT/XIT offset `(start, len)` including the sign
    pub offset: (usize, usize),
    /// RIT on/off flag position
    pub rit: usize,
    /// XIT on/off flag position
    pub xit: usize,
    /// TX/RX flag position, when the reply carries one
    pub tx: Option<usize>,
}

/// Decoded fields of an `IF` reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoReport {
    /// Frequency of the current VFO in Hz
    pub frequency_hz: u64,
    /// Shared RIT/XIT offset in Hz
    pub offset_hz: i32,
    /// RIT enabled
    pub rit_on: bool,
    /// XIT enabled
    pub xit_on: bool,
    /// Transmitting, if reported
    pub tx: Option<bool>,
}

impl InfoLayout {
    /// Decode an `IF` body with this layout
    pub fn decode(&self, reply: &crate::ascii::AsciiResponse) -> Result<InfoReport, ParseError> {
        let (fs, fl) = self.frequency;
        let (os, ol) = self.offset;
        let tx = match self.tx {
            Some(pos) => Some(reply.flag(pos)?),
            None => None,
        };
        Ok(InfoReport {
            frequency_hz: reply.digits(fs, fl)?,
            offset_hz: reply.signed(os, ol)? as i32,
            rit_on: reply.flag(self.rit)?,
            xit_on: reply.flag(self.xit)?,
            tx,
        })
    }
}

/// Everything vendor-specific about an ASCII radio family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Family name for logs and errors
    pub name: &'static str,
    /// Frequency mnemonics indexed by VFO (or receiver, on dual-receiver radios)
    pub frequency: [&'static str; 2],
    /// Digits of the frequency field
    pub frequency_digits: usize,
    /// Mode mnemonic
    pub mode: &'static str,
    /// The mode command carries a VFO/receiver index digit before the code
    pub mode_indexed: bool,
    /// Vendor mode code table
    pub mode_codes: &'static [(&'static str, OperatingMode)],
    /// VFO select mnemonic (one digit: 0 = A, 1 = B)
    pub vfo_select: Option<&'static str>,
    /// Receiver select mnemonic (one digit: 0 = main, 1 = sub)
    ///
    /// Equal to `vfo_select` when one command selects whichever pair the
    /// model has; such a dialect cannot drive a radio with both.
    pub band_select: Option<&'static str>,
    /// Complete exchange command
    pub exchange: Option<&'static str>,
    /// Complete equalize (copy A to B, or main to sub) command
    pub equalize: Option<&'static str>,
    /// Split mnemonic (one digit)
    pub split: &'static str,
    /// PTT keying style
    pub ptt: PttStyle,
    /// Power mnemonic (three digits, watts)
    pub power: &'static str,
    /// RIT on/off mnemonic
    pub rit: &'static str,
    /// XIT on/off mnemonic
    pub xit: &'static str,
    /// Offset clear mnemonic
    pub rit_clear: &'static str,
    /// How the offset is changed
    pub rit_offset: RitOffsetStyle,
    /// Offset granularity in Hz
    pub rit_step_hz: i32,
    /// S-meter mnemonic
    pub s_meter: &'static str,
    /// Selector sent with the S-meter query, echoed in the reply
    pub s_meter_selector: &'static str,
    /// Digits of the S-meter value
    pub s_meter_digits: usize,
    /// Identification mnemonic
    pub identify: &'static str,
    /// `IF` reply layout
    pub info: InfoLayout,
    /// Replies meaning the command was rejected
    pub error_tokens: &'static [&'static str],
}

impl Dialect {
    /// Vendor code for a mode
    pub fn mode_code(&self, mode: OperatingMode) -> Option<&'static str> {
        self.mode_codes
            .iter()
            .find(|(_, m)| *m == mode)
            .map(|(code, _)| *code)
    }

    /// Mode for a vendor code
    pub fn mode_from_code(&self, code: &str) -> Result<OperatingMode, ParseError> {
        self.mode_codes
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, m)| *m)
            .ok_or_else(|| ParseError::InvalidMode(format!("{} mode code {:?}", self.name, code)))
    }

    /// Modes this dialect can express
    pub fn modes(&self) -> impl Iterator<Item = OperatingMode> + '_ {
        self.mode_codes.iter().map(|(_, m)| *m)
    }

    /// Returns true if `reply` is one of the dialect's rejection tokens
    pub fn is_error_token(&self, reply: &[u8]) -> bool {
        self.error_tokens.iter().any(|t| t.as_bytes() == reply)
    }

    /// Largest frequency the frequency field can carry
    pub fn max_frequency_hz(&self) -> u64 {
        10u64.pow(self.frequency_digits as u32) - 1
    }
}

/// Kenwood (TS-590/TS-890/TS-2000 family)
pub const KENWOOD: Dialect = Dialect {
    name: "Kenwood",
    frequency: ["FA", "FB"],
    frequency_digits: 11,
    mode: "MD",
    mode_indexed: false,
    mode_codes: &[
        ("1", OperatingMode::Lsb),
        ("2", OperatingMode::Usb),
        ("3", OperatingMode::Cw),
        ("4", OperatingMode::Fm),
        ("5", OperatingMode::Am),
        ("6", OperatingMode::Rtty),
        ("7", OperatingMode::CwR),
        ("8", OperatingMode::DataL),
        ("9", OperatingMode::RttyR),
        ("10", OperatingMode::DataU),
    ],
    vfo_select: Some("FR"),
    band_select: Some("CB"),
    exchange: None,
    equalize: Some("VV;"),
    split: "FT",
    ptt: PttStyle::TxRx,
    power: "PC",
    rit: "RT",
    xit: "XT",
    rit_clear: "RC",
    rit_offset: RitOffsetStyle::Relative {
        up: "RU",
        down: "RD",
        digits: 5,
    },
    rit_step_hz: 10,
    s_meter: "SM",
    s_meter_selector: "0",
    s_meter_digits: 4,
    identify: "ID",
    // IFaaaaaaaaaaabbbbbrrrrrtxmmnnt?mvsfp;
    info: InfoLayout {
        frequency: (0, 11),
        offset: (16, 5),
        rit: 21,
        xit: 22,
        tx: Some(27),
    },
    error_tokens: &["?;", "E;", "O;"],
};

/// Elecraft (K3/K4/KX family), Kenwood-compatible with extensions
pub const ELECRAFT: Dialect = Dialect {
    name: "Elecraft",
    frequency: ["FA", "FB"],
    frequency_digits: 11,
    mode: "MD",
    mode_indexed: false,
    mode_codes: &[
        ("1", OperatingMode::Lsb),
        ("2", OperatingMode::Usb),
        ("3", OperatingMode::Cw),
        ("4", OperatingMode::Fm),
        ("5", OperatingMode::Am),
        ("6", OperatingMode::DataU),
        ("7", OperatingMode::CwR),
        ("9", OperatingMode::DataL),
    ],
    vfo_select: Some("FR"),
    band_select: None,
    exchange: Some("SWT11;"),
    equalize: Some("SWT13;"),
    split: "FT",
    ptt: PttStyle::TxRx,
    power: "PC",
    rit: "RT",
    xit: "XT",
    rit_clear: "RC",
    rit_offset: RitOffsetStyle::Absolute {
        mnemonic: "RO",
        digits: 4,
    },
    rit_step_hz: 1,
    s_meter: "SM",
    s_meter_selector: "",
    s_meter_digits: 4,
    identify: "ID",
    info: InfoLayout {
        frequency: (0, 11),
        offset: (16, 5),
        rit: 21,
        xit: 22,
        tx: Some(27),
    },
    error_tokens: &["?;"],
};

/// Yaesu ASCII (FT-991/FTDX family)
pub const YAESU: Dialect = Dialect {
    name: "Yaesu",
    frequency: ["FA", "FB"],
    frequency_digits: 9,
    mode: "MD",
    mode_indexed: true,
    mode_codes: &[
        ("1", OperatingMode::Lsb),
        ("2", OperatingMode::Usb),
        ("3", OperatingMode::Cw),
        ("4", OperatingMode::Fm),
        ("5", OperatingMode::Am),
        ("6", OperatingMode::Rtty),
        ("7", OperatingMode::CwR),
        ("8", OperatingMode::DataL),
        ("9", OperatingMode::RttyR),
        ("A", OperatingMode::DataFm),
        ("B", OperatingMode::FmN),
        ("C", OperatingMode::DataU),
    ],
    vfo_select: Some("VS"),
    band_select: Some("VS"),
    exchange: Some("SV;"),
    equalize: Some("AB;"),
    split: "ST",
    ptt: PttStyle::TxDigit,
    power: "PC",
    rit: "RT",
    xit: "XT",
    rit_clear: "RC",
    rit_offset: RitOffsetStyle::Relative {
        up: "RU",
        down: "RD",
        digits: 4,
    },
    rit_step_hz: 10,
    s_meter: "SM",
    s_meter_selector: "0",
    s_meter_digits: 3,
    identify: "ID",
    // IFmmmfffffffff+rrrrxtme...;
    info: InfoLayout {
        frequency: (3, 9),
        offset: (12, 5),
        rit: 17,
        xit: 18,
        tx: None,
    },
    error_tokens: &["?;"],
};
