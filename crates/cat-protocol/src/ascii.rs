//! ASCII command/response wire shape
//!
//! Kenwood, Elecraft and the newer Yaesu radios all speak the same shape of
//! protocol: a fixed alphabetic mnemonic, optional fixed-width decimal
//! parameters, and a `;` terminator.
//!
//! ```text
//! FA00014250000;   set (or report) VFO A to 14.250 MHz
//! FA;              query VFO A
//! ```
//!
//! Frequency fields are zero-padded decimal strings, not packed decimal.
//! What the mnemonics and codes mean per vendor lives in [`crate::dialect`].

use crate::error::ParseError;

/// Command and reply terminator
pub const TERMINATOR: u8 = b';';

/// One parameter of an ASCII command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param<'a> {
    /// Unsigned decimal, zero-padded to `width` digits
    Digits { value: u64, width: usize },
    /// Sign character followed by `width` zero-padded digits
    Signed { value: i64, width: usize },
    /// Literal text (vendor code characters, sub-selectors)
    Raw(&'a str),
}

impl Param<'_> {
    fn write_to(&self, out: &mut String) -> Result<(), ParseError> {
        match *self {
            Param::Digits { value, width } => {
                check_width(value, width)?;
                out.push_str(&format!("{:0width$}", value, width = width));
            }
            Param::Signed { value, width } => {
                let magnitude = value.unsigned_abs();
                check_width(magnitude, width)?;
                out.push(if value < 0 { '-' } else { '+' });
                out.push_str(&format!("{:0width$}", magnitude, width = width));
            }
            Param::Raw(text) => {
                if !text.is_ascii() || text.contains(';') {
                    return Err(ParseError::InvalidDigits(text.to_string()));
                }
                out.push_str(text);
            }
        }
        Ok(())
    }
}

fn check_width(value: u64, width: usize) -> Result<(), ParseError> {
    let fits = match u32::try_from(width) {
        Ok(w) if w > 0 && w < 20 => value < 10u64.pow(w),
        _ => false,
    };
    if fits {
        Ok(())
    } else {
        Err(ParseError::Overflow {
            value,
            width,
            unit: "digits",
        })
    }
}

/// Build a command: mnemonic, parameters, terminator
///
/// ```
/// use cat_protocol::ascii::{build_command, Param};
///
/// let cmd = build_command("FA", &[Param::Digits { value: 14_250_000, width: 11 }]).unwrap();
/// assert_eq!(cmd, b"FA00014250000;");
/// ```
pub fn build_command(mnemonic: &str, params: &[Param<'_>]) -> Result<Vec<u8>, ParseError> {
    let mut out = String::with_capacity(mnemonic.len() + 16);
    out.push_str(mnemonic);
    for param in params {
        param.write_to(&mut out)?;
    }
    out.push(TERMINATOR as char);
    Ok(out.into_bytes())
}

/// Build the query form `<mnemonic>;`
pub fn query(mnemonic: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(mnemonic.len() + 1);
    out.extend_from_slice(mnemonic.as_bytes());
    out.push(TERMINATOR);
    out
}

/// A reply whose mnemonic has been verified
///
/// All field accessors index into the body (the text between the mnemonic
/// and the terminator) and fail rather than slicing past its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiResponse {
    mnemonic: String,
    body: String,
}

impl AsciiResponse {
    /// The mnemonic the reply carried
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    /// Everything between mnemonic and terminator
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Fixed-width text field `[start, start + len)`
    pub fn field(&self, start: usize, len: usize) -> Result<&str, ParseError> {
        let end = start.saturating_add(len);
        self.body
            .get(start..end)
            .ok_or(ParseError::FieldOutOfBounds {
                start,
                end,
                len: self.body.len(),
            })
    }

    /// Text from `start` to the end of the body
    pub fn rest(&self, start: usize) -> Result<&str, ParseError> {
        self.body.get(start..).ok_or(ParseError::FieldOutOfBounds {
            start,
            end: start,
            len: self.body.len(),
        })
    }

    /// Unsigned decimal field
    pub fn digits(&self, start: usize, len: usize) -> Result<u64, ParseError> {
        parse_digits(self.field(start, len)?)
    }

    /// Signed decimal field: sign character followed by `len - 1` digits
    pub fn signed(&self, start: usize, len: usize) -> Result<i64, ParseError> {
        let text = self.field(start, len)?;
        let (negative, digits) = match text.as_bytes().first() {
            Some(b'+') | Some(b' ') => (false, &text[1..]),
            Some(b'-') => (true, &text[1..]),
            _ => (false, text),
        };
        let magnitude = parse_digits(digits)? as i64;
        Ok(if negative { -magnitude } else { magnitude })
    }

    /// Single-character on/off flag (`'1'` is on)
    pub fn flag(&self, pos: usize) -> Result<bool, ParseError> {
        match self.field(pos, 1)? {
            "0" => Ok(false),
            "1" | "2" => Ok(true),
            other => Err(ParseError::InvalidDigits(other.to_string())),
        }
    }
}

fn parse_digits(text: &str) -> Result<u64, ParseError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidDigits(text.to_string()));
    }
    text.parse::<u64>()
        .map_err(|_| ParseError::InvalidDigits(text.to_string()))
}

/// Parse one terminated reply, verifying its mnemonic
///
/// Leading whitespace and line noise before the mnemonic are not tolerated;
/// the session hands over exactly one `;`-terminated chunk.
pub fn parse_response(bytes: &[u8], expected: &str) -> Result<AsciiResponse, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::NotAscii)?;
    if !text.is_ascii() {
        return Err(ParseError::NotAscii);
    }
    let text = text.trim_end_matches(['\r', '\n']);
    let stripped = text
        .strip_suffix(TERMINATOR as char)
        .ok_or_else(|| ParseError::InvalidFrame(format!("missing terminator in {:?}", text)))?;

    match stripped.strip_prefix(expected) {
        Some(body) => Ok(AsciiResponse {
            mnemonic: expected.to_string(),
            body: body.to_string(),
        }),
        None => Err(ParseError::UnexpectedMnemonic {
            expected: expected.to_string(),
            actual: stripped.chars().take(expected.len().max(2)).collect(),
        }),
    }
}

/// Split a buffer into complete `;`-terminated replies, returning the
/// unterminated remainder
pub fn split_replies(buf: &[u8]) -> (Vec<&[u8]>, &[u8]) {
    let mut replies = Vec::new();
    let mut start = 0;
    for (i, &b) in buf.iter().enumerate() {
        if b == TERMINATOR {
            replies.push(&buf[start..=i]);
            start = i + 1;
        }
    }
    (replies, &buf[start..])
}
