//! Packed-decimal (BCD) numeric fields
//!
//! Each byte holds two decimal digits, one per nibble. CI-V frequency and
//! offset fields are little-endian (least-significant digit pair first);
//! level and meter fields are big-endian. Both orders are fixed width: the
//! width in bytes is part of each opcode's layout.
//!
//! ```
//! use cat_protocol::bcd::{decode_decimal, encode_decimal};
//!
//! // 14.250.000 Hz as a five-byte CI-V frequency field
//! let bytes = encode_decimal(14_250_000, 5).unwrap();
//! assert_eq!(bytes, vec![0x00, 0x00, 0x25, 0x14, 0x00]);
//! assert_eq!(decode_decimal(&bytes).unwrap(), 14_250_000);
//! ```

use crate::error::ParseError;

/// Largest field width accepted, in bytes (18 digits always fit a `u64`)
pub const MAX_WIDTH: usize = 9;

/// Largest value representable in `width` packed-decimal bytes
pub fn max_value(width: usize) -> u64 {
    let digits = (width.min(MAX_WIDTH) * 2) as u32;
    10u64.pow(digits) - 1
}

/// Encode `value` into `width` bytes, least-significant digit pair first
pub fn encode_decimal(value: u64, width: usize) -> Result<Vec<u8>, ParseError> {
    check_fits(value, width)?;

    let mut out = Vec::with_capacity(width);
    let mut remaining = value;
    for _ in 0..width {
        let low = (remaining % 10) as u8;
        remaining /= 10;
        let high = (remaining % 10) as u8;
        remaining /= 10;
        out.push((high << 4) | low);
    }
    Ok(out)
}

/// Decode a least-significant-first packed-decimal field
pub fn decode_decimal(bytes: &[u8]) -> Result<u64, ParseError> {
    let mut value: u64 = 0;
    for (offset, &byte) in bytes.iter().enumerate().rev() {
        let (high, low) = split_byte(byte, offset)?;
        value = push_digit(value, high, bytes.len())?;
        value = push_digit(value, low, bytes.len())?;
    }
    Ok(value)
}

/// Encode `value` into `width` bytes, most-significant digit pair first
pub fn encode_decimal_be(value: u64, width: usize) -> Result<Vec<u8>, ParseError> {
    let mut out = encode_decimal(value, width)?;
    out.reverse();
    Ok(out)
}

/// Decode a most-significant-first packed-decimal field
pub fn decode_decimal_be(bytes: &[u8]) -> Result<u64, ParseError> {
    let mut value: u64 = 0;
    for (offset, &byte) in bytes.iter().enumerate() {
        let (high, low) = split_byte(byte, offset)?;
        value = push_digit(value, high, bytes.len())?;
        value = push_digit(value, low, bytes.len())?;
    }
    Ok(value)
}

fn check_fits(value: u64, width: usize) -> Result<(), ParseError> {
    if width == 0 || width > MAX_WIDTH || value > max_value(width) {
        return Err(ParseError::Overflow {
            value,
            width,
            unit: "BCD bytes",
        });
    }
    Ok(())
}

fn split_byte(byte: u8, offset: usize) -> Result<(u64, u64), ParseError> {
    let high = byte >> 4;
    let low = byte & 0x0F;
    if high > 9 || low > 9 {
        return Err(ParseError::InvalidBcd { byte, offset });
    }
    Ok((u64::from(high), u64::from(low)))
}

fn push_digit(acc: u64, digit: u64, width: usize) -> Result<u64, ParseError> {
    acc.checked_mul(10)
        .and_then(|v| v.checked_add(digit))
        .ok_or(ParseError::Overflow {
            value: acc,
            width,
            unit: "BCD bytes",
        })
}
