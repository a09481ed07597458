//! Sign-magnitude fixed-point fields.
//!
//! An `N`-byte field is read as one big-endian integer of `8 * N` bits. Bits
//! before `fraction_start_bit` (counted from the most significant bit) hold the
//! integer part, the rest hold the binary fraction. For signed fields bit 0 is
//! a sign flag over the remaining magnitude, not a two's-complement bit.

use crate::error::RangeError;

/// Fraction start bit of the 32-bit root delay and root dispersion fields.
pub const SHORT_FRACTION_START_BIT: u32 = 16;

fn field_bits(len: usize) -> u32 {
    8 * len as u32
}

fn sign_mask(total_bits: u32, signed: bool) -> u128 {
    if signed && total_bits > 0 {
        1 << (total_bits - 1)
    } else {
        0
    }
}

/// Decodes an `N`-byte fixed-point field (`N` at most 16).
pub fn decode<const N: usize>(bytes: &[u8; N], fraction_start_bit: u32, signed: bool) -> f64 {
    debug_assert!(N <= 16);
    let total_bits = field_bits(N);
    let raw = bytes
        .iter()
        .fold(0u128, |acc, &byte| (acc << 8) | u128::from(byte));

    let fraction_bits = total_bits.saturating_sub(fraction_start_bit);
    let sign = sign_mask(total_bits, signed);
    let magnitude = (raw & !sign) as f64 / 2f64.powi(fraction_bits as i32);
    if raw & sign != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Encodes `value` into an `N`-byte fixed-point field.
///
/// The fractional remainder is truncated toward zero. Values whose integer part
/// does not fit are rejected rather than masked.
pub fn encode<const N: usize>(
    value: f64,
    fraction_start_bit: u32,
    signed: bool,
) -> Result<[u8; N], RangeError> {
    let total_bits = field_bits(N);
    if total_bits > 128 || fraction_start_bit > total_bits || (signed && fraction_start_bit == 0) {
        return Err(RangeError::FractionStartBit {
            bit: fraction_start_bit,
            len: N,
        });
    }
    if !value.is_finite() {
        return Err(RangeError::NotFinite(value));
    }
    if !signed && value < 0.0 {
        return Err(RangeError::NegativeUnsigned(value));
    }

    let fraction_bits = total_bits - fraction_start_bit;
    let int_bits = fraction_start_bit - u32::from(signed);
    let magnitude = value.abs();
    if magnitude.trunc() >= 2f64.powi(int_bits as i32) {
        return Err(RangeError::IntegerOverflow { value, int_bits });
    }

    let mut raw = (magnitude * 2f64.powi(fraction_bits as i32)) as u128;
    if value < 0.0 {
        raw |= sign_mask(total_bits, signed);
    }

    let mut buf = [0; N];
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = (raw >> (8 * (N - 1 - i))) as u8;
    }
    Ok(buf)
}
