//! Variable-length integer families used by the input channel wire format.
//!
//! Every family packs a small length discriminator into the top bits of the
//! first byte, optionally followed by a sign bit, and carries the remaining
//! value bits big-endian across the following bytes:
//!
//! ```text
//! two-byte unsigned   [c:1][val:7]          (+1 byte)    max 0x7FFF
//! two-byte signed     [c:1][s:1][val:6]     (+1 byte)    max ±0x3FFF
//! four-byte unsigned  [c:2][val:6]          (+0..3)      max 0x3FFF_FFFF
//! four-byte signed    [c:2][s:1][val:5]     (+0..3)      max ±0x1FFF_FFFF
//! eight-byte unsigned [c:3][val:5]          (+0..7)      max 0x1FFF_FFFF_FFFF_FFFF
//! ```
//!
//! `c` is the number of bytes that follow the first one.  Signed values are
//! sign + magnitude, not two's complement.
//!
//! Writers reject values that the family cannot represent before touching
//! the output buffer, so a failed write never leaves a partial encoding.

use crate::protocol::codec::ProtocolError;

/// Largest value a two-byte unsigned integer can carry.
pub const TWO_BYTE_UNSIGNED_MAX: u16 = 0x7FFF;
/// Largest magnitude a two-byte signed integer can carry.
pub const TWO_BYTE_SIGNED_MAX: i16 = 0x3FFF;
/// Largest value a four-byte unsigned integer can carry.
pub const FOUR_BYTE_UNSIGNED_MAX: u32 = 0x3FFF_FFFF;
/// Largest magnitude a four-byte signed integer can carry.
pub const FOUR_BYTE_SIGNED_MAX: i32 = 0x1FFF_FFFF;
/// Largest value an eight-byte unsigned integer can carry.
pub const EIGHT_BYTE_UNSIGNED_MAX: u64 = 0x1FFF_FFFF_FFFF_FFFF;

/// Bit layout of one integer family.
#[derive(Debug, Clone, Copy)]
struct Layout {
    name: &'static str,
    /// Width of the length discriminator in bits.
    len_bits: u32,
    signed: bool,
    max_len: usize,
}

impl Layout {
    /// Value bits that fit in the first byte after the discriminator and sign.
    const fn first_bits(self) -> u32 {
        8 - self.len_bits - if self.signed { 1 } else { 0 }
    }

    /// Largest magnitude representable in `len` bytes.
    const fn max_for_len(self, len: usize) -> u64 {
        (1u64 << (self.first_bits() + 8 * (len as u32 - 1))) - 1
    }
}

const TWO_BYTE_UNSIGNED: Layout = Layout {
    name: "TWO_BYTE_UNSIGNED_INTEGER",
    len_bits: 1,
    signed: false,
    max_len: 2,
};

const TWO_BYTE_SIGNED: Layout = Layout {
    name: "TWO_BYTE_SIGNED_INTEGER",
    len_bits: 1,
    signed: true,
    max_len: 2,
};

const FOUR_BYTE_UNSIGNED: Layout = Layout {
    name: "FOUR_BYTE_UNSIGNED_INTEGER",
    len_bits: 2,
    signed: false,
    max_len: 4,
};

const FOUR_BYTE_SIGNED: Layout = Layout {
    name: "FOUR_BYTE_SIGNED_INTEGER",
    len_bits: 2,
    signed: true,
    max_len: 4,
};

const EIGHT_BYTE_UNSIGNED: Layout = Layout {
    name: "EIGHT_BYTE_UNSIGNED_INTEGER",
    len_bits: 3,
    signed: false,
    max_len: 8,
};

// ── Reader ────────────────────────────────────────────────────────────────────

/// Forward-only cursor over a received payload.
///
/// Every read checks the remaining length first and reports
/// [`ProtocolError::InsufficientData`] instead of panicking.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::InsufficientData {
                needed: self.pos + n,
                available: self.buf.len(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, ProtocolError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_prefixed(&mut self, layout: Layout) -> Result<(bool, u64), ProtocolError> {
        let first = self.read_u8()?;
        let first_bits = layout.first_bits();
        let extra = usize::from(first >> (8 - layout.len_bits));
        let negative = layout.signed && first & (1 << first_bits) != 0;

        let mut magnitude = u64::from(first & low_mask(first_bits));
        for &byte in self.take(extra)? {
            magnitude = (magnitude << 8) | u64::from(byte);
        }
        Ok((negative, magnitude))
    }

    pub fn read_two_byte_unsigned(&mut self) -> Result<u16, ProtocolError> {
        let (_, value) = self.read_prefixed(TWO_BYTE_UNSIGNED)?;
        // At most 15 value bits can be decoded.
        Ok(value as u16)
    }

    pub fn read_two_byte_signed(&mut self) -> Result<i16, ProtocolError> {
        let (negative, magnitude) = self.read_prefixed(TWO_BYTE_SIGNED)?;
        let value = magnitude as i16;
        Ok(if negative { -value } else { value })
    }

    pub fn read_four_byte_unsigned(&mut self) -> Result<u32, ProtocolError> {
        let (_, value) = self.read_prefixed(FOUR_BYTE_UNSIGNED)?;
        Ok(value as u32)
    }

    pub fn read_four_byte_signed(&mut self) -> Result<i32, ProtocolError> {
        let (negative, magnitude) = self.read_prefixed(FOUR_BYTE_SIGNED)?;
        let value = magnitude as i32;
        Ok(if negative { -value } else { value })
    }

    pub fn read_eight_byte_unsigned(&mut self) -> Result<u64, ProtocolError> {
        let (_, value) = self.read_prefixed(EIGHT_BYTE_UNSIGNED)?;
        Ok(value)
    }
}

// ── Writers ───────────────────────────────────────────────────────────────────

fn low_mask(bits: u32) -> u8 {
    ((1u16 << bits) - 1) as u8
}

fn write_prefixed(
    buf: &mut Vec<u8>,
    layout: Layout,
    negative: bool,
    magnitude: u64,
    original: i128,
) -> Result<(), ProtocolError> {
    let len = (1..=layout.max_len)
        .find(|&len| magnitude <= layout.max_for_len(len))
        .ok_or(ProtocolError::ValueOutOfRange {
            family: layout.name,
            value: original,
        })?;

    let first_bits = layout.first_bits();
    let shift = 8 * (len as u32 - 1);
    let mut first = ((len - 1) as u8) << (8 - layout.len_bits);
    first |= (magnitude >> shift) as u8 & low_mask(first_bits);
    if negative {
        first |= 1 << first_bits;
    }

    buf.push(first);
    for i in (0..len - 1).rev() {
        buf.push((magnitude >> (8 * i)) as u8);
    }
    Ok(())
}

/// Writes a TWO_BYTE_UNSIGNED_INTEGER.
///
/// # Errors
///
/// [`ProtocolError::ValueOutOfRange`] if `value` exceeds [`TWO_BYTE_UNSIGNED_MAX`].
pub fn write_two_byte_unsigned(buf: &mut Vec<u8>, value: u16) -> Result<(), ProtocolError> {
    write_prefixed(buf, TWO_BYTE_UNSIGNED, false, u64::from(value), i128::from(value))
}

/// Writes a TWO_BYTE_SIGNED_INTEGER.
///
/// # Errors
///
/// [`ProtocolError::ValueOutOfRange`] if `|value|` exceeds [`TWO_BYTE_SIGNED_MAX`].
pub fn write_two_byte_signed(buf: &mut Vec<u8>, value: i16) -> Result<(), ProtocolError> {
    write_prefixed(
        buf,
        TWO_BYTE_SIGNED,
        value < 0,
        u64::from(value.unsigned_abs()),
        i128::from(value),
    )
}

/// Writes a FOUR_BYTE_UNSIGNED_INTEGER.
///
/// # Errors
///
/// [`ProtocolError::ValueOutOfRange`] if `value` exceeds [`FOUR_BYTE_UNSIGNED_MAX`].
pub fn write_four_byte_unsigned(buf: &mut Vec<u8>, value: u32) -> Result<(), ProtocolError> {
    write_prefixed(buf, FOUR_BYTE_UNSIGNED, false, u64::from(value), i128::from(value))
}

/// Writes a FOUR_BYTE_SIGNED_INTEGER.
///
/// # Errors
///
/// [`ProtocolError::ValueOutOfRange`] if `|value|` exceeds [`FOUR_BYTE_SIGNED_MAX`].
pub fn write_four_byte_signed(buf: &mut Vec<u8>, value: i32) -> Result<(), ProtocolError> {
    write_prefixed(
        buf,
        FOUR_BYTE_SIGNED,
        value < 0,
        u64::from(value.unsigned_abs()),
        i128::from(value),
    )
}

/// Writes an EIGHT_BYTE_UNSIGNED_INTEGER.
///
/// # Errors
///
/// [`ProtocolError::ValueOutOfRange`] if `value` exceeds [`EIGHT_BYTE_UNSIGNED_MAX`].
pub fn write_eight_byte_unsigned(buf: &mut Vec<u8>, value: u64) -> Result<(), ProtocolError> {
    write_prefixed(buf, EIGHT_BYTE_UNSIGNED, false, value, i128::from(value))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
