//! Value-typed bit sequences used as the wire-level representation.
//!
//! Bits are addressed in MSB-first order: bit 0 is the high bit of the first byte.
//! Every derivation (`slice`, `splice`, `resize`, ...) returns a new buffer, so
//! copies never observe each other's changes.

use std::fmt;

use crate::{descriptor::ByteOrder, errors::CodecError};

/// Widest field [`BitBuffer::to_number`] and [`BitBuffer::from_number`] accept.
pub const MAX_NUMBER_BITS: usize = 64;

/// An ordered sequence of bits with an exact length.
///
/// Bits past `len` in the last byte are kept at zero, so two buffers with the
/// same bits compare equal regardless of how they were built.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitBuffer {
    bytes: Vec<u8>,
    len: usize,
}

impl BitBuffer {
    /// Creates a zero-filled buffer of `len` bits.
    pub fn new(len: usize) -> Self {
        BitBuffer {
            bytes: vec![0; len.div_ceil(8)],
            len,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a buffer of `len` bits, all set to `bit`.
    pub fn filled(len: usize, bit: bool) -> Self {
        let mut buffer = Self::new(len);
        if bit {
            buffer.bytes.fill(0xFF);
            buffer.clear_tail();
        }

        buffer
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        BitBuffer {
            bytes: bytes.to_vec(),
            len: bytes.len() * 8,
        }
    }

    /// Length in bits.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Backing bytes; a trailing partial byte is zero-padded in its low bits.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Reads the bit at `index`.
    pub fn get(&self, index: usize) -> Result<bool, CodecError> {
        self.check_range(index, 1)?;
        Ok(self.bit(index))
    }

    /// Derives a buffer with the bit at `index` set to `bit`.
    pub fn with(&self, index: usize, bit: bool) -> Result<Self, CodecError> {
        self.check_range(index, 1)?;
        let mut derived = self.clone();
        derived.set_bit(index, bit);
        Ok(derived)
    }

    /// Copies `length` bits starting at `offset` into a new buffer.
    pub fn slice(&self, offset: usize, length: usize) -> Result<Self, CodecError> {
        self.check_range(offset, length)?;

        if offset % 8 == 0 {
            let start = offset / 8;
            let mut sliced = BitBuffer {
                bytes: self.bytes[start..start + length.div_ceil(8)].to_vec(),
                len: length,
            };
            sliced.clear_tail();
            return Ok(sliced);
        }

        let mut sliced = Self::new(length);
        for i in 0..length {
            if self.bit(offset + i) {
                sliced.set_bit(i, true);
            }
        }

        Ok(sliced)
    }

    /// Overwrites bits from `offset` with `other`, growing the result if
    /// `other` runs past the current end. Any gap is zero-filled.
    pub fn splice(&self, offset: usize, other: &BitBuffer) -> Self {
        let end = offset + other.len;
        let mut spliced = if end > self.len {
            self.resize(end)
        } else {
            self.clone()
        };

        for i in 0..other.len {
            spliced.set_bit(offset + i, other.bit(i));
        }

        spliced
    }

    /// Truncates or zero-pads at the tail to exactly `len` bits.
    pub fn resize(&self, len: usize) -> Self {
        let mut resized = self.clone();
        resized.bytes.resize(len.div_ceil(8), 0);
        resized.len = len;
        resized.clear_tail();
        resized
    }

    pub fn append(&self, other: &BitBuffer) -> Self {
        self.splice(self.len, other)
    }

    pub fn prepend(&self, other: &BitBuffer) -> Self {
        other.append(self)
    }

    /// Inserts `other` before bit `at`, shifting the remainder towards the tail.
    pub fn insert(&self, at: usize, other: &BitBuffer) -> Result<Self, CodecError> {
        self.check_range(at, 0)?;
        let head = self.slice(0, at)?;
        let tail = self.slice(at, self.len - at)?;
        Ok(head.append(other).append(&tail))
    }

    /// Removes the bits in `from..to`.
    pub fn remove(&self, from: usize, to: usize) -> Result<Self, CodecError> {
        let length = to.checked_sub(from).ok_or(CodecError::BitRange {
            offset: from,
            length: 0,
            len: self.len,
        })?;
        self.check_range(from, length)?;

        let head = self.slice(0, from)?;
        let tail = self.slice(to, self.len - to)?;
        Ok(head.append(&tail))
    }

    pub fn reverse(&self) -> Self {
        (0..self.len).rev().map(|i| self.bit(i)).collect()
    }

    pub fn invert(&self) -> Self {
        let mut inverted = BitBuffer {
            bytes: self.bytes.iter().map(|b| !b).collect(),
            len: self.len,
        };
        inverted.clear_tail();
        inverted
    }

    /// True if at least one bit is set.
    pub fn any(&self) -> bool {
        self.bytes.iter().any(|&b| b != 0)
    }

    pub fn count_ones(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.bit(i))
    }

    /// Writes the `width` low-order bits of `value` in the given byte order.
    ///
    /// Big-endian puts the most significant bit first. Little-endian splits
    /// the field into 8-bit groups from the least significant end and writes
    /// those groups first; a trailing partial group carries the top bits. For
    /// widths up to 8 both orders produce the same bits.
    pub fn from_number(value: u64, width: usize, order: ByteOrder) -> Result<Self, CodecError> {
        check_width(width)?;

        let mut buffer = Self::new(width);
        for pos in 0..width {
            if (value >> significance(pos, width, order)) & 1 == 1 {
                buffer.set_bit(pos, true);
            }
        }

        Ok(buffer)
    }

    /// Reads the first `width` bits as an unsigned value in the given byte order.
    pub fn to_number(&self, width: usize, order: ByteOrder) -> Result<u64, CodecError> {
        check_width(width)?;
        self.check_range(0, width)?;

        let mut value = 0u64;
        for pos in 0..width {
            if self.bit(pos) {
                value |= 1u64 << significance(pos, width, order);
            }
        }

        Ok(value)
    }

    fn check_range(&self, offset: usize, length: usize) -> Result<(), CodecError> {
        match offset.checked_add(length) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(CodecError::BitRange {
                offset,
                length,
                len: self.len,
            }),
        }
    }

    fn bit(&self, index: usize) -> bool {
        (self.bytes[index / 8] >> (7 - index % 8)) & 1 == 1
    }

    fn set_bit(&mut self, index: usize, bit: bool) {
        let mask = 0x80u8 >> (index % 8);
        if bit {
            self.bytes[index / 8] |= mask;
        } else {
            self.bytes[index / 8] &= !mask;
        }
    }

    fn clear_tail(&mut self) {
        let used = self.len % 8;
        if used != 0
            && let Some(last) = self.bytes.last_mut()
        {
            *last &= 0xFFu8 << (8 - used);
        }
    }
}

impl FromIterator<bool> for BitBuffer {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let bits: Vec<bool> = iter.into_iter().collect();
        let mut buffer = BitBuffer::new(bits.len());
        for (i, bit) in bits.into_iter().enumerate() {
            if bit {
                buffer.set_bit(i, true);
            }
        }

        buffer
    }
}

impl fmt::Display for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.bytes {
            write!(f, "{byte:02x}")?;
        }

        Ok(())
    }
}

impl fmt::Debug for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bits = String::with_capacity(self.len + self.len / 8);
        for (i, bit) in self.iter().enumerate() {
            if i > 0 && i % 8 == 0 {
                bits.push('_');
            }
            bits.push(if bit { '1' } else { '0' });
        }

        write!(f, "BitBuffer[{}; {}]", self.len, bits)
    }
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: usize) -> i64 {
    if bits == 0 {
        return 0;
    }
    if bits >= 64 {
        return value as i64;
    }

    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

fn check_width(width: usize) -> Result<(), CodecError> {
    if width > MAX_NUMBER_BITS {
        return Err(CodecError::WidthTooLarge {
            width,
            max: MAX_NUMBER_BITS,
        });
    }

    Ok(())
}

/// Significance (0 = least significant) of the value bit stored at `pos`.
fn significance(pos: usize, width: usize, order: ByteOrder) -> usize {
    match order {
        ByteOrder::BigEndian => width - 1 - pos,
        ByteOrder::LittleEndian => {
            let group = pos / 8;
            let group_len = (width - group * 8).min(8);
            group * 8 + (group_len - 1 - pos % 8)
        }
    }
}
