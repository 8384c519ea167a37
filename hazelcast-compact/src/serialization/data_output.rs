//! Data output traits and implementations for compact serialization.

use crate::error::{HazelcastError, Result};
use bytes::{BufMut, BytesMut};

/// Byte order used for multi-byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Endianness {
    /// Most significant byte first (the network default).
    #[default]
    Big,
    /// Least significant byte first.
    Little,
}

/// Trait for writing primitive values at the cursor.
///
/// Multi-byte values follow the implementor's configured [`Endianness`].
pub trait DataOutput {
    /// Writes a single byte (i8).
    fn write_byte(&mut self, v: i8) -> Result<()>;

    /// Writes a boolean as a single byte (0 for false, 1 for true).
    fn write_bool(&mut self, v: bool) -> Result<()>;

    /// Writes a 16-bit signed integer.
    fn write_short(&mut self, v: i16) -> Result<()>;

    /// Writes a 32-bit signed integer.
    fn write_int(&mut self, v: i32) -> Result<()>;

    /// Writes a 64-bit signed integer.
    fn write_long(&mut self, v: i64) -> Result<()>;

    /// Writes a 32-bit floating point.
    fn write_float(&mut self, v: f32) -> Result<()>;

    /// Writes a 64-bit floating point.
    fn write_double(&mut self, v: f64) -> Result<()>;

    /// Writes raw bytes without length prefix.
    fn write_bytes(&mut self, v: &[u8]) -> Result<()>;

    /// Writes a string as its UTF-8 byte length followed by the bytes.
    fn write_string(&mut self, v: &str) -> Result<()>;
}

/// A growable buffer implementing `DataOutput`, with absolute-position
/// writes for back-patching headers and offsets.
#[derive(Debug)]
pub struct ObjectDataOutput {
    buffer: BytesMut,
    endianness: Endianness,
}

impl ObjectDataOutput {
    /// Creates a new big-endian `ObjectDataOutput` with default capacity.
    pub fn new() -> Self {
        Self::with_endianness(Endianness::Big)
    }

    /// Creates a new `ObjectDataOutput` using the given byte order.
    pub fn with_endianness(endianness: Endianness) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            endianness,
        }
    }

    /// Creates a new big-endian `ObjectDataOutput` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            endianness: Endianness::Big,
        }
    }

    /// Returns the configured byte order.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Returns the written bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the output and returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    /// Returns the number of bytes written, which is also the cursor position.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the cursor position.
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clears the buffer, removing all written data.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Drops every byte written at or after `position`.
    pub fn truncate(&mut self, position: usize) {
        self.buffer.truncate(position);
    }

    /// Appends `n` zero bytes, reserving space to be patched later.
    pub fn write_zero_bytes(&mut self, n: usize) {
        self.buffer.put_bytes(0, n);
    }

    /// Writes an i32 length prefix followed by the bytes.
    pub fn write_byte_array(&mut self, v: &[u8]) -> Result<()> {
        self.write_int(checked_len(v.len())?)?;
        self.write_bytes(v)
    }

    /// Overwrites one byte at an absolute position.
    pub fn write_byte_at(&mut self, position: usize, v: i8) -> Result<()> {
        self.patch(position, &[v as u8])
    }

    /// Overwrites a 16-bit integer at an absolute position.
    pub fn write_short_at(&mut self, position: usize, v: i16) -> Result<()> {
        let bytes = match self.endianness {
            Endianness::Big => v.to_be_bytes(),
            Endianness::Little => v.to_le_bytes(),
        };
        self.patch(position, &bytes)
    }

    /// Overwrites a 32-bit integer at an absolute position.
    pub fn write_int_at(&mut self, position: usize, v: i32) -> Result<()> {
        let bytes = match self.endianness {
            Endianness::Big => v.to_be_bytes(),
            Endianness::Little => v.to_le_bytes(),
        };
        self.patch(position, &bytes)
    }

    /// Overwrites a 64-bit integer at an absolute position.
    pub fn write_long_at(&mut self, position: usize, v: i64) -> Result<()> {
        let bytes = match self.endianness {
            Endianness::Big => v.to_be_bytes(),
            Endianness::Little => v.to_le_bytes(),
        };
        self.patch(position, &bytes)
    }

    /// Overwrites a 32-bit integer at an absolute position in big-endian
    /// order regardless of the configured byte order.
    pub fn write_int_at_be(&mut self, position: usize, v: i32) -> Result<()> {
        self.patch(position, &v.to_be_bytes())
    }

    /// Sets or clears bit `bit` (0 = least significant) of the byte at
    /// `position`.
    pub fn write_bool_bit(&mut self, position: usize, bit: u8, v: bool) -> Result<()> {
        let len = self.buffer.len();
        let byte = self.buffer.get_mut(position).ok_or_else(|| {
            HazelcastError::serialization(format!(
                "bit write at position {} is past the end of {} written bytes",
                position, len
            ))
        })?;
        if v {
            *byte |= 1 << bit;
        } else {
            *byte &= !(1 << bit);
        }
        Ok(())
    }

    fn patch(&mut self, position: usize, bytes: &[u8]) -> Result<()> {
        let end = position + bytes.len();
        if end > self.buffer.len() {
            return Err(HazelcastError::serialization(format!(
                "positional write of {} bytes at {} is past the end of {} written bytes",
                bytes.len(),
                position,
                self.buffer.len()
            )));
        }
        self.buffer[position..end].copy_from_slice(bytes);
        Ok(())
    }
}

impl Default for ObjectDataOutput {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn checked_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| {
        HazelcastError::serialization(format!("length {} does not fit in an i32", len))
    })
}

impl DataOutput for ObjectDataOutput {
    fn write_byte(&mut self, v: i8) -> Result<()> {
        self.buffer.put_i8(v);
        Ok(())
    }

    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.buffer.put_u8(if v { 1 } else { 0 });
        Ok(())
    }

    fn write_short(&mut self, v: i16) -> Result<()> {
        match self.endianness {
            Endianness::Big => self.buffer.put_i16(v),
            Endianness::Little => self.buffer.put_i16_le(v),
        }
        Ok(())
    }

    fn write_int(&mut self, v: i32) -> Result<()> {
        match self.endianness {
            Endianness::Big => self.buffer.put_i32(v),
            Endianness::Little => self.buffer.put_i32_le(v),
        }
        Ok(())
    }

    fn write_long(&mut self, v: i64) -> Result<()> {
        match self.endianness {
            Endianness::Big => self.buffer.put_i64(v),
            Endianness::Little => self.buffer.put_i64_le(v),
        }
        Ok(())
    }

    fn write_float(&mut self, v: f32) -> Result<()> {
        match self.endianness {
            Endianness::Big => self.buffer.put_f32(v),
            Endianness::Little => self.buffer.put_f32_le(v),
        }
        Ok(())
    }

    fn write_double(&mut self, v: f64) -> Result<()> {
        match self.endianness {
            Endianness::Big => self.buffer.put_f64(v),
            Endianness::Little => self.buffer.put_f64_le(v),
        }
        Ok(())
    }

    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.buffer.put_slice(v);
        Ok(())
    }

    fn write_string(&mut self, v: &str) -> Result<()> {
        let bytes = v.as_bytes();
        self.write_int(checked_len(bytes.len())?)?;
        self.write_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_output_is_empty() {
        let output = ObjectDataOutput::new();
        assert!(output.is_empty());
        assert_eq!(output.len(), 0);
        assert_eq!(output.endianness(), Endianness::Big);
    }

    #[test]
    fn test_write_byte_negative() {
        let mut output = ObjectDataOutput::new();
        output.write_byte(-1).unwrap();
        assert_eq!(output.as_bytes(), &[0xFF]);
    }

    #[test]
    fn test_write_int_big_endian() {
        let mut output = ObjectDataOutput::new();
        output.write_int(0x01020304).unwrap();
        assert_eq!(output.as_bytes(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_write_int_little_endian() {
        let mut output = ObjectDataOutput::with_endianness(Endianness::Little);
        output.write_int(0x01020304).unwrap();
        assert_eq!(output.as_bytes(), &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_write_long_both_orders() {
        let mut big = ObjectDataOutput::new();
        big.write_long(0x0102030405060708).unwrap();
        assert_eq!(big.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);

        let mut little = ObjectDataOutput::with_endianness(Endianness::Little);
        little.write_long(0x0102030405060708).unwrap();
        assert_eq!(little.as_bytes(), &[8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_write_short_little_endian() {
        let mut output = ObjectDataOutput::with_endianness(Endianness::Little);
        output.write_short(0x0102).unwrap();
        assert_eq!(output.as_bytes(), &[0x02, 0x01]);
    }

    #[test]
    fn test_write_string_utf8_length() {
        let mut output = ObjectDataOutput::new();
        output.write_string("hé").unwrap();
        assert_eq!(output.as_bytes(), &[0, 0, 0, 3, b'h', 0xC3, 0xA9]);
    }

    #[test]
    fn test_write_empty_string() {
        let mut output = ObjectDataOutput::new();
        output.write_string("").unwrap();
        assert_eq!(output.as_bytes(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_write_zero_bytes_and_patch() {
        let mut output = ObjectDataOutput::new();
        output.write_zero_bytes(4);
        output.write_byte(9).unwrap();
        output.write_int_at(0, 258).unwrap();
        assert_eq!(output.as_bytes(), &[0, 0, 1, 2, 9]);
    }

    #[test]
    fn test_write_int_at_be_ignores_endianness() {
        let mut output = ObjectDataOutput::with_endianness(Endianness::Little);
        output.write_zero_bytes(4);
        output.write_int_at_be(0, -55).unwrap();
        assert_eq!(output.as_bytes(), &(-55i32).to_be_bytes());
    }

    #[test]
    fn test_positional_write_past_end_fails() {
        let mut output = ObjectDataOutput::new();
        output.write_zero_bytes(2);
        assert!(output.write_int_at(0, 1).is_err());
        assert!(output.write_short_at(1, 1).is_err());
        assert!(output.write_short_at(0, 1).is_ok());
    }

    #[test]
    fn test_write_bool_bit() {
        let mut output = ObjectDataOutput::new();
        output.write_zero_bytes(1);
        output.write_bool_bit(0, 0, true).unwrap();
        output.write_bool_bit(0, 3, true).unwrap();
        output.write_bool_bit(0, 7, true).unwrap();
        assert_eq!(output.as_bytes(), &[0b1000_1001]);
        output.write_bool_bit(0, 3, false).unwrap();
        assert_eq!(output.as_bytes(), &[0b1000_0001]);
        assert!(output.write_bool_bit(1, 0, true).is_err());
    }

    #[test]
    fn test_write_byte_array() {
        let mut output = ObjectDataOutput::new();
        output.write_byte_array(&[7, 8]).unwrap();
        assert_eq!(output.as_bytes(), &[0, 0, 0, 2, 7, 8]);
    }

    #[test]
    fn test_into_bytes_and_clear() {
        let mut output = ObjectDataOutput::new();
        output.write_int(42).unwrap();
        assert_eq!(output.position(), 4);
        let copy = output.as_bytes().to_vec();
        output.clear();
        assert!(output.is_empty());
        assert_eq!(copy, vec![0, 0, 0, 42]);
        assert!(ObjectDataOutput::default().into_bytes().is_empty());
    }
}
