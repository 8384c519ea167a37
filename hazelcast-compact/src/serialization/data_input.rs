//! Data input traits and implementations for compact serialization.

use crate::error::{HazelcastError, Result};
use crate::serialization::Endianness;
use bytes::Buf;
use std::io::Cursor;

/// Trait for reading primitive values at the cursor.
///
/// Multi-byte values follow the implementor's configured [`Endianness`].
pub trait DataInput {
    /// Reads a single byte (i8).
    fn read_byte(&mut self) -> Result<i8>;

    /// Reads a boolean from a single byte.
    fn read_bool(&mut self) -> Result<bool>;

    /// Reads a 16-bit signed integer.
    fn read_short(&mut self) -> Result<i16>;

    /// Reads a 32-bit signed integer.
    fn read_int(&mut self) -> Result<i32>;

    /// Reads a 64-bit signed integer.
    fn read_long(&mut self) -> Result<i64>;

    /// Reads a 32-bit floating point.
    fn read_float(&mut self) -> Result<f32>;

    /// Reads a 64-bit floating point.
    fn read_double(&mut self) -> Result<f64>;

    /// Reads the specified number of raw bytes.
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Reads a length-prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<String>;
}

/// A slice-backed implementation of `DataInput` with random access.
#[derive(Debug, Clone)]
pub struct ObjectDataInput<'a> {
    cursor: Cursor<&'a [u8]>,
    endianness: Endianness,
}

impl<'a> ObjectDataInput<'a> {
    /// Creates a new big-endian `ObjectDataInput` over the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_endianness(data, Endianness::Big)
    }

    /// Creates a new `ObjectDataInput` using the given byte order.
    pub fn with_endianness(data: &'a [u8], endianness: Endianness) -> Self {
        Self {
            cursor: Cursor::new(data),
            endianness,
        }
    }

    /// Returns the configured byte order.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Returns the whole underlying slice.
    pub fn data(&self) -> &'a [u8] {
        self.cursor.get_ref()
    }

    /// Returns the number of bytes remaining to be read.
    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// Returns the current position in the buffer.
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Moves the cursor to an absolute position.
    pub fn move_to(&mut self, position: usize) -> Result<()> {
        if position > self.data().len() {
            return Err(HazelcastError::serialization(format!(
                "cannot move to position {} in a buffer of {} bytes",
                position,
                self.data().len()
            )));
        }
        self.cursor.set_position(position as u64);
        Ok(())
    }

    /// Advances the cursor by `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure_remaining(n)?;
        self.cursor.advance(n);
        Ok(())
    }

    /// Reads one byte at an absolute position without moving the cursor.
    pub fn read_byte_at(&self, position: usize) -> Result<i8> {
        Ok(self.slice_at(position, 1)?[0] as i8)
    }

    /// Reads a 16-bit integer at an absolute position without moving the cursor.
    pub fn read_short_at(&self, position: usize) -> Result<i16> {
        let mut raw = [0u8; 2];
        raw.copy_from_slice(self.slice_at(position, 2)?);
        Ok(match self.endianness {
            Endianness::Big => i16::from_be_bytes(raw),
            Endianness::Little => i16::from_le_bytes(raw),
        })
    }

    /// Reads a 32-bit integer at an absolute position without moving the cursor.
    pub fn read_int_at(&self, position: usize) -> Result<i32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.slice_at(position, 4)?);
        Ok(match self.endianness {
            Endianness::Big => i32::from_be_bytes(raw),
            Endianness::Little => i32::from_le_bytes(raw),
        })
    }

    /// Reads a 64-bit integer at an absolute position without moving the cursor.
    pub fn read_long_at(&self, position: usize) -> Result<i64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.slice_at(position, 8)?);
        Ok(match self.endianness {
            Endianness::Big => i64::from_be_bytes(raw),
            Endianness::Little => i64::from_le_bytes(raw),
        })
    }

    /// Reads a 32-bit integer at the cursor in big-endian order regardless of
    /// the configured byte order.
    pub fn read_int_be(&mut self) -> Result<i32> {
        self.ensure_remaining(4)?;
        Ok(self.cursor.get_i32())
    }

    /// Reads an i32 length prefix followed by that many bytes.
    pub fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        let len = self.read_length()?;
        self.read_bytes(len)
    }

    /// Reads an i32 that must be a non-negative length.
    pub fn read_length(&mut self) -> Result<usize> {
        let len = self.read_int()?;
        usize::try_from(len).map_err(|_| {
            HazelcastError::serialization(format!("invalid negative length: {}", len))
        })
    }

    fn slice_at(&self, position: usize, n: usize) -> Result<&'a [u8]> {
        let data = self.data();
        position
            .checked_add(n)
            .and_then(|end| data.get(position..end))
            .ok_or_else(|| {
                HazelcastError::serialization(format!(
                    "insufficient data: need {} bytes at position {}, buffer has {}",
                    n,
                    position,
                    data.len()
                ))
            })
    }

    fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.cursor.remaining() < n {
            Err(HazelcastError::Serialization(format!(
                "insufficient data: need {} bytes, have {}",
                n,
                self.cursor.remaining()
            )))
        } else {
            Ok(())
        }
    }
}

impl DataInput for ObjectDataInput<'_> {
    fn read_byte(&mut self) -> Result<i8> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_i8())
    }

    fn read_bool(&mut self) -> Result<bool> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_u8() != 0)
    }

    fn read_short(&mut self) -> Result<i16> {
        self.ensure_remaining(2)?;
        Ok(match self.endianness {
            Endianness::Big => self.cursor.get_i16(),
            Endianness::Little => self.cursor.get_i16_le(),
        })
    }

    fn read_int(&mut self) -> Result<i32> {
        self.ensure_remaining(4)?;
        Ok(match self.endianness {
            Endianness::Big => self.cursor.get_i32(),
            Endianness::Little => self.cursor.get_i32_le(),
        })
    }

    fn read_long(&mut self) -> Result<i64> {
        self.ensure_remaining(8)?;
        Ok(match self.endianness {
            Endianness::Big => self.cursor.get_i64(),
            Endianness::Little => self.cursor.get_i64_le(),
        })
    }

    fn read_float(&mut self) -> Result<f32> {
        self.ensure_remaining(4)?;
        Ok(match self.endianness {
            Endianness::Big => self.cursor.get_f32(),
            Endianness::Little => self.cursor.get_f32_le(),
        })
    }

    fn read_double(&mut self) -> Result<f64> {
        self.ensure_remaining(8)?;
        Ok(match self.endianness {
            Endianness::Big => self.cursor.get_f64(),
            Endianness::Little => self.cursor.get_f64_le(),
        })
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure_remaining(len)?;
        let mut buf = vec![0u8; len];
        self.cursor.copy_to_slice(&mut buf);
        Ok(buf)
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_length()?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes)
            .map_err(|e| HazelcastError::Serialization(format!("invalid UTF-8 string: {}", e)))
    }
}
