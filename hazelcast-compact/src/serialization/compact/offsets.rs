//! Offset tables of compact objects and variable-size arrays.

use crate::error::{HazelcastError, Result};
use crate::serialization::{DataOutput, ObjectDataInput, ObjectDataOutput};

/// Offset stored for an absent value.
pub(crate) const NULL_OFFSET: i32 = -1;

const BYTE_OFFSET_RANGE: usize = u8::MAX as usize;
const SHORT_OFFSET_RANGE: usize = u16::MAX as usize;

/// Width of one offset table entry, chosen from the length of the region the
/// offsets point into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OffsetWidth {
    Byte,
    Short,
    Int,
}

impl OffsetWidth {
    pub(crate) fn for_data_length(data_length: usize) -> Self {
        if data_length < BYTE_OFFSET_RANGE {
            Self::Byte
        } else if data_length < SHORT_OFFSET_RANGE {
            Self::Short
        } else {
            Self::Int
        }
    }

    pub(crate) fn size(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Short => 2,
            Self::Int => 4,
        }
    }

    /// Appends one entry; [`NULL_OFFSET`] becomes the all-ones sentinel.
    pub(crate) fn write(self, out: &mut ObjectDataOutput, offset: i32) -> Result<()> {
        match self {
            Self::Byte => out.write_byte(offset as i8),
            Self::Short => out.write_short(offset as i16),
            Self::Int => out.write_int(offset),
        }
    }

    /// Reads the entry at `position`; `None` for the sentinel.
    pub(crate) fn read(self, input: &ObjectDataInput<'_>, position: usize) -> Result<Option<usize>> {
        let offset = match self {
            Self::Byte => match input.read_byte_at(position)? {
                -1 => return Ok(None),
                b => b as u8 as usize,
            },
            Self::Short => match input.read_short_at(position)? {
                -1 => return Ok(None),
                s => s as u16 as usize,
            },
            Self::Int => match input.read_int_at(position)? {
                NULL_OFFSET => return Ok(None),
                i if i < 0 => {
                    return Err(HazelcastError::serialization(format!(
                        "invalid offset {} at position {}",
                        i, position
                    )))
                }
                i => i as usize,
            },
        };
        Ok(Some(offset))
    }
}

/// Appends the offset table for a region of `data_length` bytes.
pub(crate) fn write_offsets(
    out: &mut ObjectDataOutput,
    data_length: usize,
    offsets: &[i32],
) -> Result<()> {
    let width = OffsetWidth::for_data_length(data_length);
    for &offset in offsets {
        width.write(out, offset)?;
    }
    Ok(())
}
