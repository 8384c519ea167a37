//! Encodings of decimal, temporal and bit-packed boolean values.

use crate::error::{HazelcastError, Result};
use crate::serialization::data_output::checked_len;
use crate::serialization::{DataInput, DataOutput, ObjectDataInput, ObjectDataOutput};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use rust_decimal::Decimal;

/// Minimal big-endian two's-complement bytes of `v`, at least one byte.
fn twos_complement_bytes(v: i128) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn from_twos_complement(bytes: &[u8]) -> Result<i128> {
    if bytes.is_empty() || bytes.len() > 16 {
        return Err(HazelcastError::serialization(format!(
            "decimal unscaled value of {} bytes is out of range",
            bytes.len()
        )));
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut raw = [fill; 16];
    raw[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(raw))
}

/// Unscaled value as a length-prefixed two's-complement byte array, then the scale.
pub(crate) fn write_decimal(out: &mut ObjectDataOutput, v: &Decimal) -> Result<()> {
    out.write_byte_array(&twos_complement_bytes(v.mantissa()))?;
    out.write_int(v.scale() as i32)
}

pub(crate) fn read_decimal(input: &mut ObjectDataInput<'_>) -> Result<Decimal> {
    let unscaled = from_twos_complement(&input.read_byte_array()?)?;
    let scale = input.read_int()?;
    let (mantissa, scale) = if scale < 0 {
        let factor = 10i128
            .checked_pow(scale.unsigned_abs())
            .and_then(|f| unscaled.checked_mul(f));
        match factor {
            Some(m) => (m, 0),
            None => {
                return Err(HazelcastError::serialization(format!(
                    "decimal with scale {} does not fit",
                    scale
                )))
            }
        }
    } else {
        (unscaled, scale as u32)
    };
    Decimal::try_from_i128_with_scale(mantissa, scale).map_err(|e| {
        HazelcastError::serialization(format!("decimal out of range: {}", e))
    })
}

pub(crate) fn write_time(out: &mut ObjectDataOutput, v: &NaiveTime) -> Result<()> {
    out.write_byte(v.hour() as i8)?;
    out.write_byte(v.minute() as i8)?;
    out.write_byte(v.second() as i8)?;
    out.write_int(v.nanosecond() as i32)
}

pub(crate) fn read_time(input: &mut ObjectDataInput<'_>) -> Result<NaiveTime> {
    let hour = input.read_byte()?;
    let minute = input.read_byte()?;
    let second = input.read_byte()?;
    let nano = input.read_int()?;
    NaiveTime::from_hms_nano_opt(hour as u32, minute as u32, second as u32, nano as u32)
        .ok_or_else(|| {
            HazelcastError::serialization(format!(
                "invalid time {}:{}:{}.{}",
                hour, minute, second, nano
            ))
        })
}

pub(crate) fn write_date(out: &mut ObjectDataOutput, v: &NaiveDate) -> Result<()> {
    out.write_int(v.year())?;
    out.write_byte(v.month() as i8)?;
    out.write_byte(v.day() as i8)
}

pub(crate) fn read_date(input: &mut ObjectDataInput<'_>) -> Result<NaiveDate> {
    let year = input.read_int()?;
    let month = input.read_byte()?;
    let day = input.read_byte()?;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).ok_or_else(|| {
        HazelcastError::serialization(format!("invalid date {}-{}-{}", year, month, day))
    })
}

pub(crate) fn write_timestamp(out: &mut ObjectDataOutput, v: &NaiveDateTime) -> Result<()> {
    write_date(out, &v.date())?;
    write_time(out, &v.time())
}

pub(crate) fn read_timestamp(input: &mut ObjectDataInput<'_>) -> Result<NaiveDateTime> {
    let date = read_date(input)?;
    let time = read_time(input)?;
    Ok(date.and_time(time))
}

pub(crate) fn write_timestamp_with_timezone(
    out: &mut ObjectDataOutput,
    v: &DateTime<FixedOffset>,
) -> Result<()> {
    write_timestamp(out, &v.naive_local())?;
    out.write_int(v.offset().local_minus_utc())
}

pub(crate) fn read_timestamp_with_timezone(
    input: &mut ObjectDataInput<'_>,
) -> Result<DateTime<FixedOffset>> {
    let local = read_timestamp(input)?;
    let seconds = input.read_int()?;
    let offset = FixedOffset::east_opt(seconds).ok_or_else(|| {
        HazelcastError::serialization(format!("invalid zone offset of {} seconds", seconds))
    })?;
    offset.from_local_datetime(&local).single().ok_or_else(|| {
        HazelcastError::serialization(format!("invalid local time {} at offset {}", local, offset))
    })
}

/// Count, then the values packed eight per byte, least significant bit first.
pub(crate) fn write_boolean_bits(out: &mut ObjectDataOutput, values: &[bool]) -> Result<()> {
    out.write_int(checked_len(values.len())?)?;
    for chunk in values.chunks(8) {
        let byte = chunk
            .iter()
            .enumerate()
            .fold(0u8, |acc, (bit, &v)| if v { acc | (1 << bit) } else { acc });
        out.write_byte(byte as i8)?;
    }
    Ok(())
}

pub(crate) fn read_boolean_bits(input: &mut ObjectDataInput<'_>) -> Result<Vec<bool>> {
    let len = input.read_length()?;
    let bytes = input.read_bytes(len.div_ceil(8))?;
    Ok((0..len).map(|i| bytes[i / 8] & (1 << (i % 8)) != 0).collect())
}

/// Reads an element count and checks that `element_size`-byte elements fit
/// in the remaining input.
pub(crate) fn read_count(input: &mut ObjectDataInput<'_>, element_size: usize) -> Result<usize> {
    let count = input.read_length()?;
    match count.checked_mul(element_size) {
        Some(total) if total <= input.remaining() => Ok(count),
        _ => Err(HazelcastError::serialization(format!(
            "array of {} elements exceeds the {} remaining bytes",
            count,
            input.remaining()
        ))),
    }
}
