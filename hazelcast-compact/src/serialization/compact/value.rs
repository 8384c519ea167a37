//! Owned and borrowed field values.

use crate::error::{HazelcastError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::any::Any;

use super::field_kind::FieldKind;
use super::generic_record::GenericRecord;
use super::writer::CompactWriter;

macro_rules! kind_of {
    ($value:expr; $($variant:ident),+ $(,)?) => {
        match $value {
            $(Self::$variant(_) => FieldKind::$variant,)+
        }
    };
}

macro_rules! all_variants {
    ($callback:ident!($($args:tt)*)) => {
        $callback!($($args)*;
            Boolean, ArrayOfBoolean, Int8, ArrayOfInt8, Int16, ArrayOfInt16,
            Int32, ArrayOfInt32, Int64, ArrayOfInt64, Float32, ArrayOfFloat32,
            Float64, ArrayOfFloat64, String, ArrayOfString, Decimal, ArrayOfDecimal,
            Time, ArrayOfTime, Date, ArrayOfDate, Timestamp, ArrayOfTimestamp,
            TimestampWithTimezone, ArrayOfTimestampWithTimezone, Compact, ArrayOfCompact,
            NullableBoolean, ArrayOfNullableBoolean, NullableInt8, ArrayOfNullableInt8,
            NullableInt16, ArrayOfNullableInt16, NullableInt32, ArrayOfNullableInt32,
            NullableInt64, ArrayOfNullableInt64, NullableFloat32, ArrayOfNullableFloat32,
            NullableFloat64, ArrayOfNullableFloat64,
        )
    };
}

/// A decoded field value, one variant per [`FieldKind`].
///
/// `None` stands for an absent value of a variable-size kind. Nested compact
/// values are held as [`GenericRecord`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Value of a `Boolean` field.
    Boolean(bool),
    /// Value of a `ArrayOfBoolean` field.
    ArrayOfBoolean(Option<Vec<bool>>),
    /// Value of a `Int8` field.
    Int8(i8),
    /// Value of a `ArrayOfInt8` field.
    ArrayOfInt8(Option<Vec<i8>>),
    /// Value of a `Int16` field.
    Int16(i16),
    /// Value of a `ArrayOfInt16` field.
    ArrayOfInt16(Option<Vec<i16>>),
    /// Value of a `Int32` field.
    Int32(i32),
    /// Value of a `ArrayOfInt32` field.
    ArrayOfInt32(Option<Vec<i32>>),
    /// Value of a `Int64` field.
    Int64(i64),
    /// Value of a `ArrayOfInt64` field.
    ArrayOfInt64(Option<Vec<i64>>),
    /// Value of a `Float32` field.
    Float32(f32),
    /// Value of a `ArrayOfFloat32` field.
    ArrayOfFloat32(Option<Vec<f32>>),
    /// Value of a `Float64` field.
    Float64(f64),
    /// Value of a `ArrayOfFloat64` field.
    ArrayOfFloat64(Option<Vec<f64>>),
    /// Value of a `String` field.
    String(Option<String>),
    /// Value of a `ArrayOfString` field.
    ArrayOfString(Option<Vec<Option<String>>>),
    /// Value of a `Decimal` field.
    Decimal(Option<Decimal>),
    /// Value of a `ArrayOfDecimal` field.
    ArrayOfDecimal(Option<Vec<Option<Decimal>>>),
    /// Value of a `Time` field.
    Time(Option<NaiveTime>),
    /// Value of a `ArrayOfTime` field.
    ArrayOfTime(Option<Vec<Option<NaiveTime>>>),
    /// Value of a `Date` field.
    Date(Option<NaiveDate>),
    /// Value of a `ArrayOfDate` field.
    ArrayOfDate(Option<Vec<Option<NaiveDate>>>),
    /// Value of a `Timestamp` field.
    Timestamp(Option<NaiveDateTime>),
    /// Value of a `ArrayOfTimestamp` field.
    ArrayOfTimestamp(Option<Vec<Option<NaiveDateTime>>>),
    /// Value of a `TimestampWithTimezone` field.
    TimestampWithTimezone(Option<DateTime<FixedOffset>>),
    /// Value of a `ArrayOfTimestampWithTimezone` field.
    ArrayOfTimestampWithTimezone(Option<Vec<Option<DateTime<FixedOffset>>>>),
    /// Value of a `Compact` field.
    Compact(Option<GenericRecord>),
    /// Value of a `ArrayOfCompact` field.
    ArrayOfCompact(Option<Vec<Option<GenericRecord>>>),
    /// Value of a `NullableBoolean` field.
    NullableBoolean(Option<bool>),
    /// Value of a `ArrayOfNullableBoolean` field.
    ArrayOfNullableBoolean(Option<Vec<Option<bool>>>),
    /// Value of a `NullableInt8` field.
    NullableInt8(Option<i8>),
    /// Value of a `ArrayOfNullableInt8` field.
    ArrayOfNullableInt8(Option<Vec<Option<i8>>>),
    /// Value of a `NullableInt16` field.
    NullableInt16(Option<i16>),
    /// Value of a `ArrayOfNullableInt16` field.
    ArrayOfNullableInt16(Option<Vec<Option<i16>>>),
    /// Value of a `NullableInt32` field.
    NullableInt32(Option<i32>),
    /// Value of a `ArrayOfNullableInt32` field.
    ArrayOfNullableInt32(Option<Vec<Option<i32>>>),
    /// Value of a `NullableInt64` field.
    NullableInt64(Option<i64>),
    /// Value of a `ArrayOfNullableInt64` field.
    ArrayOfNullableInt64(Option<Vec<Option<i64>>>),
    /// Value of a `NullableFloat32` field.
    NullableFloat32(Option<f32>),
    /// Value of a `ArrayOfNullableFloat32` field.
    ArrayOfNullableFloat32(Option<Vec<Option<f32>>>),
    /// Value of a `NullableFloat64` field.
    NullableFloat64(Option<f64>),
    /// Value of a `ArrayOfNullableFloat64` field.
    ArrayOfNullableFloat64(Option<Vec<Option<f64>>>),
}

/// A borrowed field value handed to a [`CompactWriter`].
///
/// Nested compact values are passed as `&dyn Any` and dispatched by their
/// concrete type at write time.
#[derive(Debug, Clone, Copy)]
pub enum FieldRef<'a> {
    /// Borrowed value of a `Boolean` field.
    Boolean(bool),
    /// Borrowed value of a `ArrayOfBoolean` field.
    ArrayOfBoolean(Option<&'a [bool]>),
    /// Borrowed value of a `Int8` field.
    Int8(i8),
    /// Borrowed value of a `ArrayOfInt8` field.
    ArrayOfInt8(Option<&'a [i8]>),
    /// Borrowed value of a `Int16` field.
    Int16(i16),
    /// Borrowed value of a `ArrayOfInt16` field.
    ArrayOfInt16(Option<&'a [i16]>),
    /// Borrowed value of a `Int32` field.
    Int32(i32),
    /// Borrowed value of a `ArrayOfInt32` field.
    ArrayOfInt32(Option<&'a [i32]>),
    /// Borrowed value of a `Int64` field.
    Int64(i64),
    /// Borrowed value of a `ArrayOfInt64` field.
    ArrayOfInt64(Option<&'a [i64]>),
    /// Borrowed value of a `Float32` field.
    Float32(f32),
    /// Borrowed value of a `ArrayOfFloat32` field.
    ArrayOfFloat32(Option<&'a [f32]>),
    /// Borrowed value of a `Float64` field.
    Float64(f64),
    /// Borrowed value of a `ArrayOfFloat64` field.
    ArrayOfFloat64(Option<&'a [f64]>),
    /// Borrowed value of a `String` field.
    String(Option<&'a str>),
    /// Borrowed value of a `ArrayOfString` field.
    ArrayOfString(Option<&'a [Option<&'a str>]>),
    /// Borrowed value of a `Decimal` field.
    Decimal(Option<Decimal>),
    /// Borrowed value of a `ArrayOfDecimal` field.
    ArrayOfDecimal(Option<&'a [Option<Decimal>]>),
    /// Borrowed value of a `Time` field.
    Time(Option<NaiveTime>),
    /// Borrowed value of a `ArrayOfTime` field.
    ArrayOfTime(Option<&'a [Option<NaiveTime>]>),
    /// Borrowed value of a `Date` field.
    Date(Option<NaiveDate>),
    /// Borrowed value of a `ArrayOfDate` field.
    ArrayOfDate(Option<&'a [Option<NaiveDate>]>),
    /// Borrowed value of a `Timestamp` field.
    Timestamp(Option<NaiveDateTime>),
    /// Borrowed value of a `ArrayOfTimestamp` field.
    ArrayOfTimestamp(Option<&'a [Option<NaiveDateTime>]>),
    /// Borrowed value of a `TimestampWithTimezone` field.
    TimestampWithTimezone(Option<DateTime<FixedOffset>>),
    /// Borrowed value of a `ArrayOfTimestampWithTimezone` field.
    ArrayOfTimestampWithTimezone(Option<&'a [Option<DateTime<FixedOffset>>]>),
    /// Borrowed value of a `Compact` field.
    Compact(Option<&'a dyn Any>),
    /// Borrowed value of a `ArrayOfCompact` field.
    ArrayOfCompact(Option<&'a [Option<&'a dyn Any>]>),
    /// Borrowed value of a `NullableBoolean` field.
    NullableBoolean(Option<bool>),
    /// Borrowed value of a `ArrayOfNullableBoolean` field.
    ArrayOfNullableBoolean(Option<&'a [Option<bool>]>),
    /// Borrowed value of a `NullableInt8` field.
    NullableInt8(Option<i8>),
    /// Borrowed value of a `ArrayOfNullableInt8` field.
    ArrayOfNullableInt8(Option<&'a [Option<i8>]>),
    /// Borrowed value of a `NullableInt16` field.
    NullableInt16(Option<i16>),
    /// Borrowed value of a `ArrayOfNullableInt16` field.
    ArrayOfNullableInt16(Option<&'a [Option<i16>]>),
    /// Borrowed value of a `NullableInt32` field.
    NullableInt32(Option<i32>),
    /// Borrowed value of a `ArrayOfNullableInt32` field.
    ArrayOfNullableInt32(Option<&'a [Option<i32>]>),
    /// Borrowed value of a `NullableInt64` field.
    NullableInt64(Option<i64>),
    /// Borrowed value of a `ArrayOfNullableInt64` field.
    ArrayOfNullableInt64(Option<&'a [Option<i64>]>),
    /// Borrowed value of a `NullableFloat32` field.
    NullableFloat32(Option<f32>),
    /// Borrowed value of a `ArrayOfNullableFloat32` field.
    ArrayOfNullableFloat32(Option<&'a [Option<f32>]>),
    /// Borrowed value of a `NullableFloat64` field.
    NullableFloat64(Option<f64>),
    /// Borrowed value of a `ArrayOfNullableFloat64` field.
    ArrayOfNullableFloat64(Option<&'a [Option<f64>]>),
}

impl FieldValue {
    /// Returns the kind this value is stored as.
    pub fn kind(&self) -> FieldKind {
        all_variants!(kind_of!(self))
    }

    /// Writes this value through `writer` under `name`.
    pub fn write_to(&self, name: &str, writer: &mut dyn CompactWriter) -> Result<()> {
        let value = match self {
            Self::Boolean(v) => FieldRef::Boolean(*v),
            Self::ArrayOfBoolean(v) => FieldRef::ArrayOfBoolean(v.as_deref()),
            Self::Int8(v) => FieldRef::Int8(*v),
            Self::ArrayOfInt8(v) => FieldRef::ArrayOfInt8(v.as_deref()),
            Self::Int16(v) => FieldRef::Int16(*v),
            Self::ArrayOfInt16(v) => FieldRef::ArrayOfInt16(v.as_deref()),
            Self::Int32(v) => FieldRef::Int32(*v),
            Self::ArrayOfInt32(v) => FieldRef::ArrayOfInt32(v.as_deref()),
            Self::Int64(v) => FieldRef::Int64(*v),
            Self::ArrayOfInt64(v) => FieldRef::ArrayOfInt64(v.as_deref()),
            Self::Float32(v) => FieldRef::Float32(*v),
            Self::ArrayOfFloat32(v) => FieldRef::ArrayOfFloat32(v.as_deref()),
            Self::Float64(v) => FieldRef::Float64(*v),
            Self::ArrayOfFloat64(v) => FieldRef::ArrayOfFloat64(v.as_deref()),
            Self::String(v) => FieldRef::String(v.as_deref()),
            Self::ArrayOfString(v) => {
                let items: Option<Vec<Option<&str>>> = v
                    .as_ref()
                    .map(|items| items.iter().map(|s| s.as_deref()).collect());
                return writer.write_field(name, FieldRef::ArrayOfString(items.as_deref()));
            }
            Self::Decimal(v) => FieldRef::Decimal(*v),
            Self::ArrayOfDecimal(v) => FieldRef::ArrayOfDecimal(v.as_deref()),
            Self::Time(v) => FieldRef::Time(*v),
            Self::ArrayOfTime(v) => FieldRef::ArrayOfTime(v.as_deref()),
            Self::Date(v) => FieldRef::Date(*v),
            Self::ArrayOfDate(v) => FieldRef::ArrayOfDate(v.as_deref()),
            Self::Timestamp(v) => FieldRef::Timestamp(*v),
            Self::ArrayOfTimestamp(v) => FieldRef::ArrayOfTimestamp(v.as_deref()),
            Self::TimestampWithTimezone(v) => FieldRef::TimestampWithTimezone(*v),
            Self::ArrayOfTimestampWithTimezone(v) => {
                FieldRef::ArrayOfTimestampWithTimezone(v.as_deref())
            }
            Self::Compact(v) => FieldRef::Compact(v.as_ref().map(|r| r as &dyn Any)),
            Self::ArrayOfCompact(v) => {
                let items: Option<Vec<Option<&dyn Any>>> = v.as_ref().map(|items| {
                    items
                        .iter()
                        .map(|r| r.as_ref().map(|r| r as &dyn Any))
                        .collect()
                });
                return writer.write_field(name, FieldRef::ArrayOfCompact(items.as_deref()));
            }
            Self::NullableBoolean(v) => FieldRef::NullableBoolean(*v),
            Self::ArrayOfNullableBoolean(v) => FieldRef::ArrayOfNullableBoolean(v.as_deref()),
            Self::NullableInt8(v) => FieldRef::NullableInt8(*v),
            Self::ArrayOfNullableInt8(v) => FieldRef::ArrayOfNullableInt8(v.as_deref()),
            Self::NullableInt16(v) => FieldRef::NullableInt16(*v),
            Self::ArrayOfNullableInt16(v) => FieldRef::ArrayOfNullableInt16(v.as_deref()),
            Self::NullableInt32(v) => FieldRef::NullableInt32(*v),
            Self::ArrayOfNullableInt32(v) => FieldRef::ArrayOfNullableInt32(v.as_deref()),
            Self::NullableInt64(v) => FieldRef::NullableInt64(*v),
            Self::ArrayOfNullableInt64(v) => FieldRef::ArrayOfNullableInt64(v.as_deref()),
            Self::NullableFloat32(v) => FieldRef::NullableFloat32(*v),
            Self::ArrayOfNullableFloat32(v) => FieldRef::ArrayOfNullableFloat32(v.as_deref()),
            Self::NullableFloat64(v) => FieldRef::NullableFloat64(*v),
            Self::ArrayOfNullableFloat64(v) => FieldRef::ArrayOfNullableFloat64(v.as_deref()),
        };
        writer.write_field(name, value)
    }
}

impl FieldRef<'_> {
    /// Returns the kind this value is written as.
    pub fn kind(&self) -> FieldKind {
        all_variants!(kind_of!(self))
    }
}

pub(crate) fn kind_mismatch(name: &str, declared: FieldKind, requested: FieldKind) -> HazelcastError {
    HazelcastError::Serialization(format!(
        "field '{}' is declared as {} and cannot be accessed as {}",
        name, declared, requested
    ))
}

fn present<T>(value: Option<T>, name: &str, requested: FieldKind) -> Result<T> {
    value.ok_or_else(|| {
        HazelcastError::Serialization(format!(
            "field '{}' is null and cannot be read as {}",
            name, requested
        ))
    })
}

fn all_present<T>(items: Vec<Option<T>>, name: &str, requested: FieldKind) -> Result<Vec<T>> {
    items
        .into_iter()
        .map(|item| {
            item.ok_or_else(|| {
                HazelcastError::Serialization(format!(
                    "array field '{}' contains a null element and cannot be read as {}",
                    name, requested
                ))
            })
        })
        .collect()
}

macro_rules! coerce_nullable {
    ($value:expr, $requested:expr, $name:expr;
     $(($plain:ident, $nullable:ident, $array:ident, $nullable_array:ident)),+ $(,)?) => {
        match ($value, $requested) {
            $(
                (FieldValue::$plain(v), FieldKind::$nullable) => Ok(FieldValue::$nullable(Some(v))),
                (FieldValue::$nullable(v), FieldKind::$plain) => {
                    present(v, $name, $requested).map(FieldValue::$plain)
                }
                (FieldValue::$array(v), FieldKind::$nullable_array) => Ok(FieldValue::$nullable_array(
                    v.map(|items| items.into_iter().map(Some).collect()),
                )),
                (FieldValue::$nullable_array(v), FieldKind::$array) => v
                    .map(|items| all_present(items, $name, $requested))
                    .transpose()
                    .map(FieldValue::$array),
            )+
            (value, requested) => Err(kind_mismatch($name, value.kind(), requested)),
        }
    };
}

/// Converts a stored value to the kind an accessor asked for.
///
/// A nullable accessor on a non-nullable value always succeeds; a
/// non-nullable accessor on a nullable value fails if the value (or any
/// array element) is null. Any other kind difference fails.
pub(crate) fn coerce(value: FieldValue, requested: FieldKind, name: &str) -> Result<FieldValue> {
    if value.kind() == requested {
        return Ok(value);
    }
    coerce_nullable!(value, requested, name;
        (Boolean, NullableBoolean, ArrayOfBoolean, ArrayOfNullableBoolean),
        (Int8, NullableInt8, ArrayOfInt8, ArrayOfNullableInt8),
        (Int16, NullableInt16, ArrayOfInt16, ArrayOfNullableInt16),
        (Int32, NullableInt32, ArrayOfInt32, ArrayOfNullableInt32),
        (Int64, NullableInt64, ArrayOfInt64, ArrayOfNullableInt64),
        (Float32, NullableFloat32, ArrayOfFloat32, ArrayOfNullableFloat32),
        (Float64, NullableFloat64, ArrayOfFloat64, ArrayOfNullableFloat64),
    )
}
