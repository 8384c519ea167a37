//! Compact writers: the binary layout writer and the schema-inferring dry run.

use crate::error::{HazelcastError, Result};
use crate::serialization::data_output::checked_len;
use crate::serialization::{DataOutput, ObjectDataOutput};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::any::{Any, TypeId};

use super::encoding;
use super::generic_record::GenericRecord;
use super::hook::ObjectHook;
use super::offsets::{self, NULL_OFFSET};
use super::schema::{Schema, SchemaBuilder};
use super::value::{kind_mismatch, FieldRef};

macro_rules! typed_writers {
    ($(($method:ident, $variant:ident, $ty:ty)),+ $(,)?) => {
        $(
            #[doc = concat!("Writes a `", stringify!($variant), "` field.")]
            fn $method(&mut self, name: &str, value: $ty) -> Result<()> {
                self.write_field(name, FieldRef::$variant(value))
            }
        )+
    };
}

/// Writes the fields of one compact object by name.
///
/// Fields may be written in any order, each exactly once; the value's kind
/// must equal the kind declared by the schema.
pub trait CompactWriter {
    /// Writes one field.
    fn write_field(&mut self, name: &str, value: FieldRef<'_>) -> Result<()>;

    typed_writers! {
        (write_boolean, Boolean, bool),
        (write_int8, Int8, i8),
        (write_int16, Int16, i16),
        (write_int32, Int32, i32),
        (write_int64, Int64, i64),
        (write_float32, Float32, f32),
        (write_float64, Float64, f64),
        (write_string, String, Option<&str>),
        (write_decimal, Decimal, Option<Decimal>),
        (write_time, Time, Option<NaiveTime>),
        (write_date, Date, Option<NaiveDate>),
        (write_timestamp, Timestamp, Option<NaiveDateTime>),
        (write_timestamp_with_timezone, TimestampWithTimezone, Option<DateTime<FixedOffset>>),
        (write_compact_dyn, Compact, Option<&dyn Any>),
        (write_array_of_boolean, ArrayOfBoolean, Option<&[bool]>),
        (write_array_of_int8, ArrayOfInt8, Option<&[i8]>),
        (write_array_of_int16, ArrayOfInt16, Option<&[i16]>),
        (write_array_of_int32, ArrayOfInt32, Option<&[i32]>),
        (write_array_of_int64, ArrayOfInt64, Option<&[i64]>),
        (write_array_of_float32, ArrayOfFloat32, Option<&[f32]>),
        (write_array_of_float64, ArrayOfFloat64, Option<&[f64]>),
        (write_array_of_string, ArrayOfString, Option<&[Option<&str>]>),
        (write_array_of_decimal, ArrayOfDecimal, Option<&[Option<Decimal>]>),
        (write_array_of_time, ArrayOfTime, Option<&[Option<NaiveTime>]>),
        (write_array_of_date, ArrayOfDate, Option<&[Option<NaiveDate>]>),
        (write_array_of_timestamp, ArrayOfTimestamp, Option<&[Option<NaiveDateTime>]>),
        (
            write_array_of_timestamp_with_timezone,
            ArrayOfTimestampWithTimezone,
            Option<&[Option<DateTime<FixedOffset>>]>
        ),
        (write_array_of_compact_dyn, ArrayOfCompact, Option<&[Option<&dyn Any>]>),
        (write_nullable_boolean, NullableBoolean, Option<bool>),
        (write_nullable_int8, NullableInt8, Option<i8>),
        (write_nullable_int16, NullableInt16, Option<i16>),
        (write_nullable_int32, NullableInt32, Option<i32>),
        (write_nullable_int64, NullableInt64, Option<i64>),
        (write_nullable_float32, NullableFloat32, Option<f32>),
        (write_nullable_float64, NullableFloat64, Option<f64>),
        (write_array_of_nullable_boolean, ArrayOfNullableBoolean, Option<&[Option<bool>]>),
        (write_array_of_nullable_int8, ArrayOfNullableInt8, Option<&[Option<i8>]>),
        (write_array_of_nullable_int16, ArrayOfNullableInt16, Option<&[Option<i16>]>),
        (write_array_of_nullable_int32, ArrayOfNullableInt32, Option<&[Option<i32>]>),
        (write_array_of_nullable_int64, ArrayOfNullableInt64, Option<&[Option<i64>]>),
        (write_array_of_nullable_float32, ArrayOfNullableFloat32, Option<&[Option<f32>]>),
        (write_array_of_nullable_float64, ArrayOfNullableFloat64, Option<&[Option<f64>]>),
    }
}

impl<'w> dyn CompactWriter + 'w {
    /// Writes a nested compact value of a registered type (or a
    /// [`GenericRecord`]).
    pub fn write_compact<T: Any>(&mut self, name: &str, value: Option<&T>) -> Result<()> {
        self.write_compact_dyn(name, value.map(|v| v as &dyn Any))
    }

    /// Writes an array of nested compact values, all of the same type.
    pub fn write_array_of_compact<T: Any>(
        &mut self,
        name: &str,
        value: Option<&[Option<T>]>,
    ) -> Result<()> {
        let items: Option<Vec<Option<&dyn Any>>> = value.map(|items| {
            items
                .iter()
                .map(|item| item.as_ref().map(|v| v as &dyn Any))
                .collect()
        });
        self.write_array_of_compact_dyn(name, items.as_deref())
    }
}

impl FieldRef<'_> {
    /// Returns true for an absent value of a variable-size kind.
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Self::ArrayOfBoolean(None)
                | Self::ArrayOfInt8(None)
                | Self::ArrayOfInt16(None)
                | Self::ArrayOfInt32(None)
                | Self::ArrayOfInt64(None)
                | Self::ArrayOfFloat32(None)
                | Self::ArrayOfFloat64(None)
                | Self::String(None)
                | Self::ArrayOfString(None)
                | Self::Decimal(None)
                | Self::ArrayOfDecimal(None)
                | Self::Time(None)
                | Self::ArrayOfTime(None)
                | Self::Date(None)
                | Self::ArrayOfDate(None)
                | Self::Timestamp(None)
                | Self::ArrayOfTimestamp(None)
                | Self::TimestampWithTimezone(None)
                | Self::ArrayOfTimestampWithTimezone(None)
                | Self::Compact(None)
                | Self::ArrayOfCompact(None)
                | Self::NullableBoolean(None)
                | Self::ArrayOfNullableBoolean(None)
                | Self::NullableInt8(None)
                | Self::ArrayOfNullableInt8(None)
                | Self::NullableInt16(None)
                | Self::ArrayOfNullableInt16(None)
                | Self::NullableInt32(None)
                | Self::ArrayOfNullableInt32(None)
                | Self::NullableInt64(None)
                | Self::ArrayOfNullableInt64(None)
                | Self::NullableFloat32(None)
                | Self::ArrayOfNullableFloat32(None)
                | Self::NullableFloat64(None)
                | Self::ArrayOfNullableFloat64(None)
        )
    }
}

pub(crate) fn unknown_field(schema: &Schema, name: &str) -> HazelcastError {
    HazelcastError::Serialization(format!(
        "unknown field '{}' for type '{}' (schema {})",
        name,
        schema.type_name(),
        schema.id()
    ))
}

/// Lays out one compact object into an [`ObjectDataOutput`].
///
/// Creating the writer reserves the data-length header (when the schema has
/// variable-size fields) and the fixed region. [`complete`](Self::complete)
/// appends the offset table and patches the header.
pub struct DefaultCompactWriter<'a> {
    out: &'a mut ObjectDataOutput,
    hook: &'a dyn ObjectHook,
    schema: Schema,
    data_start: usize,
    field_offsets: Vec<i32>,
    written: Vec<bool>,
    completed: bool,
}

impl<'a> DefaultCompactWriter<'a> {
    /// Starts an object at the cursor of `out`. The schema id must already
    /// have been written.
    pub fn new(out: &'a mut ObjectDataOutput, hook: &'a dyn ObjectHook, schema: Schema) -> Self {
        let variable_fields = schema.variable_size_field_count();
        if variable_fields > 0 {
            out.write_zero_bytes(4);
        }
        let data_start = out.position();
        out.write_zero_bytes(schema.fixed_size_fields_length());
        let field_count = schema.field_count();
        Self {
            out,
            hook,
            schema,
            data_start,
            field_offsets: vec![NULL_OFFSET; variable_fields],
            written: vec![false; field_count],
            completed: false,
        }
    }

    /// Returns the schema being written.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns true once [`complete`](Self::complete) succeeded.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Writes the offset table and seals the writer.
    ///
    /// Fails if a schema field was never written. Calling it again after a
    /// success does nothing.
    pub fn complete(&mut self) -> Result<()> {
        if self.completed {
            return Ok(());
        }
        if let Some(missing) = self.written.iter().position(|w| !w) {
            return Err(HazelcastError::Serialization(format!(
                "field '{}' of '{}' was not written",
                self.schema.fields()[missing].name(),
                self.schema.type_name()
            )));
        }
        if !self.field_offsets.is_empty() {
            let data_length = self.out.position() - self.data_start;
            offsets::write_offsets(self.out, data_length, &self.field_offsets)?;
            self.out
                .write_int_at(self.data_start - 4, checked_len(data_length)?)?;
        }
        self.completed = true;
        Ok(())
    }

    fn write_fixed(&mut self, position: usize, value: FieldRef<'_>) -> Result<()> {
        match value {
            FieldRef::Int8(v) => self.out.write_byte_at(position, v),
            FieldRef::Int16(v) => self.out.write_short_at(position, v),
            FieldRef::Int32(v) => self.out.write_int_at(position, v),
            FieldRef::Int64(v) => self.out.write_long_at(position, v),
            FieldRef::Float32(v) => self.out.write_int_at(position, v.to_bits() as i32),
            FieldRef::Float64(v) => self.out.write_long_at(position, v.to_bits() as i64),
            other => Err(HazelcastError::Serialization(format!(
                "{} is not a fixed-size kind",
                other.kind()
            ))),
        }
    }
}

impl CompactWriter for DefaultCompactWriter<'_> {
    fn write_field(&mut self, name: &str, value: FieldRef<'_>) -> Result<()> {
        if self.completed {
            return Err(HazelcastError::Serialization(format!(
                "cannot write field '{}' of '{}' after the writer was completed",
                name,
                self.schema.type_name()
            )));
        }
        let position = self
            .schema
            .position(name)
            .ok_or_else(|| unknown_field(&self.schema, name))?;
        let field = &self.schema.fields()[position];
        let (kind, offset, bit_offset, index) =
            (field.kind(), field.offset(), field.bit_offset(), field.index());
        if kind != value.kind() {
            return Err(kind_mismatch(name, kind, value.kind()));
        }
        if self.written[position] {
            return Err(HazelcastError::Serialization(format!(
                "field '{}' of '{}' was already written",
                name,
                self.schema.type_name()
            )));
        }

        match value {
            FieldRef::Boolean(v) => {
                self.out
                    .write_bool_bit(self.data_start + offset as usize, bit_offset as u8, v)?;
            }
            _ if kind.fixed_size().is_some() => {
                self.write_fixed(self.data_start + offset as usize, value)?;
            }
            _ if value.is_null() => {}
            _ => {
                let start = self.out.position();
                let relative = checked_len(start - self.data_start)?;
                if let Err(e) = write_variable(self.out, self.hook, name, value) {
                    self.out.truncate(start);
                    return Err(e);
                }
                self.field_offsets[index as usize] = relative;
            }
        }
        self.written[position] = true;
        Ok(())
    }
}

fn check_homogeneous(name: &str, items: &[Option<&dyn Any>]) -> Result<()> {
    let mut first: Option<(TypeId, Option<i64>)> = None;
    for item in items.iter().flatten() {
        let item: &dyn Any = *item;
        let key = (
            item.type_id(),
            item.downcast_ref::<GenericRecord>().map(|r| r.schema().id()),
        );
        match first {
            None => first = Some(key),
            Some(expected) if expected != key => {
                return Err(HazelcastError::Serialization(format!(
                    "array field '{}' mixes elements of different types or schemas",
                    name
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// `[data length][count][items][offsets]`, offsets relative to the first item.
fn write_items<T>(
    out: &mut ObjectDataOutput,
    items: &[Option<T>],
    mut write_item: impl FnMut(&mut ObjectDataOutput, &T) -> Result<()>,
) -> Result<()> {
    let data_length_position = out.position();
    out.write_zero_bytes(4);
    out.write_int(checked_len(items.len())?)?;
    let start = out.position();
    let mut item_offsets = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Some(v) => {
                item_offsets.push(checked_len(out.position() - start)?);
                write_item(out, v)?;
            }
            None => item_offsets.push(NULL_OFFSET),
        }
    }
    let data_length = out.position() - start;
    out.write_int_at(data_length_position, checked_len(data_length)?)?;
    offsets::write_offsets(out, data_length, &item_offsets)
}

fn write_fixed_array<T: Copy>(
    out: &mut ObjectDataOutput,
    items: &[T],
    mut write_item: impl FnMut(&mut ObjectDataOutput, T) -> Result<()>,
) -> Result<()> {
    out.write_int(checked_len(items.len())?)?;
    for &item in items {
        write_item(out, item)?;
    }
    Ok(())
}

/// Encodes a present variable-size value at the cursor.
fn write_variable(
    out: &mut ObjectDataOutput,
    hook: &dyn ObjectHook,
    name: &str,
    value: FieldRef<'_>,
) -> Result<()> {
    match value {
        FieldRef::String(Some(v)) => out.write_string(v),
        FieldRef::Decimal(Some(v)) => encoding::write_decimal(out, &v),
        FieldRef::Time(Some(v)) => encoding::write_time(out, &v),
        FieldRef::Date(Some(v)) => encoding::write_date(out, &v),
        FieldRef::Timestamp(Some(v)) => encoding::write_timestamp(out, &v),
        FieldRef::TimestampWithTimezone(Some(v)) => encoding::write_timestamp_with_timezone(out, &v),
        FieldRef::Compact(Some(v)) => hook.write_object(out, v),
        FieldRef::NullableBoolean(Some(v)) => out.write_bool(v),
        FieldRef::NullableInt8(Some(v)) => out.write_byte(v),
        FieldRef::NullableInt16(Some(v)) => out.write_short(v),
        FieldRef::NullableInt32(Some(v)) => out.write_int(v),
        FieldRef::NullableInt64(Some(v)) => out.write_long(v),
        FieldRef::NullableFloat32(Some(v)) => out.write_float(v),
        FieldRef::NullableFloat64(Some(v)) => out.write_double(v),
        FieldRef::ArrayOfBoolean(Some(v)) => encoding::write_boolean_bits(out, v),
        FieldRef::ArrayOfInt8(Some(v)) => write_fixed_array(out, v, |o, x| o.write_byte(x)),
        FieldRef::ArrayOfInt16(Some(v)) => write_fixed_array(out, v, |o, x| o.write_short(x)),
        FieldRef::ArrayOfInt32(Some(v)) => write_fixed_array(out, v, |o, x| o.write_int(x)),
        FieldRef::ArrayOfInt64(Some(v)) => write_fixed_array(out, v, |o, x| o.write_long(x)),
        FieldRef::ArrayOfFloat32(Some(v)) => write_fixed_array(out, v, |o, x| o.write_float(x)),
        FieldRef::ArrayOfFloat64(Some(v)) => write_fixed_array(out, v, |o, x| o.write_double(x)),
        FieldRef::ArrayOfString(Some(v)) => write_items(out, v, |o, s| o.write_string(s)),
        FieldRef::ArrayOfDecimal(Some(v)) => write_items(out, v, encoding::write_decimal),
        FieldRef::ArrayOfTime(Some(v)) => write_items(out, v, encoding::write_time),
        FieldRef::ArrayOfDate(Some(v)) => write_items(out, v, encoding::write_date),
        FieldRef::ArrayOfTimestamp(Some(v)) => write_items(out, v, encoding::write_timestamp),
        FieldRef::ArrayOfTimestampWithTimezone(Some(v)) => {
            write_items(out, v, encoding::write_timestamp_with_timezone)
        }
        FieldRef::ArrayOfCompact(Some(v)) => {
            check_homogeneous(name, v)?;
            write_items(out, v, |o, item| hook.write_object(o, *item))
        }
        FieldRef::ArrayOfNullableBoolean(Some(v)) => write_items(out, v, |o, x| o.write_bool(*x)),
        FieldRef::ArrayOfNullableInt8(Some(v)) => write_items(out, v, |o, x| o.write_byte(*x)),
        FieldRef::ArrayOfNullableInt16(Some(v)) => write_items(out, v, |o, x| o.write_short(*x)),
        FieldRef::ArrayOfNullableInt32(Some(v)) => write_items(out, v, |o, x| o.write_int(*x)),
        FieldRef::ArrayOfNullableInt64(Some(v)) => write_items(out, v, |o, x| o.write_long(*x)),
        FieldRef::ArrayOfNullableFloat32(Some(v)) => write_items(out, v, |o, x| o.write_float(*x)),
        FieldRef::ArrayOfNullableFloat64(Some(v)) => {
            write_items(out, v, |o, x| o.write_double(*x))
        }
        other => Err(HazelcastError::Serialization(format!(
            "field '{}' has no variable-size value of kind {}",
            name,
            other.kind()
        ))),
    }
}

/// A [`CompactWriter`] that records the kinds a serializer writes and builds
/// the schema from them, without producing any bytes.
#[derive(Debug, Clone)]
pub struct SchemaWriter {
    builder: SchemaBuilder,
}

impl SchemaWriter {
    /// Creates a dry-run writer for the given type name.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            builder: SchemaBuilder::new(type_name),
        }
    }

    /// Builds the schema of everything written so far.
    pub fn build(self) -> Result<Schema> {
        self.builder.build()
    }
}

impl CompactWriter for SchemaWriter {
    fn write_field(&mut self, name: &str, value: FieldRef<'_>) -> Result<()> {
        self.builder.add_field(name, value.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::compact::FieldKind;
    use crate::serialization::{Endianness, ObjectDataInput, Target};

    struct NoNested;

    impl ObjectHook for NoNested {
        fn write_object(&self, _out: &mut ObjectDataOutput, _value: &dyn Any) -> Result<()> {
            Err(HazelcastError::Serialization("nested values not supported".into()))
        }

        fn read_object(
            &self,
            _input: &mut ObjectDataInput<'_>,
            _target: Target,
        ) -> Result<Box<dyn Any + Send + Sync>> {
            Err(HazelcastError::Serialization("nested values not supported".into()))
        }
    }

    fn thing() -> Schema {
        Schema::new("Thing", [("name", FieldKind::String), ("value", FieldKind::Int32)]).unwrap()
    }

    #[test]
    fn test_thing_layout_little_endian() {
        let mut out = ObjectDataOutput::with_endianness(Endianness::Little);
        out.write_long(thing().id()).unwrap();
        let mut writer = DefaultCompactWriter::new(&mut out, &NoNested, thing());
        writer.write_string("name", Some("some name")).unwrap();
        writer.write_int32("value", 42).unwrap();
        writer.complete().unwrap();

        let bytes = out.as_bytes();
        let data_length = i32::from_le_bytes(bytes[8..12].try_into().unwrap());
        assert_eq!(data_length, 17);
        assert_eq!(i32::from_le_bytes(bytes[12..16].try_into().unwrap()), 42);
        assert_eq!(i32::from_le_bytes(bytes[16..20].try_into().unwrap()), 9);
        assert_eq!(&bytes[20..29], b"some name");
        // one byte-wide offset pointing just past the fixed region
        assert_eq!(bytes.len(), 12 + 17 + 1);
        assert_eq!(bytes[29], 4);
    }

    #[test]
    fn test_fixed_only_schema_has_no_header() {
        let schema = Schema::new(
            "Point",
            [("x", FieldKind::Int32), ("y", FieldKind::Int32), ("on", FieldKind::Boolean)],
        )
        .unwrap();
        let mut out = ObjectDataOutput::new();
        let mut writer = DefaultCompactWriter::new(&mut out, &NoNested, schema);
        writer.write_boolean("on", true).unwrap();
        writer.write_int32("y", 2).unwrap();
        writer.write_int32("x", 1).unwrap();
        writer.complete().unwrap();
        assert_eq!(out.as_bytes(), &[0, 0, 0, 1, 0, 0, 0, 2, 1]);
    }

    #[test]
    fn test_null_variable_field_uses_sentinel() {
        let mut out = ObjectDataOutput::new();
        let mut writer = DefaultCompactWriter::new(&mut out, &NoNested, thing());
        writer.write_int32("value", 7).unwrap();
        writer.write_string("name", None).unwrap();
        writer.complete().unwrap();
        assert_eq!(out.as_bytes(), &[0, 0, 0, 4, 0, 0, 0, 7, 0xFF]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut out = ObjectDataOutput::new();
        let mut writer = DefaultCompactWriter::new(&mut out, &NoNested, thing());
        let err = writer.write_int32("missing", 1).unwrap_err();
        assert!(err.to_string().contains("unknown field 'missing'"));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let mut out = ObjectDataOutput::new();
        let mut writer = DefaultCompactWriter::new(&mut out, &NoNested, thing());
        assert!(writer.write_int64("value", 1).is_err());
        assert!(writer.write_nullable_int32("value", Some(1)).is_err());
    }

    #[test]
    fn test_duplicate_write_rejected() {
        let mut out = ObjectDataOutput::new();
        let mut writer = DefaultCompactWriter::new(&mut out, &NoNested, thing());
        writer.write_int32("value", 1).unwrap();
        assert!(writer.write_int32("VALUE", 2).is_err());
    }

    #[test]
    fn test_complete_is_idempotent_and_seals() {
        let mut out = ObjectDataOutput::new();
        let mut writer = DefaultCompactWriter::new(&mut out, &NoNested, thing());
        writer.write_int32("value", 1).unwrap();
        writer.write_string("name", Some("x")).unwrap();
        writer.complete().unwrap();
        writer.complete().unwrap();
        assert!(writer.is_completed());
        assert!(writer.write_string("name", Some("y")).is_err());
    }

    #[test]
    fn test_complete_requires_every_field() {
        let mut out = ObjectDataOutput::new();
        let mut writer = DefaultCompactWriter::new(&mut out, &NoNested, thing());
        writer.write_int32("value", 1).unwrap();
        let err = writer.complete().unwrap_err();
        assert!(err.to_string().contains("'name'"));
        assert!(!writer.is_completed());
    }

    #[test]
    fn test_offset_width_follows_data_length() {
        let schema = Schema::new("S", [("s", FieldKind::String)]).unwrap();
        // data length = 4 (string length prefix) + string bytes
        for (len, width) in [(250usize, 1usize), (251, 2), (65530, 2), (65531, 4)] {
            let text = "a".repeat(len);
            let mut out = ObjectDataOutput::new();
            let mut writer = DefaultCompactWriter::new(&mut out, &NoNested, schema.clone());
            writer.write_string("s", Some(&text)).unwrap();
            writer.complete().unwrap();
            assert_eq!(out.len(), 4 + 4 + len + width, "string of {} bytes", len);
        }
    }

    #[test]
    fn test_variable_array_layout() {
        let schema = Schema::new("S", [("a", FieldKind::ArrayOfNullableInt8)]).unwrap();
        let mut out = ObjectDataOutput::new();
        let mut writer = DefaultCompactWriter::new(&mut out, &NoNested, schema);
        writer
            .write_array_of_nullable_int8("a", Some(&[Some(5), None, Some(-1)]))
            .unwrap();
        writer.complete().unwrap();
        assert_eq!(
            out.as_bytes(),
            &[
                0, 0, 0, 13, // object data length
                0, 0, 0, 2, // array data length
                0, 0, 0, 3, // count
                5, 0xFF, // items
                0, 0xFF, 1, // item offsets
                0, // field offset
            ]
        );
    }

    #[test]
    fn test_heterogeneous_compact_array_rejected() {
        let schema = Schema::new("S", [("a", FieldKind::ArrayOfCompact)]).unwrap();
        let mut out = ObjectDataOutput::new();
        let mut writer = DefaultCompactWriter::new(&mut out, &NoNested, schema);
        let items: [Option<&dyn Any>; 2] = [Some(&1i32), Some(&"text")];
        let err = writer.write_array_of_compact_dyn("a", Some(&items)).unwrap_err();
        assert!(err.to_string().contains("mixes elements"));
    }

    #[test]
    fn test_failed_variable_write_leaves_no_bytes() {
        let schema = Schema::new("S", [("a", FieldKind::ArrayOfCompact)]).unwrap();
        let mut clean = ObjectDataOutput::new();
        let mut writer = DefaultCompactWriter::new(&mut clean, &NoNested, schema.clone());
        writer.write_array_of_compact_dyn("a", None).unwrap();
        writer.complete().unwrap();

        let mut out = ObjectDataOutput::new();
        let mut writer = DefaultCompactWriter::new(&mut out, &NoNested, schema);
        let items: [Option<&dyn Any>; 1] = [Some(&1i32)];
        assert!(writer.write_array_of_compact_dyn("a", Some(&items)).is_err());
        writer.write_array_of_compact_dyn("a", None).unwrap();
        writer.complete().unwrap();
        assert_eq!(out.as_bytes(), clean.as_bytes());
        assert_eq!(out.as_bytes(), &[0, 0, 0, 0, 0xFF]);
    }

    #[test]
    fn test_schema_writer_infers_schema() {
        let mut writer = SchemaWriter::new("Thing");
        writer.write_int32("value", 0).unwrap();
        writer.write_string("name", None).unwrap();
        let schema = writer.build().unwrap();
        assert_eq!(schema, thing());
    }

    #[test]
    fn test_schema_writer_rejects_duplicates() {
        let mut writer = SchemaWriter::new("Thing");
        writer.write_int32("value", 0).unwrap();
        assert!(writer.write_int64("value", 0).is_err());
    }
}
