//! Random-access reader over one serialized compact object.

use crate::error::{HazelcastError, Result};
use crate::serialization::{DataInput, ObjectDataInput};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::any::Any;

use super::encoding;
use super::field_kind::FieldKind;
use super::generic_record::GenericRecord;
use super::hook::{ObjectHook, Target};
use super::offsets::OffsetWidth;
use super::schema::Schema;
use super::value::{coerce, kind_mismatch, FieldValue};
use super::writer::unknown_field;

/// A decoded nested compact object.
pub type BoxedObject = Box<dyn Any + Send + Sync>;

macro_rules! typed_readers {
    ($(($method:ident, $variant:ident, $ty:ty)),+ $(,)?) => {
        $(
            #[doc = concat!("Reads a field as `", stringify!($variant), "`.")]
            fn $method(&mut self, name: &str) -> Result<$ty> {
                match self.read_field(name, FieldKind::$variant)? {
                    FieldValue::$variant(v) => Ok(v),
                    other => Err(kind_mismatch(name, other.kind(), FieldKind::$variant)),
                }
            }
        )+
    };
}

/// Reads the fields of one compact object by name.
///
/// A nullable accessor on a non-nullable field always succeeds; a
/// non-nullable accessor on a nullable field fails if the value is null.
/// The same holds between `ARRAY_OF_X` and `ARRAY_OF_NULLABLE_X`.
pub trait CompactReader {
    /// Returns the schema of the object being read.
    fn schema(&self) -> &Schema;

    /// Returns the declared kind of a field, or `None` if the schema has no
    /// such field.
    fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.schema().field(name).map(|f| f.kind())
    }

    /// Reads a field as `kind`, applying nullable widening.
    ///
    /// Nested compact values are returned as generic records.
    fn read_field(&mut self, name: &str, kind: FieldKind) -> Result<FieldValue>;

    /// Reads a `COMPACT` field, decoding the value as `target`.
    fn read_compact_dyn(&mut self, name: &str, target: Target) -> Result<Option<BoxedObject>>;

    /// Reads an `ARRAY_OF_COMPACT` field, decoding every element as `target`.
    fn read_array_of_compact_dyn(
        &mut self,
        name: &str,
        target: Target,
    ) -> Result<Option<Vec<Option<BoxedObject>>>>;

    typed_readers! {
        (read_boolean, Boolean, bool),
        (read_int8, Int8, i8),
        (read_int16, Int16, i16),
        (read_int32, Int32, i32),
        (read_int64, Int64, i64),
        (read_float32, Float32, f32),
        (read_float64, Float64, f64),
        (read_string, String, Option<String>),
        (read_decimal, Decimal, Option<Decimal>),
        (read_time, Time, Option<NaiveTime>),
        (read_date, Date, Option<NaiveDate>),
        (read_timestamp, Timestamp, Option<NaiveDateTime>),
        (read_timestamp_with_timezone, TimestampWithTimezone, Option<DateTime<FixedOffset>>),
        (read_array_of_boolean, ArrayOfBoolean, Option<Vec<bool>>),
        (read_array_of_int8, ArrayOfInt8, Option<Vec<i8>>),
        (read_array_of_int16, ArrayOfInt16, Option<Vec<i16>>),
        (read_array_of_int32, ArrayOfInt32, Option<Vec<i32>>),
        (read_array_of_int64, ArrayOfInt64, Option<Vec<i64>>),
        (read_array_of_float32, ArrayOfFloat32, Option<Vec<f32>>),
        (read_array_of_float64, ArrayOfFloat64, Option<Vec<f64>>),
        (read_array_of_string, ArrayOfString, Option<Vec<Option<String>>>),
        (read_array_of_decimal, ArrayOfDecimal, Option<Vec<Option<Decimal>>>),
        (read_array_of_time, ArrayOfTime, Option<Vec<Option<NaiveTime>>>),
        (read_array_of_date, ArrayOfDate, Option<Vec<Option<NaiveDate>>>),
        (read_array_of_timestamp, ArrayOfTimestamp, Option<Vec<Option<NaiveDateTime>>>),
        (
            read_array_of_timestamp_with_timezone,
            ArrayOfTimestampWithTimezone,
            Option<Vec<Option<DateTime<FixedOffset>>>>
        ),
        (read_nullable_boolean, NullableBoolean, Option<bool>),
        (read_nullable_int8, NullableInt8, Option<i8>),
        (read_nullable_int16, NullableInt16, Option<i16>),
        (read_nullable_int32, NullableInt32, Option<i32>),
        (read_nullable_int64, NullableInt64, Option<i64>),
        (read_nullable_float32, NullableFloat32, Option<f32>),
        (read_nullable_float64, NullableFloat64, Option<f64>),
        (read_array_of_nullable_boolean, ArrayOfNullableBoolean, Option<Vec<Option<bool>>>),
        (read_array_of_nullable_int8, ArrayOfNullableInt8, Option<Vec<Option<i8>>>),
        (read_array_of_nullable_int16, ArrayOfNullableInt16, Option<Vec<Option<i16>>>),
        (read_array_of_nullable_int32, ArrayOfNullableInt32, Option<Vec<Option<i32>>>),
        (read_array_of_nullable_int64, ArrayOfNullableInt64, Option<Vec<Option<i64>>>),
        (read_array_of_nullable_float32, ArrayOfNullableFloat32, Option<Vec<Option<f32>>>),
        (read_array_of_nullable_float64, ArrayOfNullableFloat64, Option<Vec<Option<f64>>>),
    }
}

pub(crate) fn downcast<T: Any>(object: BoxedObject, name: &str) -> Result<T> {
    object.downcast::<T>().map(|b| *b).map_err(|_| {
        HazelcastError::Serialization(format!(
            "field '{}' did not decode to a {}",
            name,
            std::any::type_name::<T>()
        ))
    })
}

impl<'r> dyn CompactReader + 'r {
    /// Reads a `COMPACT` field as the registered type `T` (or
    /// [`GenericRecord`]).
    pub fn read_compact<T: Any + Send + Sync>(&mut self, name: &str) -> Result<Option<T>> {
        self.read_compact_dyn(name, target_of::<T>())?
            .map(|object| downcast(object, name))
            .transpose()
    }

    /// Reads an `ARRAY_OF_COMPACT` field as elements of type `T`.
    pub fn read_array_of_compact<T: Any + Send + Sync>(
        &mut self,
        name: &str,
    ) -> Result<Option<Vec<Option<T>>>> {
        let Some(items) = self.read_array_of_compact_dyn(name, target_of::<T>())? else {
            return Ok(None);
        };
        items
            .into_iter()
            .map(|item| item.map(|object| downcast(object, name)).transpose())
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

pub(crate) fn target_of<T: Any>() -> Target {
    if std::any::TypeId::of::<T>() == std::any::TypeId::of::<GenericRecord>() {
        Target::Generic
    } else {
        Target::of::<T>()
    }
}

/// Reads one object laid out by a [`DefaultCompactWriter`](super::DefaultCompactWriter).
pub struct DefaultCompactReader<'a> {
    input: ObjectDataInput<'a>,
    hook: &'a dyn ObjectHook,
    schema: Schema,
    data_start: usize,
    offsets_position: usize,
    width: OffsetWidth,
}

impl<'a> DefaultCompactReader<'a> {
    /// Opens the object whose layout starts at the cursor of `input`, just
    /// after its schema id.
    pub fn new(input: &ObjectDataInput<'a>, hook: &'a dyn ObjectHook, schema: Schema) -> Result<Self> {
        let start = input.position();
        let fixed_length = schema.fixed_size_fields_length();
        let (data_start, offsets_position, width) = if schema.variable_size_field_count() > 0 {
            let data_length = input.read_int_at(start)?;
            let data_length = usize::try_from(data_length).map_err(|_| {
                HazelcastError::serialization(format!("invalid data length: {}", data_length))
            })?;
            let data_start = start + 4;
            (
                data_start,
                data_start + data_length,
                OffsetWidth::for_data_length(data_length),
            )
        } else {
            (start, start + fixed_length, OffsetWidth::Byte)
        };
        let end = offsets_position
            .checked_add(schema.variable_size_field_count() * width.size())
            .filter(|&end| end <= input.data().len() && data_start + fixed_length <= end);
        if end.is_none() {
            return Err(HazelcastError::Serialization(format!(
                "truncated object of '{}': buffer of {} bytes is too short",
                schema.type_name(),
                input.data().len()
            )));
        }
        Ok(Self {
            input: input.clone(),
            hook,
            schema,
            data_start,
            offsets_position,
            width,
        })
    }

    /// Position just past this object's offset table.
    pub fn end_position(&self) -> usize {
        self.offsets_position + self.schema.variable_size_field_count() * self.width.size()
    }

    fn lookup(&self, name: &str) -> Result<(FieldKind, i32, i8, i32)> {
        let field = self
            .schema
            .field(name)
            .ok_or_else(|| unknown_field(&self.schema, name))?;
        Ok((field.kind(), field.offset(), field.bit_offset(), field.index()))
    }

    /// Cursor at the value of variable field `index`, or `None` if it is null.
    fn variable_cursor(&self, index: i32) -> Result<Option<ObjectDataInput<'a>>> {
        let entry = self.offsets_position + index as usize * self.width.size();
        match self.width.read(&self.input, entry)? {
            None => Ok(None),
            Some(offset) => {
                let mut cursor = self.input.clone();
                cursor.move_to(self.data_start + offset)?;
                Ok(Some(cursor))
            }
        }
    }

    fn read_stored(&self, kind: FieldKind, offset: i32, bit_offset: i8, index: i32) -> Result<FieldValue> {
        let position = self.data_start + offset.max(0) as usize;
        match kind {
            FieldKind::Boolean => {
                let byte = self.input.read_byte_at(position)? as u8;
                Ok(FieldValue::Boolean(byte & (1 << bit_offset) != 0))
            }
            FieldKind::Int8 => Ok(FieldValue::Int8(self.input.read_byte_at(position)?)),
            FieldKind::Int16 => Ok(FieldValue::Int16(self.input.read_short_at(position)?)),
            FieldKind::Int32 => Ok(FieldValue::Int32(self.input.read_int_at(position)?)),
            FieldKind::Int64 => Ok(FieldValue::Int64(self.input.read_long_at(position)?)),
            FieldKind::Float32 => Ok(FieldValue::Float32(f32::from_bits(
                self.input.read_int_at(position)? as u32,
            ))),
            FieldKind::Float64 => Ok(FieldValue::Float64(f64::from_bits(
                self.input.read_long_at(position)? as u64,
            ))),
            _ => match self.variable_cursor(index)? {
                None => Ok(FieldValue::null_of(kind)),
                Some(mut cursor) => read_variable(&mut cursor, self.hook, kind),
            },
        }
    }
}

impl CompactReader for DefaultCompactReader<'_> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn read_field(&mut self, name: &str, kind: FieldKind) -> Result<FieldValue> {
        let (declared, offset, bit_offset, index) = self.lookup(name)?;
        if !declared.is_readable_as(kind) {
            return Err(kind_mismatch(name, declared, kind));
        }
        let stored = self.read_stored(declared, offset, bit_offset, index)?;
        coerce(stored, kind, name)
    }

    fn read_compact_dyn(&mut self, name: &str, target: Target) -> Result<Option<BoxedObject>> {
        let (declared, _, _, index) = self.lookup(name)?;
        if declared != FieldKind::Compact {
            return Err(kind_mismatch(name, declared, FieldKind::Compact));
        }
        match self.variable_cursor(index)? {
            None => Ok(None),
            Some(mut cursor) => self.hook.read_object(&mut cursor, target).map(Some),
        }
    }

    fn read_array_of_compact_dyn(
        &mut self,
        name: &str,
        target: Target,
    ) -> Result<Option<Vec<Option<BoxedObject>>>> {
        let (declared, _, _, index) = self.lookup(name)?;
        if declared != FieldKind::ArrayOfCompact {
            return Err(kind_mismatch(name, declared, FieldKind::ArrayOfCompact));
        }
        match self.variable_cursor(index)? {
            None => Ok(None),
            Some(mut cursor) => {
                let hook = self.hook;
                read_items(&mut cursor, |c| hook.read_object(c, target)).map(Some)
            }
        }
    }
}

impl FieldValue {
    /// The null value of a variable-size kind; fixed-size kinds get their
    /// zero value.
    pub fn null_of(kind: FieldKind) -> FieldValue {
        match kind {
            FieldKind::Boolean => FieldValue::Boolean(false),
            FieldKind::Int8 => FieldValue::Int8(0),
            FieldKind::Int16 => FieldValue::Int16(0),
            FieldKind::Int32 => FieldValue::Int32(0),
            FieldKind::Int64 => FieldValue::Int64(0),
            FieldKind::Float32 => FieldValue::Float32(0.0),
            FieldKind::Float64 => FieldValue::Float64(0.0),
            FieldKind::ArrayOfBoolean => FieldValue::ArrayOfBoolean(None),
            FieldKind::ArrayOfInt8 => FieldValue::ArrayOfInt8(None),
            FieldKind::ArrayOfInt16 => FieldValue::ArrayOfInt16(None),
            FieldKind::ArrayOfInt32 => FieldValue::ArrayOfInt32(None),
            FieldKind::ArrayOfInt64 => FieldValue::ArrayOfInt64(None),
            FieldKind::ArrayOfFloat32 => FieldValue::ArrayOfFloat32(None),
            FieldKind::ArrayOfFloat64 => FieldValue::ArrayOfFloat64(None),
            FieldKind::String => FieldValue::String(None),
            FieldKind::ArrayOfString => FieldValue::ArrayOfString(None),
            FieldKind::Decimal => FieldValue::Decimal(None),
            FieldKind::ArrayOfDecimal => FieldValue::ArrayOfDecimal(None),
            FieldKind::Time => FieldValue::Time(None),
            FieldKind::ArrayOfTime => FieldValue::ArrayOfTime(None),
            FieldKind::Date => FieldValue::Date(None),
            FieldKind::ArrayOfDate => FieldValue::ArrayOfDate(None),
            FieldKind::Timestamp => FieldValue::Timestamp(None),
            FieldKind::ArrayOfTimestamp => FieldValue::ArrayOfTimestamp(None),
            FieldKind::TimestampWithTimezone => FieldValue::TimestampWithTimezone(None),
            FieldKind::ArrayOfTimestampWithTimezone => {
                FieldValue::ArrayOfTimestampWithTimezone(None)
            }
            FieldKind::Compact => FieldValue::Compact(None),
            FieldKind::ArrayOfCompact => FieldValue::ArrayOfCompact(None),
            FieldKind::NullableBoolean => FieldValue::NullableBoolean(None),
            FieldKind::ArrayOfNullableBoolean => FieldValue::ArrayOfNullableBoolean(None),
            FieldKind::NullableInt8 => FieldValue::NullableInt8(None),
            FieldKind::ArrayOfNullableInt8 => FieldValue::ArrayOfNullableInt8(None),
            FieldKind::NullableInt16 => FieldValue::NullableInt16(None),
            FieldKind::ArrayOfNullableInt16 => FieldValue::ArrayOfNullableInt16(None),
            FieldKind::NullableInt32 => FieldValue::NullableInt32(None),
            FieldKind::ArrayOfNullableInt32 => FieldValue::ArrayOfNullableInt32(None),
            FieldKind::NullableInt64 => FieldValue::NullableInt64(None),
            FieldKind::ArrayOfNullableInt64 => FieldValue::ArrayOfNullableInt64(None),
            FieldKind::NullableFloat32 => FieldValue::NullableFloat32(None),
            FieldKind::ArrayOfNullableFloat32 => FieldValue::ArrayOfNullableFloat32(None),
            FieldKind::NullableFloat64 => FieldValue::NullableFloat64(None),
            FieldKind::ArrayOfNullableFloat64 => FieldValue::ArrayOfNullableFloat64(None),
        }
    }
}

/// Reads `[data length][count][items][offsets]` starting at the cursor.
pub(crate) fn read_items<'a, T>(
    cursor: &mut ObjectDataInput<'a>,
    mut read_item: impl FnMut(&mut ObjectDataInput<'a>) -> Result<T>,
) -> Result<Vec<Option<T>>> {
    let (items_start, count, offsets_position, width) = item_table(cursor)?;
    let mut items = Vec::with_capacity(count);
    for i in 0..count {
        match width.read(cursor, offsets_position + i * width.size())? {
            None => items.push(None),
            Some(offset) => {
                let mut item = cursor.clone();
                item.move_to(items_start + offset)?;
                items.push(Some(read_item(&mut item)?));
            }
        }
    }
    Ok(items)
}

/// Parses the header of a variable-item array and validates its bounds.
///
/// Returns the position of the first item, the item count, the position of
/// the offset table and its entry width.
pub(crate) fn item_table(cursor: &mut ObjectDataInput<'_>) -> Result<(usize, usize, usize, OffsetWidth)> {
    let data_length = cursor.read_length()?;
    let count = cursor.read_length()?;
    let items_start = cursor.position();
    let width = OffsetWidth::for_data_length(data_length);
    let offsets_position = items_start.checked_add(data_length);
    let table_end = offsets_position
        .and_then(|p| count.checked_mul(width.size()).and_then(|n| p.checked_add(n)));
    match (offsets_position, table_end) {
        (Some(offsets_position), Some(end)) if end <= cursor.data().len() => {
            Ok((items_start, count, offsets_position, width))
        }
        _ => Err(HazelcastError::Serialization(format!(
            "array of {} items with {} data bytes exceeds the buffer",
            count, data_length
        ))),
    }
}

fn read_fixed_array<'a, T>(
    cursor: &mut ObjectDataInput<'a>,
    element_size: usize,
    mut read_item: impl FnMut(&mut ObjectDataInput<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    let count = encoding::read_count(cursor, element_size)?;
    (0..count).map(|_| read_item(cursor)).collect()
}

fn read_generic(cursor: &mut ObjectDataInput<'_>, hook: &dyn ObjectHook) -> Result<GenericRecord> {
    downcast(hook.read_object(cursor, Target::Generic)?, "<nested>")
}

/// Decodes a present variable-size value of `kind` at the cursor.
fn read_variable(
    cursor: &mut ObjectDataInput<'_>,
    hook: &dyn ObjectHook,
    kind: FieldKind,
) -> Result<FieldValue> {
    use FieldValue as V;
    Ok(match kind {
        FieldKind::String => V::String(Some(cursor.read_string()?)),
        FieldKind::Decimal => V::Decimal(Some(encoding::read_decimal(cursor)?)),
        FieldKind::Time => V::Time(Some(encoding::read_time(cursor)?)),
        FieldKind::Date => V::Date(Some(encoding::read_date(cursor)?)),
        FieldKind::Timestamp => V::Timestamp(Some(encoding::read_timestamp(cursor)?)),
        FieldKind::TimestampWithTimezone => {
            V::TimestampWithTimezone(Some(encoding::read_timestamp_with_timezone(cursor)?))
        }
        FieldKind::Compact => V::Compact(Some(read_generic(cursor, hook)?)),
        FieldKind::NullableBoolean => V::NullableBoolean(Some(cursor.read_bool()?)),
        FieldKind::NullableInt8 => V::NullableInt8(Some(cursor.read_byte()?)),
        FieldKind::NullableInt16 => V::NullableInt16(Some(cursor.read_short()?)),
        FieldKind::NullableInt32 => V::NullableInt32(Some(cursor.read_int()?)),
        FieldKind::NullableInt64 => V::NullableInt64(Some(cursor.read_long()?)),
        FieldKind::NullableFloat32 => V::NullableFloat32(Some(cursor.read_float()?)),
        FieldKind::NullableFloat64 => V::NullableFloat64(Some(cursor.read_double()?)),
        FieldKind::ArrayOfBoolean => V::ArrayOfBoolean(Some(encoding::read_boolean_bits(cursor)?)),
        FieldKind::ArrayOfInt8 => V::ArrayOfInt8(Some(read_fixed_array(cursor, 1, |c| c.read_byte())?)),
        FieldKind::ArrayOfInt16 => {
            V::ArrayOfInt16(Some(read_fixed_array(cursor, 2, |c| c.read_short())?))
        }
        FieldKind::ArrayOfInt32 => {
            V::ArrayOfInt32(Some(read_fixed_array(cursor, 4, |c| c.read_int())?))
        }
        FieldKind::ArrayOfInt64 => {
            V::ArrayOfInt64(Some(read_fixed_array(cursor, 8, |c| c.read_long())?))
        }
        FieldKind::ArrayOfFloat32 => {
            V::ArrayOfFloat32(Some(read_fixed_array(cursor, 4, |c| c.read_float())?))
        }
        FieldKind::ArrayOfFloat64 => {
            V::ArrayOfFloat64(Some(read_fixed_array(cursor, 8, |c| c.read_double())?))
        }
        FieldKind::ArrayOfString => V::ArrayOfString(Some(read_items(cursor, |c| c.read_string())?)),
        FieldKind::ArrayOfDecimal => {
            V::ArrayOfDecimal(Some(read_items(cursor, |c| encoding::read_decimal(c))?))
        }
        FieldKind::ArrayOfTime => V::ArrayOfTime(Some(read_items(cursor, |c| encoding::read_time(c))?)),
        FieldKind::ArrayOfDate => V::ArrayOfDate(Some(read_items(cursor, |c| encoding::read_date(c))?)),
        FieldKind::ArrayOfTimestamp => {
            V::ArrayOfTimestamp(Some(read_items(cursor, |c| encoding::read_timestamp(c))?))
        }
        FieldKind::ArrayOfTimestampWithTimezone => V::ArrayOfTimestampWithTimezone(Some(
            read_items(cursor, |c| encoding::read_timestamp_with_timezone(c))?,
        )),
        FieldKind::ArrayOfCompact => {
            V::ArrayOfCompact(Some(read_items(cursor, |c| read_generic(c, hook))?))
        }
        FieldKind::ArrayOfNullableBoolean => {
            V::ArrayOfNullableBoolean(Some(read_items(cursor, |c| c.read_bool())?))
        }
        FieldKind::ArrayOfNullableInt8 => {
            V::ArrayOfNullableInt8(Some(read_items(cursor, |c| c.read_byte())?))
        }
        FieldKind::ArrayOfNullableInt16 => {
            V::ArrayOfNullableInt16(Some(read_items(cursor, |c| c.read_short())?))
        }
        FieldKind::ArrayOfNullableInt32 => {
            V::ArrayOfNullableInt32(Some(read_items(cursor, |c| c.read_int())?))
        }
        FieldKind::ArrayOfNullableInt64 => {
            V::ArrayOfNullableInt64(Some(read_items(cursor, |c| c.read_long())?))
        }
        FieldKind::ArrayOfNullableFloat32 => {
            V::ArrayOfNullableFloat32(Some(read_items(cursor, |c| c.read_float())?))
        }
        FieldKind::ArrayOfNullableFloat64 => {
            V::ArrayOfNullableFloat64(Some(read_items(cursor, |c| c.read_double())?))
        }
        FieldKind::Boolean
        | FieldKind::Int8
        | FieldKind::Int16
        | FieldKind::Int32
        | FieldKind::Int64
        | FieldKind::Float32
        | FieldKind::Float64 => {
            return Err(HazelcastError::Serialization(format!(
                "{} is stored in the fixed region",
                kind
            )))
        }
    })
}
