//! Schema-bound, type-erased records and their builders.

use crate::error::{HazelcastError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::collections::HashSet;

use super::field_kind::FieldKind;
use super::reader::CompactReader;
use super::schema::Schema;
use super::value::{coerce, kind_mismatch, FieldValue};
use super::writer::{unknown_field, CompactWriter};

macro_rules! typed_getters {
    ($(($method:ident, $variant:ident, $ty:ty)),+ $(,)?) => {
        $(
            #[doc = concat!("Gets a field as `", stringify!($variant), "`.")]
            pub fn $method(&self, name: &str) -> Result<$ty> {
                match self.read(name, FieldKind::$variant)? {
                    FieldValue::$variant(v) => Ok(v),
                    other => Err(kind_mismatch(name, other.kind(), FieldKind::$variant)),
                }
            }
        )+
    };
}

macro_rules! typed_setters {
    ($(($method:ident, $variant:ident, $ty:ty)),+ $(,)?) => {
        $(
            #[doc = concat!("Sets a `", stringify!($variant), "` field.")]
            pub fn $method(self, name: &str, value: $ty) -> Result<Self> {
                self.set(name, FieldValue::$variant(value))
            }
        )+
    };
}

/// A decoded compact object whose type is not known at compile time.
///
/// Values are held in the schema's field order. Records are immutable; use
/// [`to_builder`](Self::to_builder) to derive a modified copy.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericRecord {
    schema: Schema,
    values: Vec<FieldValue>,
}

impl GenericRecord {
    /// Starts a builder that must set every field of `schema` exactly once.
    pub fn builder(schema: Schema) -> GenericRecordBuilder {
        let values = vec![None; schema.field_count()];
        GenericRecordBuilder {
            mode: Mode::Bound { schema, values },
        }
    }

    /// Starts a builder that infers the schema from the fields set.
    pub fn compact(type_name: impl Into<String>) -> GenericRecordBuilder {
        GenericRecordBuilder {
            mode: Mode::Inferred {
                type_name: type_name.into(),
                names: HashSet::new(),
                fields: Vec::new(),
            },
        }
    }

    /// Returns a builder pre-filled with this record's values. Each field may
    /// be overwritten at most once.
    pub fn to_builder(&self) -> GenericRecordBuilder {
        GenericRecordBuilder {
            mode: Mode::Cloning {
                schema: self.schema.clone(),
                values: self.values.clone(),
                overwritten: vec![false; self.values.len()],
            },
        }
    }

    /// Reads every field of the reader's schema.
    pub fn read_from(reader: &mut dyn CompactReader) -> Result<Self> {
        let schema = reader.schema().clone();
        let values = schema
            .fields()
            .iter()
            .map(|field| reader.read_field(field.name(), field.kind()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { schema, values })
    }

    /// Writes every field through `writer`.
    pub fn write_to(&self, writer: &mut dyn CompactWriter) -> Result<()> {
        for (field, value) in self.schema.fields().iter().zip(&self.values) {
            value.write_to(field.name(), writer)?;
        }
        Ok(())
    }

    /// Returns the schema the record was built or read with.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the schema's type name.
    pub fn type_name(&self) -> &str {
        self.schema.type_name()
    }

    /// Returns true if the schema has the field, ignoring case.
    pub fn has_field(&self, name: &str) -> bool {
        self.schema.has_field(name)
    }

    /// Returns the declared kind of a field, if present.
    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.schema.field(name).map(|f| f.kind())
    }

    /// Field names in the schema's canonical order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.schema.fields().iter().map(|f| f.name())
    }

    /// Returns the stored value of a field without conversion.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.schema.position(name).map(|i| &self.values[i])
    }

    /// Reads a field as `kind`, with the same nullable widening as a
    /// [`CompactReader`].
    pub fn read(&self, name: &str, kind: FieldKind) -> Result<FieldValue> {
        let position = self
            .schema
            .position(name)
            .ok_or_else(|| unknown_field(&self.schema, name))?;
        let declared = self.schema.fields()[position].kind();
        if !declared.is_readable_as(kind) {
            return Err(kind_mismatch(name, declared, kind));
        }
        coerce(self.values[position].clone(), kind, name)
    }

    typed_getters! {
        (get_boolean, Boolean, bool),
        (get_int8, Int8, i8),
        (get_int16, Int16, i16),
        (get_int32, Int32, i32),
        (get_int64, Int64, i64),
        (get_float32, Float32, f32),
        (get_float64, Float64, f64),
        (get_string, String, Option<String>),
        (get_decimal, Decimal, Option<Decimal>),
        (get_time, Time, Option<NaiveTime>),
        (get_date, Date, Option<NaiveDate>),
        (get_timestamp, Timestamp, Option<NaiveDateTime>),
        (get_timestamp_with_timezone, TimestampWithTimezone, Option<DateTime<FixedOffset>>),
        (get_generic_record, Compact, Option<GenericRecord>),
        (get_array_of_boolean, ArrayOfBoolean, Option<Vec<bool>>),
        (get_array_of_int8, ArrayOfInt8, Option<Vec<i8>>),
        (get_array_of_int16, ArrayOfInt16, Option<Vec<i16>>),
        (get_array_of_int32, ArrayOfInt32, Option<Vec<i32>>),
        (get_array_of_int64, ArrayOfInt64, Option<Vec<i64>>),
        (get_array_of_float32, ArrayOfFloat32, Option<Vec<f32>>),
        (get_array_of_float64, ArrayOfFloat64, Option<Vec<f64>>),
        (get_array_of_string, ArrayOfString, Option<Vec<Option<String>>>),
        (get_array_of_decimal, ArrayOfDecimal, Option<Vec<Option<Decimal>>>),
        (get_array_of_time, ArrayOfTime, Option<Vec<Option<NaiveTime>>>),
        (get_array_of_date, ArrayOfDate, Option<Vec<Option<NaiveDate>>>),
        (get_array_of_timestamp, ArrayOfTimestamp, Option<Vec<Option<NaiveDateTime>>>),
        (
            get_array_of_timestamp_with_timezone,
            ArrayOfTimestampWithTimezone,
            Option<Vec<Option<DateTime<FixedOffset>>>>
        ),
        (get_array_of_generic_record, ArrayOfCompact, Option<Vec<Option<GenericRecord>>>),
        (get_nullable_boolean, NullableBoolean, Option<bool>),
        (get_nullable_int8, NullableInt8, Option<i8>),
        (get_nullable_int16, NullableInt16, Option<i16>),
        (get_nullable_int32, NullableInt32, Option<i32>),
        (get_nullable_int64, NullableInt64, Option<i64>),
        (get_nullable_float32, NullableFloat32, Option<f32>),
        (get_nullable_float64, NullableFloat64, Option<f64>),
        (get_array_of_nullable_boolean, ArrayOfNullableBoolean, Option<Vec<Option<bool>>>),
        (get_array_of_nullable_int8, ArrayOfNullableInt8, Option<Vec<Option<i8>>>),
        (get_array_of_nullable_int16, ArrayOfNullableInt16, Option<Vec<Option<i16>>>),
        (get_array_of_nullable_int32, ArrayOfNullableInt32, Option<Vec<Option<i32>>>),
        (get_array_of_nullable_int64, ArrayOfNullableInt64, Option<Vec<Option<i64>>>),
        (get_array_of_nullable_float32, ArrayOfNullableFloat32, Option<Vec<Option<f32>>>),
        (get_array_of_nullable_float64, ArrayOfNullableFloat64, Option<Vec<Option<f64>>>),
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Bound {
        schema: Schema,
        values: Vec<Option<FieldValue>>,
    },
    Cloning {
        schema: Schema,
        values: Vec<FieldValue>,
        overwritten: Vec<bool>,
    },
    Inferred {
        type_name: String,
        names: HashSet<String>,
        fields: Vec<(String, FieldValue)>,
    },
}

/// Builds a [`GenericRecord`].
///
/// Setters consume the builder and fail on an unknown name, a kind other
/// than the declared one, or a second set of the same field.
#[derive(Debug, Clone)]
pub struct GenericRecordBuilder {
    mode: Mode,
}

fn already_set(name: &str) -> HazelcastError {
    HazelcastError::Serialization(format!("field '{}' can only be set once", name))
}

fn check_same_schema(name: &str, items: &[Option<GenericRecord>]) -> Result<()> {
    let mut ids = items.iter().flatten().map(|r| r.schema().id());
    if let Some(first) = ids.next() {
        if ids.any(|id| id != first) {
            return Err(HazelcastError::Serialization(format!(
                "array field '{}' mixes records of different schemas",
                name
            )));
        }
    }
    Ok(())
}

fn check_kind(schema: &Schema, name: &str, value: &FieldValue) -> Result<usize> {
    let position = schema
        .position(name)
        .ok_or_else(|| unknown_field(schema, name))?;
    let declared = schema.fields()[position].kind();
    if declared != value.kind() {
        return Err(kind_mismatch(name, declared, value.kind()));
    }
    Ok(position)
}

impl GenericRecordBuilder {
    /// Sets one field.
    pub fn set(mut self, name: &str, value: FieldValue) -> Result<Self> {
        if let FieldValue::ArrayOfCompact(Some(items)) = &value {
            check_same_schema(name, items)?;
        }
        match &mut self.mode {
            Mode::Bound { schema, values } => {
                let position = check_kind(schema, name, &value)?;
                if values[position].is_some() {
                    return Err(already_set(name));
                }
                values[position] = Some(value);
            }
            Mode::Cloning {
                schema,
                values,
                overwritten,
            } => {
                let position = check_kind(schema, name, &value)?;
                if overwritten[position] {
                    return Err(already_set(name));
                }
                values[position] = value;
                overwritten[position] = true;
            }
            Mode::Inferred { names, fields, .. } => {
                if !names.insert(name.to_lowercase()) {
                    return Err(already_set(name));
                }
                fields.push((name.to_string(), value));
            }
        }
        Ok(self)
    }

    typed_setters! {
        (set_boolean, Boolean, bool),
        (set_int8, Int8, i8),
        (set_int16, Int16, i16),
        (set_int32, Int32, i32),
        (set_int64, Int64, i64),
        (set_float32, Float32, f32),
        (set_float64, Float64, f64),
        (set_string, String, Option<String>),
        (set_decimal, Decimal, Option<Decimal>),
        (set_time, Time, Option<NaiveTime>),
        (set_date, Date, Option<NaiveDate>),
        (set_timestamp, Timestamp, Option<NaiveDateTime>),
        (set_timestamp_with_timezone, TimestampWithTimezone, Option<DateTime<FixedOffset>>),
        (set_generic_record, Compact, Option<GenericRecord>),
        (set_array_of_boolean, ArrayOfBoolean, Option<Vec<bool>>),
        (set_array_of_int8, ArrayOfInt8, Option<Vec<i8>>),
        (set_array_of_int16, ArrayOfInt16, Option<Vec<i16>>),
        (set_array_of_int32, ArrayOfInt32, Option<Vec<i32>>),
        (set_array_of_int64, ArrayOfInt64, Option<Vec<i64>>),
        (set_array_of_float32, ArrayOfFloat32, Option<Vec<f32>>),
        (set_array_of_float64, ArrayOfFloat64, Option<Vec<f64>>),
        (set_array_of_string, ArrayOfString, Option<Vec<Option<String>>>),
        (set_array_of_decimal, ArrayOfDecimal, Option<Vec<Option<Decimal>>>),
        (set_array_of_time, ArrayOfTime, Option<Vec<Option<NaiveTime>>>),
        (set_array_of_date, ArrayOfDate, Option<Vec<Option<NaiveDate>>>),
        (set_array_of_timestamp, ArrayOfTimestamp, Option<Vec<Option<NaiveDateTime>>>),
        (
            set_array_of_timestamp_with_timezone,
            ArrayOfTimestampWithTimezone,
            Option<Vec<Option<DateTime<FixedOffset>>>>
        ),
        (set_array_of_generic_record, ArrayOfCompact, Option<Vec<Option<GenericRecord>>>),
        (set_nullable_boolean, NullableBoolean, Option<bool>),
        (set_nullable_int8, NullableInt8, Option<i8>),
        (set_nullable_int16, NullableInt16, Option<i16>),
        (set_nullable_int32, NullableInt32, Option<i32>),
        (set_nullable_int64, NullableInt64, Option<i64>),
        (set_nullable_float32, NullableFloat32, Option<f32>),
        (set_nullable_float64, NullableFloat64, Option<f64>),
        (set_array_of_nullable_boolean, ArrayOfNullableBoolean, Option<Vec<Option<bool>>>),
        (set_array_of_nullable_int8, ArrayOfNullableInt8, Option<Vec<Option<i8>>>),
        (set_array_of_nullable_int16, ArrayOfNullableInt16, Option<Vec<Option<i16>>>),
        (set_array_of_nullable_int32, ArrayOfNullableInt32, Option<Vec<Option<i32>>>),
        (set_array_of_nullable_int64, ArrayOfNullableInt64, Option<Vec<Option<i64>>>),
        (set_array_of_nullable_float32, ArrayOfNullableFloat32, Option<Vec<Option<f32>>>),
        (set_array_of_nullable_float64, ArrayOfNullableFloat64, Option<Vec<Option<f64>>>),
    }

    /// Finishes the record.
    ///
    /// A schema-bound builder fails if any field was left unset.
    pub fn build(self) -> Result<GenericRecord> {
        match self.mode {
            Mode::Bound { schema, values } => {
                let values = values
                    .into_iter()
                    .zip(schema.fields())
                    .map(|(value, field)| {
                        value.ok_or_else(|| {
                            HazelcastError::Serialization(format!(
                                "field '{}' of '{}' was not set",
                                field.name(),
                                schema.type_name()
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(GenericRecord { schema, values })
            }
            Mode::Cloning { schema, values, .. } => Ok(GenericRecord { schema, values }),
            Mode::Inferred {
                type_name, fields, ..
            } => {
                let schema = Schema::new(
                    type_name,
                    fields.iter().map(|(name, value)| (name.as_str(), value.kind())),
                )?;
                let mut slots: Vec<Option<FieldValue>> = vec![None; fields.len()];
                for (name, value) in fields {
                    if let Some(position) = schema.position(&name) {
                        slots[position] = Some(value);
                    }
                }
                let values = slots.into_iter().flatten().collect();
                Ok(GenericRecord { schema, values })
            }
        }
    }
}
