//! Runtime half of the reflection codec.
//!
//! `#[derive(HazelcastCompact)]` describes a struct's members through
//! [`Reflective`] and maps each member type to a field kind through
//! [`CompactField`]. [`ReflectiveSerializer`] turns that description into a
//! [`DynCompactSerializer`].

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::OnceLock;

use crate::error::{HazelcastError, Result};

use super::field_kind::FieldKind;
use super::reader::{BoxedObject, CompactReader};
use super::schema::Schema;
use super::serializer::{wrong_value_type, DynCompactSerializer};
use super::writer::CompactWriter;

/// Maps a member's element type to field kinds and reads/writes it.
///
/// The four shapes of a member of element type `T` are `T`, `Option<T>`,
/// `Vec<T>` (or `Option<Vec<T>>`) and `Vec<Option<T>>` (or
/// `Option<Vec<Option<T>>>`).
pub trait CompactField: Sized + 'static {
    /// Kind of a `T` member.
    const KIND: FieldKind;
    /// Kind of an `Option<T>` member.
    const NULLABLE_KIND: FieldKind;
    /// Kind of a `Vec<T>` member.
    const ARRAY_KIND: FieldKind;
    /// Kind of a `Vec<Option<T>>` member.
    const NULLABLE_ARRAY_KIND: FieldKind;

    /// Writes a `T` member.
    fn write(writer: &mut dyn CompactWriter, name: &str, value: &Self) -> Result<()>;
    /// Writes an `Option<T>` member.
    fn write_nullable(writer: &mut dyn CompactWriter, name: &str, value: Option<&Self>) -> Result<()>;
    /// Writes a `Vec<T>` member.
    fn write_array(writer: &mut dyn CompactWriter, name: &str, value: Option<&[Self]>) -> Result<()>;
    /// Writes a `Vec<Option<T>>` member.
    fn write_nullable_array(
        writer: &mut dyn CompactWriter,
        name: &str,
        value: Option<&[Option<Self>]>,
    ) -> Result<()>;

    /// Reads a `T` member; null fails.
    fn read(reader: &mut dyn CompactReader, name: &str) -> Result<Self>;
    /// Reads an `Option<T>` member.
    fn read_nullable(reader: &mut dyn CompactReader, name: &str) -> Result<Option<Self>>;
    /// Reads a `Vec<T>` member; null items fail.
    fn read_array(reader: &mut dyn CompactReader, name: &str) -> Result<Option<Vec<Self>>>;
    /// Reads a `Vec<Option<T>>` member.
    fn read_nullable_array(
        reader: &mut dyn CompactReader,
        name: &str,
    ) -> Result<Option<Vec<Option<Self>>>>;
}

/// Unwraps a value read for a member that cannot hold null.
pub fn required<T>(value: Option<T>, name: &str) -> Result<T> {
    value.ok_or_else(|| {
        HazelcastError::Serialization(format!("member '{}' cannot be null", name))
    })
}

fn all_required<T>(items: Vec<Option<T>>, name: &str) -> Result<Vec<T>> {
    items
        .into_iter()
        .map(|item| {
            item.ok_or_else(|| {
                HazelcastError::Serialization(format!(
                    "member '{}' cannot hold null elements",
                    name
                ))
            })
        })
        .collect()
}

macro_rules! primitive_field {
    ($ty:ty, [$kind:ident, $nullable:ident, $array:ident, $nullable_array:ident],
     [$w:ident, $wn:ident, $wa:ident, $wna:ident],
     [$r:ident, $rn:ident, $ra:ident, $rna:ident]) => {
        impl CompactField for $ty {
            const KIND: FieldKind = FieldKind::$kind;
            const NULLABLE_KIND: FieldKind = FieldKind::$nullable;
            const ARRAY_KIND: FieldKind = FieldKind::$array;
            const NULLABLE_ARRAY_KIND: FieldKind = FieldKind::$nullable_array;

            fn write(writer: &mut dyn CompactWriter, name: &str, value: &Self) -> Result<()> {
                writer.$w(name, *value)
            }
            fn write_nullable(
                writer: &mut dyn CompactWriter,
                name: &str,
                value: Option<&Self>,
            ) -> Result<()> {
                writer.$wn(name, value.copied())
            }
            fn write_array(
                writer: &mut dyn CompactWriter,
                name: &str,
                value: Option<&[Self]>,
            ) -> Result<()> {
                writer.$wa(name, value)
            }
            fn write_nullable_array(
                writer: &mut dyn CompactWriter,
                name: &str,
                value: Option<&[Option<Self>]>,
            ) -> Result<()> {
                writer.$wna(name, value)
            }
            fn read(reader: &mut dyn CompactReader, name: &str) -> Result<Self> {
                reader.$r(name)
            }
            fn read_nullable(reader: &mut dyn CompactReader, name: &str) -> Result<Option<Self>> {
                reader.$rn(name)
            }
            fn read_array(reader: &mut dyn CompactReader, name: &str) -> Result<Option<Vec<Self>>> {
                reader.$ra(name)
            }
            fn read_nullable_array(
                reader: &mut dyn CompactReader,
                name: &str,
            ) -> Result<Option<Vec<Option<Self>>>> {
                reader.$rna(name)
            }
        }
    };
}

primitive_field!(bool, [Boolean, NullableBoolean, ArrayOfBoolean, ArrayOfNullableBoolean],
    [write_boolean, write_nullable_boolean, write_array_of_boolean, write_array_of_nullable_boolean],
    [read_boolean, read_nullable_boolean, read_array_of_boolean, read_array_of_nullable_boolean]);
primitive_field!(i8, [Int8, NullableInt8, ArrayOfInt8, ArrayOfNullableInt8],
    [write_int8, write_nullable_int8, write_array_of_int8, write_array_of_nullable_int8],
    [read_int8, read_nullable_int8, read_array_of_int8, read_array_of_nullable_int8]);
primitive_field!(i16, [Int16, NullableInt16, ArrayOfInt16, ArrayOfNullableInt16],
    [write_int16, write_nullable_int16, write_array_of_int16, write_array_of_nullable_int16],
    [read_int16, read_nullable_int16, read_array_of_int16, read_array_of_nullable_int16]);
primitive_field!(i32, [Int32, NullableInt32, ArrayOfInt32, ArrayOfNullableInt32],
    [write_int32, write_nullable_int32, write_array_of_int32, write_array_of_nullable_int32],
    [read_int32, read_nullable_int32, read_array_of_int32, read_array_of_nullable_int32]);
primitive_field!(i64, [Int64, NullableInt64, ArrayOfInt64, ArrayOfNullableInt64],
    [write_int64, write_nullable_int64, write_array_of_int64, write_array_of_nullable_int64],
    [read_int64, read_nullable_int64, read_array_of_int64, read_array_of_nullable_int64]);
primitive_field!(f32, [Float32, NullableFloat32, ArrayOfFloat32, ArrayOfNullableFloat32],
    [write_float32, write_nullable_float32, write_array_of_float32, write_array_of_nullable_float32],
    [read_float32, read_nullable_float32, read_array_of_float32, read_array_of_nullable_float32]);
primitive_field!(f64, [Float64, NullableFloat64, ArrayOfFloat64, ArrayOfNullableFloat64],
    [write_float64, write_nullable_float64, write_array_of_float64, write_array_of_nullable_float64],
    [read_float64, read_nullable_float64, read_array_of_float64, read_array_of_nullable_float64]);

/// Variable-size kinds whose values are `Copy`; nullable and plain members
/// share one kind.
macro_rules! value_field {
    ($ty:ty, $kind:ident, $array:ident, $w:ident, $wa:ident, $r:ident, $ra:ident) => {
        impl CompactField for $ty {
            const KIND: FieldKind = FieldKind::$kind;
            const NULLABLE_KIND: FieldKind = FieldKind::$kind;
            const ARRAY_KIND: FieldKind = FieldKind::$array;
            const NULLABLE_ARRAY_KIND: FieldKind = FieldKind::$array;

            fn write(writer: &mut dyn CompactWriter, name: &str, value: &Self) -> Result<()> {
                writer.$w(name, Some(*value))
            }
            fn write_nullable(
                writer: &mut dyn CompactWriter,
                name: &str,
                value: Option<&Self>,
            ) -> Result<()> {
                writer.$w(name, value.copied())
            }
            fn write_array(
                writer: &mut dyn CompactWriter,
                name: &str,
                value: Option<&[Self]>,
            ) -> Result<()> {
                let items: Option<Vec<Option<Self>>> =
                    value.map(|items| items.iter().copied().map(Some).collect());
                writer.$wa(name, items.as_deref())
            }
            fn write_nullable_array(
                writer: &mut dyn CompactWriter,
                name: &str,
                value: Option<&[Option<Self>]>,
            ) -> Result<()> {
                writer.$wa(name, value)
            }
            fn read(reader: &mut dyn CompactReader, name: &str) -> Result<Self> {
                required(reader.$r(name)?, name)
            }
            fn read_nullable(reader: &mut dyn CompactReader, name: &str) -> Result<Option<Self>> {
                reader.$r(name)
            }
            fn read_array(reader: &mut dyn CompactReader, name: &str) -> Result<Option<Vec<Self>>> {
                reader
                    .$ra(name)?
                    .map(|items| all_required(items, name))
                    .transpose()
            }
            fn read_nullable_array(
                reader: &mut dyn CompactReader,
                name: &str,
            ) -> Result<Option<Vec<Option<Self>>>> {
                reader.$ra(name)
            }
        }
    };
}

value_field!(Decimal, Decimal, ArrayOfDecimal, write_decimal, write_array_of_decimal,
    read_decimal, read_array_of_decimal);
value_field!(NaiveTime, Time, ArrayOfTime, write_time, write_array_of_time,
    read_time, read_array_of_time);
value_field!(NaiveDate, Date, ArrayOfDate, write_date, write_array_of_date,
    read_date, read_array_of_date);
value_field!(NaiveDateTime, Timestamp, ArrayOfTimestamp, write_timestamp, write_array_of_timestamp,
    read_timestamp, read_array_of_timestamp);
value_field!(DateTime<FixedOffset>, TimestampWithTimezone, ArrayOfTimestampWithTimezone,
    write_timestamp_with_timezone, write_array_of_timestamp_with_timezone,
    read_timestamp_with_timezone, read_array_of_timestamp_with_timezone);

impl CompactField for String {
    const KIND: FieldKind = FieldKind::String;
    const NULLABLE_KIND: FieldKind = FieldKind::String;
    const ARRAY_KIND: FieldKind = FieldKind::ArrayOfString;
    const NULLABLE_ARRAY_KIND: FieldKind = FieldKind::ArrayOfString;

    fn write(writer: &mut dyn CompactWriter, name: &str, value: &Self) -> Result<()> {
        writer.write_string(name, Some(value))
    }

    fn write_nullable(writer: &mut dyn CompactWriter, name: &str, value: Option<&Self>) -> Result<()> {
        writer.write_string(name, value.map(String::as_str))
    }

    fn write_array(writer: &mut dyn CompactWriter, name: &str, value: Option<&[Self]>) -> Result<()> {
        let items: Option<Vec<Option<&str>>> =
            value.map(|items| items.iter().map(|s| Some(s.as_str())).collect());
        writer.write_array_of_string(name, items.as_deref())
    }

    fn write_nullable_array(
        writer: &mut dyn CompactWriter,
        name: &str,
        value: Option<&[Option<Self>]>,
    ) -> Result<()> {
        let items: Option<Vec<Option<&str>>> =
            value.map(|items| items.iter().map(|s| s.as_deref()).collect());
        writer.write_array_of_string(name, items.as_deref())
    }

    fn read(reader: &mut dyn CompactReader, name: &str) -> Result<Self> {
        required(reader.read_string(name)?, name)
    }

    fn read_nullable(reader: &mut dyn CompactReader, name: &str) -> Result<Option<Self>> {
        reader.read_string(name)
    }

    fn read_array(reader: &mut dyn CompactReader, name: &str) -> Result<Option<Vec<Self>>> {
        reader
            .read_array_of_string(name)?
            .map(|items| all_required(items, name))
            .transpose()
    }

    fn read_nullable_array(
        reader: &mut dyn CompactReader,
        name: &str,
    ) -> Result<Option<Vec<Option<Self>>>> {
        reader.read_array_of_string(name)
    }
}

/// Fieldless enums stored as the variant name.
pub trait CompactEnum: Sized + 'static {
    /// Name of this variant.
    fn variant_name(&self) -> &'static str;

    /// Variant with the given name, if any.
    fn from_variant_name(name: &str) -> Option<Self>;
}

fn parse_variant<E: CompactEnum>(value: &str, name: &str) -> Result<E> {
    E::from_variant_name(value).ok_or_else(|| {
        HazelcastError::Serialization(format!(
            "member '{}' holds unknown variant '{}' of {}",
            name,
            value,
            std::any::type_name::<E>()
        ))
    })
}

/// Helpers behind the `CompactField` impl generated for fieldless enums.
#[doc(hidden)]
pub mod enum_field {
    use super::*;

    pub fn write_nullable<E: CompactEnum>(
        writer: &mut dyn CompactWriter,
        name: &str,
        value: Option<&E>,
    ) -> Result<()> {
        writer.write_string(name, value.map(E::variant_name))
    }

    pub fn write_nullable_array<E: CompactEnum>(
        writer: &mut dyn CompactWriter,
        name: &str,
        value: Option<&[Option<E>]>,
    ) -> Result<()> {
        let items: Option<Vec<Option<&str>>> = value.map(|items| {
            items
                .iter()
                .map(|v| v.as_ref().map(E::variant_name))
                .collect()
        });
        writer.write_array_of_string(name, items.as_deref())
    }

    pub fn write_array<E: CompactEnum>(
        writer: &mut dyn CompactWriter,
        name: &str,
        value: Option<&[E]>,
    ) -> Result<()> {
        let items: Option<Vec<Option<&str>>> =
            value.map(|items| items.iter().map(|v| Some(v.variant_name())).collect());
        writer.write_array_of_string(name, items.as_deref())
    }

    pub fn read_nullable<E: CompactEnum>(
        reader: &mut dyn CompactReader,
        name: &str,
    ) -> Result<Option<E>> {
        reader
            .read_string(name)?
            .map(|v| parse_variant(&v, name))
            .transpose()
    }

    pub fn read_nullable_array<E: CompactEnum>(
        reader: &mut dyn CompactReader,
        name: &str,
    ) -> Result<Option<Vec<Option<E>>>> {
        let Some(items) = reader.read_array_of_string(name)? else {
            return Ok(None);
        };
        items
            .into_iter()
            .map(|item| item.map(|v| parse_variant(&v, name)).transpose())
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    pub fn read_array<E: CompactEnum>(
        reader: &mut dyn CompactReader,
        name: &str,
    ) -> Result<Option<Vec<E>>> {
        read_nullable_array(reader, name)?
            .map(|items| all_required(items, name))
            .transpose()
    }
}

/// Helpers behind the `CompactField` impl generated for derived structs.
#[doc(hidden)]
pub mod nested_field {
    use super::*;

    pub fn write_nullable<T: Any>(
        writer: &mut dyn CompactWriter,
        name: &str,
        value: Option<&T>,
    ) -> Result<()> {
        writer.write_compact(name, value)
    }

    pub fn write_array<T: Any>(
        writer: &mut dyn CompactWriter,
        name: &str,
        value: Option<&[T]>,
    ) -> Result<()> {
        let items: Option<Vec<Option<&dyn Any>>> =
            value.map(|items| items.iter().map(|v| Some(v as &dyn Any)).collect());
        writer.write_array_of_compact_dyn(name, items.as_deref())
    }

    pub fn write_nullable_array<T: Any>(
        writer: &mut dyn CompactWriter,
        name: &str,
        value: Option<&[Option<T>]>,
    ) -> Result<()> {
        writer.write_array_of_compact(name, value)
    }

    pub fn read_nullable<T: Any + Send + Sync>(
        reader: &mut dyn CompactReader,
        name: &str,
    ) -> Result<Option<T>> {
        reader.read_compact(name)
    }

    pub fn read_nullable_array<T: Any + Send + Sync>(
        reader: &mut dyn CompactReader,
        name: &str,
    ) -> Result<Option<Vec<Option<T>>>> {
        reader.read_array_of_compact(name)
    }

    pub fn read_array<T: Any + Send + Sync>(
        reader: &mut dyn CompactReader,
        name: &str,
    ) -> Result<Option<Vec<T>>> {
        reader
            .read_array_of_compact(name)?
            .map(|items| all_required(items, name))
            .transpose()
    }
}

/// Implements [`CompactField`] for a derived struct (as `COMPACT`) or a
/// fieldless enum (as `STRING`).
#[doc(hidden)]
#[macro_export]
macro_rules! __compact_field {
    (@impl $ty:ty, $helpers:ident, $kind:ident, $array:ident) => {
        impl $crate::CompactField for $ty {
            const KIND: $crate::FieldKind = $crate::FieldKind::$kind;
            const NULLABLE_KIND: $crate::FieldKind = $crate::FieldKind::$kind;
            const ARRAY_KIND: $crate::FieldKind = $crate::FieldKind::$array;
            const NULLABLE_ARRAY_KIND: $crate::FieldKind = $crate::FieldKind::$array;

            fn write(
                writer: &mut dyn $crate::CompactWriter,
                name: &str,
                value: &Self,
            ) -> $crate::Result<()> {
                $crate::reflection::$helpers::write_nullable(writer, name, Some(value))
            }
            fn write_nullable(
                writer: &mut dyn $crate::CompactWriter,
                name: &str,
                value: Option<&Self>,
            ) -> $crate::Result<()> {
                $crate::reflection::$helpers::write_nullable(writer, name, value)
            }
            fn write_array(
                writer: &mut dyn $crate::CompactWriter,
                name: &str,
                value: Option<&[Self]>,
            ) -> $crate::Result<()> {
                $crate::reflection::$helpers::write_array(writer, name, value)
            }
            fn write_nullable_array(
                writer: &mut dyn $crate::CompactWriter,
                name: &str,
                value: Option<&[Option<Self>]>,
            ) -> $crate::Result<()> {
                $crate::reflection::$helpers::write_nullable_array(writer, name, value)
            }
            fn read(reader: &mut dyn $crate::CompactReader, name: &str) -> $crate::Result<Self> {
                $crate::reflection::required(
                    $crate::reflection::$helpers::read_nullable(reader, name)?,
                    name,
                )
            }
            fn read_nullable(
                reader: &mut dyn $crate::CompactReader,
                name: &str,
            ) -> $crate::Result<Option<Self>> {
                $crate::reflection::$helpers::read_nullable(reader, name)
            }
            fn read_array(
                reader: &mut dyn $crate::CompactReader,
                name: &str,
            ) -> $crate::Result<Option<Vec<Self>>> {
                $crate::reflection::$helpers::read_array(reader, name)
            }
            fn read_nullable_array(
                reader: &mut dyn $crate::CompactReader,
                name: &str,
            ) -> $crate::Result<Option<Vec<Option<Self>>>> {
                $crate::reflection::$helpers::read_nullable_array(reader, name)
            }
        }
    };
    (struct $ty:ty) => {
        $crate::__compact_field!(@impl $ty, nested_field, Compact, ArrayOfCompact);
    };
    (enum $ty:ty) => {
        $crate::__compact_field!(@impl $ty, enum_field, String, ArrayOfString);
    };
}

/// One member of a reflectively serialized struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    /// Field name in the schema.
    pub name: &'static str,
    /// Field kind in the schema.
    pub kind: FieldKind,
}

/// A way of creating a value from some of its members.
///
/// `params` names the members the constructor consumes; every other member
/// is assigned afterwards through [`Reflective::read_member`].
pub struct Constructor<T> {
    /// Names of the members passed to the constructor.
    pub params: &'static [&'static str],
    /// Reads the parameters and builds the value.
    pub construct: fn(&mut dyn CompactReader) -> Result<T>,
}

impl<T> Clone for Constructor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Constructor<T> {}

impl<T> fmt::Debug for Constructor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .finish()
    }
}

/// Compile-time description of a struct handled by the reflection codec.
///
/// Usually implemented with `#[derive(HazelcastCompact)]`.
pub trait Reflective: Any + Send + Sync + Sized {
    /// Type name stored in the schema.
    const TYPE_NAME: &'static str;

    /// Members in declaration order.
    const MEMBERS: &'static [Member];

    /// Writes every member in declaration order.
    fn write_members(&self, writer: &mut dyn CompactWriter) -> Result<()>;

    /// Candidate constructors, in declaration order.
    fn constructors() -> Vec<Constructor<Self>>;

    /// Reads one member into an already constructed value.
    fn read_member(&mut self, name: &str, reader: &mut dyn CompactReader) -> Result<()>;

    /// Schema built from [`MEMBERS`](Self::MEMBERS).
    fn schema() -> Result<Schema> {
        Schema::new(Self::TYPE_NAME, Self::MEMBERS.iter().map(|m| (m.name, m.kind)))
    }
}

fn is_member<T: Reflective>(param: &str) -> bool {
    let param = param.to_lowercase();
    T::MEMBERS.iter().any(|m| m.name.to_lowercase() == param)
}

/// Picks the constructor used to read `T`.
///
/// A zero-argument constructor wins. Otherwise the one with the most
/// parameters whose names all match members (ignoring case) is used; the
/// first declared wins a tie.
pub fn select_constructor<T: Reflective>() -> Result<Constructor<T>> {
    let candidates = T::constructors();
    if let Some(zero) = candidates.iter().find(|c| c.params.is_empty()) {
        return Ok(*zero);
    }
    candidates
        .iter()
        .filter(|c| c.params.iter().all(|p| is_member::<T>(p)))
        .fold(None::<&Constructor<T>>, |best, c| match best {
            Some(b) if b.params.len() >= c.params.len() => Some(b),
            _ => Some(c),
        })
        .copied()
        .ok_or_else(|| {
            HazelcastError::Serialization(format!(
                "type '{}' has no constructor whose parameters all match its members",
                T::TYPE_NAME
            ))
        })
}

/// Serializer driven by a [`Reflective`] implementation.
pub struct ReflectiveSerializer<T: Reflective> {
    type_name: String,
    constructor: OnceLock<std::result::Result<Constructor<T>, String>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Reflective> ReflectiveSerializer<T> {
    /// Uses the type's declared type name.
    pub fn new() -> Self {
        Self::named(T::TYPE_NAME)
    }

    /// Stores the type under a different type name.
    pub fn named(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            constructor: OnceLock::new(),
            _marker: PhantomData,
        }
    }

    fn constructor(&self) -> Result<Constructor<T>> {
        let choice = self.constructor.get_or_init(|| {
            let choice = select_constructor::<T>().map_err(|e| e.to_string());
            if let Ok(c) = &choice {
                tracing::debug!(
                    type_name = %self.type_name,
                    params = c.params.len(),
                    "selected constructor"
                );
            }
            choice
        });
        choice
            .as_ref()
            .copied()
            .map_err(|e| HazelcastError::Serialization(e.clone()))
    }
}

impl<T: Reflective> Default for ReflectiveSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Reflective> DynCompactSerializer for ReflectiveSerializer<T> {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn write(&self, writer: &mut dyn CompactWriter, value: &dyn Any) -> Result<()> {
        value
            .downcast_ref::<T>()
            .ok_or_else(|| wrong_value_type::<T>(&self.type_name))?
            .write_members(writer)
    }

    fn schema(&self) -> Result<Option<Schema>> {
        let fields = T::MEMBERS.iter().map(|m| (m.name, m.kind));
        Schema::new(self.type_name.as_str(), fields).map(Some)
    }

    fn read(&self, reader: &mut dyn CompactReader) -> Result<BoxedObject> {
        let constructor = self.constructor()?;
        let mut value = (constructor.construct)(reader)?;
        for member in T::MEMBERS {
            let consumed = constructor
                .params
                .iter()
                .any(|p| p.to_lowercase() == member.name.to_lowercase());
            if !consumed {
                value.read_member(member.name, reader)?;
            }
        }
        Ok(Box::new(value))
    }

    fn is_reflective(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT_MEMBERS: &[Member] = &[
        Member { name: "id", kind: <i64 as CompactField>::KIND },
        Member { name: "owner", kind: <String as CompactField>::KIND },
        Member { name: "limit", kind: <i32 as CompactField>::NULLABLE_KIND },
    ];

    macro_rules! account_like {
        ($name:ident, $($ctor:expr),* $(,)?) => {
            struct $name;
            impl Reflective for $name {
                const TYPE_NAME: &'static str = "Account";
                const MEMBERS: &'static [Member] = ACCOUNT_MEMBERS;
                fn write_members(&self, _writer: &mut dyn CompactWriter) -> Result<()> {
                    Ok(())
                }
                fn constructors() -> Vec<Constructor<Self>> {
                    vec![$($ctor),*]
                }
                fn read_member(&mut self, _name: &str, _reader: &mut dyn CompactReader) -> Result<()> {
                    Ok(())
                }
            }
        };
    }

    fn none(_: &mut dyn CompactReader) -> Result<ZeroWins> {
        Ok(ZeroWins)
    }
    fn none_most(_: &mut dyn CompactReader) -> Result<MostParams> {
        Ok(MostParams)
    }
    fn none_unusable(_: &mut dyn CompactReader) -> Result<Unusable> {
        Ok(Unusable)
    }

    account_like!(
        ZeroWins,
        Constructor { params: &["id", "owner", "limit"], construct: none },
        Constructor { params: &[], construct: none },
    );
    account_like!(
        MostParams,
        Constructor { params: &["id"], construct: none_most },
        Constructor { params: &["ID", "Owner"], construct: none_most },
        Constructor { params: &["id", "owner", "balance"], construct: none_most },
        Constructor { params: &["owner", "limit"], construct: none_most },
    );
    account_like!(
        Unusable,
        Constructor { params: &["balance"], construct: none_unusable },
    );

    #[test]
    fn test_zero_argument_constructor_wins() {
        assert!(select_constructor::<ZeroWins>().unwrap().params.is_empty());
    }

    #[test]
    fn test_most_matching_parameters_win() {
        let chosen = select_constructor::<MostParams>().unwrap();
        assert_eq!(chosen.params, &["ID", "Owner"]);
    }

    #[test]
    fn test_no_usable_constructor() {
        let err = select_constructor::<Unusable>().unwrap_err();
        assert!(err.to_string().contains("no constructor"));
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(<bool as CompactField>::ARRAY_KIND, FieldKind::ArrayOfBoolean);
        assert_eq!(<i16 as CompactField>::NULLABLE_ARRAY_KIND, FieldKind::ArrayOfNullableInt16);
        assert_eq!(<String as CompactField>::NULLABLE_KIND, FieldKind::String);
        assert_eq!(<Decimal as CompactField>::ARRAY_KIND, FieldKind::ArrayOfDecimal);
        assert_eq!(
            <DateTime<FixedOffset> as CompactField>::NULLABLE_ARRAY_KIND,
            FieldKind::ArrayOfTimestampWithTimezone
        );
    }

    #[test]
    fn test_schema_from_members() {
        let schema = ZeroWins::schema().unwrap();
        assert_eq!(schema.type_name(), "Account");
        assert_eq!(schema.field("limit").unwrap().kind(), FieldKind::NullableInt32);
    }

    #[test]
    fn test_reflective_serializer_is_flagged() {
        let serializer = ReflectiveSerializer::<ZeroWins>::new();
        assert!(serializer.is_reflective());
        assert_eq!(serializer.type_name(), "Account");
        assert_eq!(ReflectiveSerializer::<ZeroWins>::named("Other").type_name(), "Other");
    }
}
