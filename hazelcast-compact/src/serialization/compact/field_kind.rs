//! Field kinds and their wire ids.

use crate::error::{HazelcastError, Result};
use std::fmt;

macro_rules! field_kinds {
    ($($variant:ident = $id:literal => $name:literal,)+) => {
        /// The storage shape of a compact field.
        ///
        /// Discriminants are the wire ids shared with the other Hazelcast
        /// clients; they take part in schema fingerprints and must never change.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(
            feature = "serde",
            derive(serde::Serialize, serde::Deserialize),
            serde(rename_all = "SCREAMING_SNAKE_CASE")
        )]
        #[repr(i32)]
        pub enum FieldKind {
            $(
                #[doc = $name]
                $variant = $id,
            )+
        }

        impl FieldKind {
            /// Every supported kind, in wire id order.
            pub const ALL: &'static [FieldKind] = &[$(FieldKind::$variant,)+];

            /// Resolves a wire id. Ids reserved for kinds this engine does not
            /// support (0, 5, 6, 31, 32) are rejected.
            pub fn from_id(id: i32) -> Result<Self> {
                match id {
                    $($id => Ok(Self::$variant),)+
                    _ => Err(HazelcastError::Serialization(format!(
                        "unsupported field kind id: {}",
                        id
                    ))),
                }
            }

            /// Returns the symbolic name, e.g. `"ARRAY_OF_NULLABLE_INT32"`.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }
    };
}

field_kinds! {
    Boolean = 1 => "BOOLEAN",
    ArrayOfBoolean = 2 => "ARRAY_OF_BOOLEAN",
    Int8 = 3 => "INT8",
    ArrayOfInt8 = 4 => "ARRAY_OF_INT8",
    Int16 = 7 => "INT16",
    ArrayOfInt16 = 8 => "ARRAY_OF_INT16",
    Int32 = 9 => "INT32",
    ArrayOfInt32 = 10 => "ARRAY_OF_INT32",
    Int64 = 11 => "INT64",
    ArrayOfInt64 = 12 => "ARRAY_OF_INT64",
    Float32 = 13 => "FLOAT32",
    ArrayOfFloat32 = 14 => "ARRAY_OF_FLOAT32",
    Float64 = 15 => "FLOAT64",
    ArrayOfFloat64 = 16 => "ARRAY_OF_FLOAT64",
    String = 17 => "STRING",
    ArrayOfString = 18 => "ARRAY_OF_STRING",
    Decimal = 19 => "DECIMAL",
    ArrayOfDecimal = 20 => "ARRAY_OF_DECIMAL",
    Time = 21 => "TIME",
    ArrayOfTime = 22 => "ARRAY_OF_TIME",
    Date = 23 => "DATE",
    ArrayOfDate = 24 => "ARRAY_OF_DATE",
    Timestamp = 25 => "TIMESTAMP",
    ArrayOfTimestamp = 26 => "ARRAY_OF_TIMESTAMP",
    TimestampWithTimezone = 27 => "TIMESTAMP_WITH_TIMEZONE",
    ArrayOfTimestampWithTimezone = 28 => "ARRAY_OF_TIMESTAMP_WITH_TIMEZONE",
    Compact = 29 => "COMPACT",
    ArrayOfCompact = 30 => "ARRAY_OF_COMPACT",
    NullableBoolean = 33 => "NULLABLE_BOOLEAN",
    ArrayOfNullableBoolean = 34 => "ARRAY_OF_NULLABLE_BOOLEAN",
    NullableInt8 = 35 => "NULLABLE_INT8",
    ArrayOfNullableInt8 = 36 => "ARRAY_OF_NULLABLE_INT8",
    NullableInt16 = 37 => "NULLABLE_INT16",
    ArrayOfNullableInt16 = 38 => "ARRAY_OF_NULLABLE_INT16",
    NullableInt32 = 39 => "NULLABLE_INT32",
    ArrayOfNullableInt32 = 40 => "ARRAY_OF_NULLABLE_INT32",
    NullableInt64 = 41 => "NULLABLE_INT64",
    ArrayOfNullableInt64 = 42 => "ARRAY_OF_NULLABLE_INT64",
    NullableFloat32 = 43 => "NULLABLE_FLOAT32",
    ArrayOfNullableFloat32 = 44 => "ARRAY_OF_NULLABLE_FLOAT32",
    NullableFloat64 = 45 => "NULLABLE_FLOAT64",
    ArrayOfNullableFloat64 = 46 => "ARRAY_OF_NULLABLE_FLOAT64",
}

impl FieldKind {
    /// Returns the wire id.
    pub fn id(&self) -> i32 {
        *self as i32
    }

    /// Size in bytes of a fixed-region field of this kind.
    ///
    /// `None` for booleans, which are bit-packed, and for every
    /// variable-size kind.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::Int8 => Some(1),
            Self::Int16 => Some(2),
            Self::Int32 | Self::Float32 => Some(4),
            Self::Int64 | Self::Float64 => Some(8),
            _ => None,
        }
    }

    /// Returns true for kinds stored in the offset-addressed variable region.
    pub fn is_variable_size(&self) -> bool {
        *self != Self::Boolean && self.fixed_size().is_none()
    }

    /// Returns true for the nullable scalar kinds and arrays of them.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            Self::NullableBoolean
                | Self::NullableInt8
                | Self::NullableInt16
                | Self::NullableInt32
                | Self::NullableInt64
                | Self::NullableFloat32
                | Self::NullableFloat64
                | Self::ArrayOfNullableBoolean
                | Self::ArrayOfNullableInt8
                | Self::ArrayOfNullableInt16
                | Self::ArrayOfNullableInt32
                | Self::ArrayOfNullableInt64
                | Self::ArrayOfNullableFloat32
                | Self::ArrayOfNullableFloat64
        )
    }

    /// Returns true for every `ARRAY_OF_*` kind.
    pub fn is_array(&self) -> bool {
        self.name().starts_with("ARRAY_OF_")
    }

    /// Returns true for kinds that hold nested compact values.
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Compact | Self::ArrayOfCompact)
    }

    /// Maps a fixed-size primitive kind (or array of one) to its nullable
    /// counterpart.
    pub fn to_nullable(&self) -> Option<FieldKind> {
        Some(match self {
            Self::Boolean => Self::NullableBoolean,
            Self::Int8 => Self::NullableInt8,
            Self::Int16 => Self::NullableInt16,
            Self::Int32 => Self::NullableInt32,
            Self::Int64 => Self::NullableInt64,
            Self::Float32 => Self::NullableFloat32,
            Self::Float64 => Self::NullableFloat64,
            Self::ArrayOfBoolean => Self::ArrayOfNullableBoolean,
            Self::ArrayOfInt8 => Self::ArrayOfNullableInt8,
            Self::ArrayOfInt16 => Self::ArrayOfNullableInt16,
            Self::ArrayOfInt32 => Self::ArrayOfNullableInt32,
            Self::ArrayOfInt64 => Self::ArrayOfNullableInt64,
            Self::ArrayOfFloat32 => Self::ArrayOfNullableFloat32,
            Self::ArrayOfFloat64 => Self::ArrayOfNullableFloat64,
            _ => return None,
        })
    }

    /// Inverse of [`to_nullable`](Self::to_nullable).
    pub fn to_non_nullable(&self) -> Option<FieldKind> {
        Some(match self {
            Self::NullableBoolean => Self::Boolean,
            Self::NullableInt8 => Self::Int8,
            Self::NullableInt16 => Self::Int16,
            Self::NullableInt32 => Self::Int32,
            Self::NullableInt64 => Self::Int64,
            Self::NullableFloat32 => Self::Float32,
            Self::NullableFloat64 => Self::Float64,
            Self::ArrayOfNullableBoolean => Self::ArrayOfBoolean,
            Self::ArrayOfNullableInt8 => Self::ArrayOfInt8,
            Self::ArrayOfNullableInt16 => Self::ArrayOfInt16,
            Self::ArrayOfNullableInt32 => Self::ArrayOfInt32,
            Self::ArrayOfNullableInt64 => Self::ArrayOfInt64,
            Self::ArrayOfNullableFloat32 => Self::ArrayOfFloat32,
            Self::ArrayOfNullableFloat64 => Self::ArrayOfFloat64,
            _ => return None,
        })
    }

    /// Returns true if a value stored as `self` can be read through an
    /// accessor for `requested`: equal kinds, or the nullable/non-nullable
    /// counterpart of one another.
    pub fn is_readable_as(&self, requested: FieldKind) -> bool {
        *self == requested
            || self.to_nullable() == Some(requested)
            || self.to_non_nullable() == Some(requested)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_kind_round_trip() {
        for kind in FieldKind::ALL {
            assert_eq!(FieldKind::from_id(kind.id()).unwrap(), *kind);
        }
        assert_eq!(FieldKind::ALL.len(), 42);
    }

    #[test]
    fn test_reserved_ids_rejected() {
        for id in [-1, 0, 5, 6, 31, 32, 47] {
            assert!(FieldKind::from_id(id).is_err(), "id {} accepted", id);
        }
    }

    #[test]
    fn test_wire_ids() {
        assert_eq!(FieldKind::Boolean.id(), 1);
        assert_eq!(FieldKind::Int32.id(), 9);
        assert_eq!(FieldKind::String.id(), 17);
        assert_eq!(FieldKind::Compact.id(), 29);
        assert_eq!(FieldKind::ArrayOfCompact.id(), 30);
        assert_eq!(FieldKind::NullableBoolean.id(), 33);
        assert_eq!(FieldKind::ArrayOfNullableFloat64.id(), 46);
    }

    #[test]
    fn test_fixed_size() {
        assert_eq!(FieldKind::Int8.fixed_size(), Some(1));
        assert_eq!(FieldKind::Int16.fixed_size(), Some(2));
        assert_eq!(FieldKind::Float32.fixed_size(), Some(4));
        assert_eq!(FieldKind::Int64.fixed_size(), Some(8));
        assert_eq!(FieldKind::Boolean.fixed_size(), None);
        assert_eq!(FieldKind::NullableInt32.fixed_size(), None);
        assert!(!FieldKind::Boolean.is_variable_size());
        assert!(FieldKind::NullableBoolean.is_variable_size());
        assert!(FieldKind::Decimal.is_variable_size());
        assert!(FieldKind::Time.is_variable_size());
    }

    #[test]
    fn test_nullable_mapping_is_symmetric() {
        for kind in FieldKind::ALL {
            if let Some(nullable) = kind.to_nullable() {
                assert!(nullable.is_nullable());
                assert_eq!(nullable.to_non_nullable(), Some(*kind));
            }
        }
        assert_eq!(FieldKind::String.to_nullable(), None);
        assert_eq!(FieldKind::Compact.to_non_nullable(), None);
    }

    #[test]
    fn test_readable_as() {
        assert!(FieldKind::Int32.is_readable_as(FieldKind::NullableInt32));
        assert!(FieldKind::NullableInt32.is_readable_as(FieldKind::Int32));
        assert!(FieldKind::ArrayOfInt8.is_readable_as(FieldKind::ArrayOfNullableInt8));
        assert!(!FieldKind::Int32.is_readable_as(FieldKind::Int64));
        assert!(!FieldKind::Int32.is_readable_as(FieldKind::ArrayOfNullableInt32));
    }

    #[test]
    fn test_display_and_classification() {
        assert_eq!(FieldKind::ArrayOfNullableInt32.to_string(), "ARRAY_OF_NULLABLE_INT32");
        assert!(FieldKind::ArrayOfString.is_array());
        assert!(!FieldKind::String.is_array());
        assert!(FieldKind::ArrayOfCompact.is_reference());
        assert!(!FieldKind::ArrayOfString.is_reference());
    }
}
