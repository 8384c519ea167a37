//! Explicit compact serializers and their type-erased form.

use crate::error::{HazelcastError, Result};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use super::reader::{BoxedObject, CompactReader};
use super::schema::Schema;
use super::writer::CompactWriter;

/// Hand-written codec for values of type `T`.
///
/// `write` must write the same field names and kinds for every value; the
/// schema of `T` is inferred from the first value written.
pub trait CompactSerializer<T>: Send + Sync {
    /// The type name stored in the schema.
    fn type_name(&self) -> &str;

    /// Writes every field of `value`.
    fn write(&self, writer: &mut dyn CompactWriter, value: &T) -> Result<()>;

    /// Reads a value back; fields may be read in any order.
    fn read(&self, reader: &mut dyn CompactReader) -> Result<T>;
}

/// Type-erased serializer stored in the registry.
///
/// Implement this directly to let one serializer handle several Rust types
/// registered under the same type name.
pub trait DynCompactSerializer: Send + Sync {
    /// The type name stored in the schema.
    fn type_name(&self) -> &str;

    /// Writes every field of `value`, failing if it is not a handled type.
    fn write(&self, writer: &mut dyn CompactWriter, value: &dyn Any) -> Result<()>;

    /// Reads a boxed value back.
    fn read(&self, reader: &mut dyn CompactReader) -> Result<BoxedObject>;

    /// Schema known without writing a value, if the fields never depend on
    /// the value.
    fn schema(&self) -> Result<Option<Schema>> {
        Ok(None)
    }

    /// True for serializers driven by the reflection codec, which cannot
    /// share a type name between types.
    fn is_reflective(&self) -> bool {
        false
    }
}

impl fmt::Debug for dyn DynCompactSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynCompactSerializer")
            .field("type_name", &self.type_name())
            .field("reflective", &self.is_reflective())
            .finish()
    }
}

pub(crate) fn wrong_value_type<T>(type_name: &str) -> HazelcastError {
    HazelcastError::Serialization(format!(
        "serializer for '{}' expects values of type {}",
        type_name,
        std::any::type_name::<T>()
    ))
}

/// Adapts a [`CompactSerializer<T>`] to a [`DynCompactSerializer`].
pub struct TypedSerializer<T, S> {
    inner: S,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> TypedSerializer<T, S>
where
    T: Any + Send + Sync,
    S: CompactSerializer<T>,
{
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

impl<T, S> DynCompactSerializer for TypedSerializer<T, S>
where
    T: Any + Send + Sync,
    S: CompactSerializer<T>,
{
    fn type_name(&self) -> &str {
        self.inner.type_name()
    }

    fn write(&self, writer: &mut dyn CompactWriter, value: &dyn Any) -> Result<()> {
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| wrong_value_type::<T>(self.inner.type_name()))?;
        self.inner.write(writer, value)
    }

    fn read(&self, reader: &mut dyn CompactReader) -> Result<BoxedObject> {
        Ok(Box::new(self.inner.read(reader)?))
    }
}
