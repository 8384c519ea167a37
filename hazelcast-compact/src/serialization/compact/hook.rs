//! Callback used by readers and writers to handle nested compact values.

use crate::error::Result;
use crate::serialization::{ObjectDataInput, ObjectDataOutput};
use std::any::{Any, TypeId};

/// What a nested compact value should be decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The registered Rust type with this id.
    Type(TypeId),
    /// Always a [`GenericRecord`](super::GenericRecord).
    Generic,
    /// The type registered for the schema's type name, falling back to a
    /// generic record.
    Any,
}

impl Target {
    /// Shorthand for `Target::Type(TypeId::of::<T>())`.
    pub fn of<T: Any>() -> Self {
        Self::Type(TypeId::of::<T>())
    }
}

/// Writes and reads whole compact objects (schema id plus layout).
///
/// Implemented by [`CompactCodec`](super::CompactCodec); readers and writers
/// call back into it for `COMPACT` and `ARRAY_OF_COMPACT` fields.
pub trait ObjectHook: Send + Sync {
    /// Writes `value` at the cursor of `out`.
    fn write_object(&self, out: &mut ObjectDataOutput, value: &dyn Any) -> Result<()>;

    /// Reads an object starting at the cursor of `input`.
    fn read_object(
        &self,
        input: &mut ObjectDataInput<'_>,
        target: Target,
    ) -> Result<Box<dyn Any + Send + Sync>>;
}
