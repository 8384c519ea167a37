//! Compact serialization: schema-described binary objects that can be read
//! partially, evolved, and decoded without the original Rust type.
//!
//! A [`CompactCodec`] ties the pieces together. Types are registered on a
//! [`CompactOptions`] either with an explicit [`CompactSerializer`] or by
//! deriving [`Reflective`]; schemas are inferred on first use, cached in a
//! [`SchemaCache`] and replicated to the cluster through a [`SchemaChannel`].

mod codec;
mod encoding;
mod field_kind;
pub mod fingerprint;
mod generic_record;
mod hook;
mod offsets;
mod options;
mod reader;
pub mod reflection;
mod scanner;
mod schema;
mod schema_cache;
mod serializer;
mod value;
mod writer;

pub use codec::{CompactCodec, COMPACT_TYPE_ID, FRAME_HEADER_LENGTH};
pub use field_kind::FieldKind;
pub use generic_record::{GenericRecord, GenericRecordBuilder};
pub use hook::{ObjectHook, Target};
pub use options::{
    CompactOptions, CompactOptionsBuilder, DEFAULT_SCHEMA_REPLICATION_DELAY,
    DEFAULT_SCHEMA_REPLICATION_RETRIES,
};
pub use reader::{BoxedObject, CompactReader, DefaultCompactReader};
pub use reflection::{
    select_constructor, CompactEnum, CompactField, Constructor, Member, Reflective,
    ReflectiveSerializer,
};
pub use scanner::scan;
pub use schema::{Schema, SchemaBuilder, SchemaField};
pub use schema_cache::{SchemaCache, SchemaChannel};
pub use serializer::{CompactSerializer, DynCompactSerializer, TypedSerializer};
pub use value::{FieldRef, FieldValue};
pub use writer::{CompactWriter, DefaultCompactWriter, SchemaWriter};
