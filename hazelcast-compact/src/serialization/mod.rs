//! Byte-level streams and the compact serialization format built on them.

mod data_input;
mod data_output;
pub mod compact;

pub use compact::{
    CompactCodec, CompactOptions, CompactOptionsBuilder, CompactReader, CompactSerializer,
    CompactWriter, DefaultCompactReader, DefaultCompactWriter, FieldKind, FieldValue,
    GenericRecord, GenericRecordBuilder, ObjectHook, Schema, SchemaCache, SchemaChannel,
    Target, COMPACT_TYPE_ID,
};
pub use data_input::{DataInput, ObjectDataInput};
pub use data_output::{DataOutput, Endianness, ObjectDataOutput};
