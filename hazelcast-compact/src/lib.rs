//! Compact serialization for the Hazelcast Rust client.
//!
//! Objects are encoded against schemas that are fingerprinted, cached
//! locally and replicated to the cluster. Values can be decoded into their
//! registered Rust type or, without one, into a [`GenericRecord`].
//!
//! ```ignore
//! use hazelcast_compact::{CompactCodec, CompactOptions, HazelcastCompact};
//!
//! #[derive(HazelcastCompact)]
//! struct Employee {
//!     name: String,
//!     age: i32,
//! }
//!
//! let options = CompactOptions::builder().add_type::<Employee>()?.build()?;
//! let codec = CompactCodec::new(options, channel);
//! let data = codec.to_data(&employee).await?;
//! let back: Employee = codec.from_data(&data).await?;
//! ```

#![warn(missing_docs)]

extern crate self as hazelcast_compact;

pub mod error;
pub mod serialization;

pub use error::{HazelcastError, Result};
pub use serialization::compact::reflection;
pub use serialization::compact::{
    BoxedObject, CompactCodec, CompactEnum, CompactField, CompactOptions, CompactOptionsBuilder,
    CompactReader, CompactSerializer, CompactWriter, Constructor, DynCompactSerializer,
    FieldKind, FieldValue, GenericRecord, GenericRecordBuilder, Member, Reflective,
    ReflectiveSerializer, Schema, SchemaCache, SchemaChannel, COMPACT_TYPE_ID,
};
pub use serialization::{DataInput, DataOutput, Endianness, ObjectDataInput, ObjectDataOutput};

#[cfg(feature = "derive")]
pub use hazelcast_compact_derive::HazelcastCompact;
