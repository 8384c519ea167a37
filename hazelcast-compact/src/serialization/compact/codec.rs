//! Entry point for encoding and decoding compact objects.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::error::{HazelcastError, Result};
use crate::serialization::{DataInput, DataOutput, ObjectDataInput, ObjectDataOutput};

use super::generic_record::GenericRecord;
use super::hook::{ObjectHook, Target};
use super::options::CompactOptions;
use super::reader::{downcast, target_of, BoxedObject, DefaultCompactReader};
use super::scanner;
use super::schema::Schema;
use super::schema_cache::{SchemaCache, SchemaChannel};
use super::serializer::DynCompactSerializer;
use super::writer::{DefaultCompactWriter, SchemaWriter};

/// Serialization type id of compact objects.
pub const COMPACT_TYPE_ID: i32 = -55;

/// Length of the partition hash and type id that precede a framed object.
pub const FRAME_HEADER_LENGTH: usize = 8;

/// Encodes and decodes compact objects against registered serializers and a
/// shared [`SchemaCache`].
///
/// Encoding and decoding are synchronous and only touch the local cache.
/// [`to_data`](Self::to_data) and [`from_data`](Self::from_data) add the
/// cluster round trips: publishing new schemas and fetching unknown ones.
pub struct CompactCodec {
    options: CompactOptions,
    cache: Arc<SchemaCache>,
    type_schemas: RwLock<HashMap<TypeId, Schema>>,
}

impl std::fmt::Debug for CompactCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactCodec")
            .field("options", &self.options)
            .field("cache", &self.cache)
            .finish()
    }
}

impl CompactCodec {
    /// Creates a codec with its own schema cache talking to `channel`.
    pub fn new(options: CompactOptions, channel: Arc<dyn SchemaChannel>) -> Self {
        let cache = SchemaCache::with_replication(
            channel,
            options.schema_replication_retries(),
            options.schema_replication_delay(),
        );
        Self::with_cache(options, Arc::new(cache))
    }

    /// Creates a codec sharing an existing schema cache.
    ///
    /// Declared schemas are added to the cache as unpublished.
    pub fn with_cache(options: CompactOptions, cache: Arc<SchemaCache>) -> Self {
        for schema in options.schemas() {
            if cache.try_get(schema.id()).is_none() {
                cache.add(schema.clone(), false);
            }
        }
        Self {
            options,
            cache,
            type_schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the registrations this codec was built with.
    pub fn options(&self) -> &CompactOptions {
        &self.options
    }

    /// Returns the schema cache, possibly shared with other codecs.
    pub fn schema_cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    /// Returns the schema used for a type name.
    ///
    /// That is the declared schema, else the one inferred from the first
    /// value encoded, else the one the registered serializer knows without a
    /// value. Hand-written serializers only have a schema once a value of the
    /// type has been encoded.
    pub fn schema_of(&self, type_name: &str) -> Option<Schema> {
        if let Some(schema) = self.options.schema(type_name) {
            return Some(schema.clone());
        }
        let inferred = self
            .type_schemas
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .find(|s| s.type_name() == type_name)
            .cloned();
        if inferred.is_some() {
            return inferred;
        }
        match self.options.serializer(type_name)?.schema() {
            Ok(schema) => schema,
            Err(e) => {
                tracing::warn!(type_name, error = %e, "cannot build schema");
                None
            }
        }
    }

    /// Encodes `value` as its schema id followed by its layout.
    pub fn encode<T: Any>(&self, value: &T) -> Result<Vec<u8>> {
        let mut out = ObjectDataOutput::with_endianness(self.options.endianness());
        self.write_object(&mut out, value)?;
        Ok(out.into_bytes())
    }

    /// Decodes bytes produced by [`encode`](Self::encode) as `T`.
    ///
    /// `T` may be [`GenericRecord`] to skip the registered serializer. Every
    /// referenced schema must already be cached.
    pub fn decode<T: Any + Send + Sync>(&self, bytes: &[u8]) -> Result<T> {
        let mut input = ObjectDataInput::with_endianness(bytes, self.options.endianness());
        let object = self.read_object(&mut input, target_of::<T>())?;
        downcast(object, "<root>")
    }

    /// Decodes as the type registered for the schema's type name, or as a
    /// [`GenericRecord`] when no serializer is registered for it.
    pub fn decode_any(&self, bytes: &[u8]) -> Result<BoxedObject> {
        let mut input = ObjectDataInput::with_endianness(bytes, self.options.endianness());
        self.read_object(&mut input, Target::Any)
    }

    /// Decodes as a [`GenericRecord`], whatever is registered.
    pub fn decode_generic(&self, bytes: &[u8]) -> Result<GenericRecord> {
        self.decode::<GenericRecord>(bytes)
    }

    /// Makes sure every schema referenced by the object whose schema id is at
    /// `root_offset` is cached, fetching unknown ones from the cluster.
    pub async fn ensure_schemas(&self, bytes: &[u8], root_offset: usize) -> Result<HashSet<i64>> {
        scanner::scan(&self.cache, bytes, root_offset, self.options.endianness()).await
    }

    /// Frames and encodes `value`, publishing any schema it references that
    /// the cluster has not acknowledged yet.
    pub async fn to_data<T: Any>(&self, value: &T) -> Result<Vec<u8>> {
        let mut out = ObjectDataOutput::with_endianness(self.options.endianness());
        out.write_zero_bytes(FRAME_HEADER_LENGTH);
        out.write_int_at_be(0, 0)?;
        out.write_int_at_be(4, COMPACT_TYPE_ID)?;
        self.write_object(&mut out, value)?;
        let bytes = out.into_bytes();

        let referenced = self.ensure_schemas(&bytes, FRAME_HEADER_LENGTH).await?;
        let pending: Vec<i64> = referenced
            .into_iter()
            .filter(|id| !self.cache.is_published(*id))
            .collect();
        if !pending.is_empty() {
            self.cache.publish_ids(&pending).await?;
        }
        Ok(bytes)
    }

    /// Decodes a framed object as `T`, fetching unknown schemas first.
    pub async fn from_data<T: Any + Send + Sync>(&self, bytes: &[u8]) -> Result<T> {
        let mut input = self.open_frame(bytes)?;
        self.ensure_schemas(bytes, FRAME_HEADER_LENGTH).await?;
        let object = self.read_object(&mut input, target_of::<T>())?;
        downcast(object, "<root>")
    }

    /// Decodes a framed object like [`decode_any`](Self::decode_any).
    pub async fn from_data_any(&self, bytes: &[u8]) -> Result<BoxedObject> {
        let mut input = self.open_frame(bytes)?;
        self.ensure_schemas(bytes, FRAME_HEADER_LENGTH).await?;
        self.read_object(&mut input, Target::Any)
    }

    fn open_frame<'a>(&self, bytes: &'a [u8]) -> Result<ObjectDataInput<'a>> {
        let mut input = ObjectDataInput::with_endianness(bytes, self.options.endianness());
        let _partition_hash = input.read_int_be()?;
        let type_id = input.read_int_be()?;
        if type_id != COMPACT_TYPE_ID {
            return Err(HazelcastError::Serialization(format!(
                "expected compact type id {}, found {}",
                COMPACT_TYPE_ID, type_id
            )));
        }
        Ok(input)
    }

    fn registered(&self, value: &dyn Any) -> Result<(&str, &Arc<dyn DynCompactSerializer>)> {
        let type_name = self.options.type_name_of(value.type_id()).ok_or_else(|| {
            HazelcastError::Serialization(format!(
                "no compact serializer is registered for {:?}",
                value.type_id()
            ))
        })?;
        let serializer = self.options.serializer(type_name).ok_or_else(|| {
            HazelcastError::Serialization(format!("no serializer for type name '{}'", type_name))
        })?;
        Ok((type_name, serializer))
    }

    /// Schema of a registered value: cached per Rust type, taken from the
    /// declaration or inferred by a dry run of the serializer.
    fn schema_for(
        &self,
        value: &dyn Any,
        type_name: &str,
        serializer: &Arc<dyn DynCompactSerializer>,
    ) -> Result<Schema> {
        let type_id = value.type_id();
        if let Some(schema) = self
            .type_schemas
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&type_id)
        {
            return Ok(schema.clone());
        }

        let schema = match self.options.schema(type_name) {
            Some(declared) => declared.clone(),
            None => {
                let mut dry_run = SchemaWriter::new(type_name);
                serializer.write(&mut dry_run, value)?;
                let schema = dry_run.build()?;
                tracing::debug!(
                    schema_id = schema.id(),
                    type_name,
                    fields = schema.field_count(),
                    "inferred schema"
                );
                schema
            }
        };
        self.remember(&schema);
        self.type_schemas
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(type_id, schema.clone());
        Ok(schema)
    }

    fn remember(&self, schema: &Schema) {
        if self.cache.try_get(schema.id()).is_none() {
            self.cache.add(schema.clone(), false);
        }
    }

    fn write_layout(
        &self,
        out: &mut ObjectDataOutput,
        schema: Schema,
        write: impl FnOnce(&mut DefaultCompactWriter<'_>) -> Result<()>,
    ) -> Result<()> {
        out.write_long(schema.id())?;
        let mut writer = DefaultCompactWriter::new(out, self, schema);
        write(&mut writer)?;
        writer.complete()
    }
}

impl ObjectHook for CompactCodec {
    fn write_object(&self, out: &mut ObjectDataOutput, value: &dyn Any) -> Result<()> {
        if let Some(record) = value.downcast_ref::<GenericRecord>() {
            self.remember(record.schema());
            return self.write_layout(out, record.schema().clone(), |w| record.write_to(w));
        }
        let (type_name, serializer) = self.registered(value)?;
        let schema = self.schema_for(value, type_name, serializer)?;
        self.write_layout(out, schema, |w| serializer.write(w, value))
    }

    fn read_object(&self, input: &mut ObjectDataInput<'_>, target: Target) -> Result<BoxedObject> {
        let schema_id = input.read_long()?;
        let schema = self
            .cache
            .try_get(schema_id)
            .ok_or(HazelcastError::UnknownSchema { schema_id })?;
        let type_name = schema.type_name().to_string();
        let mut reader = DefaultCompactReader::new(input, self, schema)?;
        let serializer = self.options.serializer(&type_name);

        let object: BoxedObject = match (target, serializer) {
            (Target::Generic, _) | (Target::Any, None) => {
                Box::new(GenericRecord::read_from(&mut reader)?)
            }
            (Target::Any, Some(serializer)) => serializer.read(&mut reader)?,
            (Target::Type(type_id), Some(serializer)) => {
                match self.options.type_name_of(type_id) {
                    Some(expected) if expected != type_name => {
                        return Err(HazelcastError::Serialization(format!(
                            "expected an object of '{}', found '{}'",
                            expected, type_name
                        )))
                    }
                    _ => serializer.read(&mut reader)?,
                }
            }
            (Target::Type(_), None) => {
                return Err(HazelcastError::Serialization(format!(
                    "no compact serializer is registered for '{}'",
                    type_name
                )))
            }
        };
        input.move_to(reader.end_position())?;
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::compact::schema_cache::tests::MockChannel;
    use crate::serialization::compact::{
        CompactReader, CompactSerializer, CompactWriter, Constructor, FieldKind, Member,
        Reflective,
    };
    use crate::serialization::Endianness;
    use std::sync::atomic::Ordering;

    #[derive(Debug, Clone, PartialEq)]
    struct Thing {
        name: String,
        value: i32,
    }

    struct ThingSerializer;

    impl CompactSerializer<Thing> for ThingSerializer {
        fn type_name(&self) -> &str {
            "Thing"
        }

        fn write(&self, writer: &mut dyn CompactWriter, value: &Thing) -> Result<()> {
            writer.write_string("name", Some(value.name.as_str()))?;
            writer.write_int32("value", value.value)
        }

        fn read(&self, reader: &mut dyn CompactReader) -> Result<Thing> {
            Ok(Thing {
                name: reader.read_string("name")?.unwrap_or_default(),
                value: reader.read_int32("value")?,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Bag {
        main: Option<Thing>,
        things: Vec<Option<Thing>>,
    }

    struct BagSerializer;

    impl CompactSerializer<Bag> for BagSerializer {
        fn type_name(&self) -> &str {
            "Bag"
        }

        fn write(&self, writer: &mut dyn CompactWriter, value: &Bag) -> Result<()> {
            writer.write_compact("main", value.main.as_ref())?;
            writer.write_array_of_compact("things", Some(value.things.as_slice()))
        }

        fn read(&self, reader: &mut dyn CompactReader) -> Result<Bag> {
            Ok(Bag {
                main: reader.read_compact("main")?,
                things: reader.read_array_of_compact("things")?.unwrap_or_default(),
            })
        }
    }

    fn options(endianness: Endianness) -> CompactOptions {
        CompactOptions::builder()
            .endianness(endianness)
            .add_serializer(ThingSerializer)
            .unwrap()
            .add_serializer(BagSerializer)
            .unwrap()
            .build()
            .unwrap()
    }

    fn codec(endianness: Endianness) -> (CompactCodec, Arc<MockChannel>) {
        let channel = Arc::new(MockChannel::with_members(1));
        (CompactCodec::new(options(endianness), channel.clone()), channel)
    }

    fn thing() -> Thing {
        Thing {
            name: "widget".into(),
            value: 42,
        }
    }

    #[test]
    fn test_thing_little_endian_data_length() {
        let (codec, _) = codec(Endianness::Little);
        let bytes = codec.encode(&thing()).unwrap();
        let schema = codec.schema_of("Thing").unwrap();
        assert_eq!(i64::from_le_bytes(bytes[0..8].try_into().unwrap()), schema.id());
        assert_eq!(i32::from_le_bytes(bytes[8..12].try_into().unwrap()), 4 + 4 + 6);
    }

    #[test]
    fn test_thing_data_length_is_seventeen() {
        let (codec, _) = codec(Endianness::Little);
        let value = Thing {
            name: "thingName".into(),
            value: 42,
        };
        let bytes = codec.encode(&value).unwrap();
        assert_eq!(i32::from_le_bytes(bytes[8..12].try_into().unwrap()), 17);
        assert_eq!(codec.decode::<Thing>(&bytes).unwrap(), value);
    }

    #[test]
    fn test_round_trip_and_generic_view() {
        for endianness in [Endianness::Big, Endianness::Little] {
            let (codec, _) = codec(endianness);
            let bytes = codec.encode(&thing()).unwrap();
            assert_eq!(codec.decode::<Thing>(&bytes).unwrap(), thing());
            let record = codec.decode_generic(&bytes).unwrap();
            assert_eq!(record.type_name(), "Thing");
            assert_eq!(record.get_int32("value").unwrap(), 42);
            let any = codec.decode_any(&bytes).unwrap();
            assert_eq!(any.downcast_ref::<Thing>(), Some(&thing()));
        }
    }

    #[test]
    fn test_schema_inferred_once_and_cached_unpublished() {
        let (codec, _) = codec(Endianness::Big);
        codec.encode(&thing()).unwrap();
        let schema = codec.schema_of("Thing").unwrap();
        assert_eq!(schema.field("name").unwrap().kind(), FieldKind::String);
        assert!(codec.schema_cache().try_get(schema.id()).is_some());
        assert!(!codec.schema_cache().is_published(schema.id()));
    }

    #[test]
    fn test_schema_of_reflective_type_before_any_encode() {
        #[derive(Debug, Clone, PartialEq)]
        struct Point {
            x: i32,
            label: Option<String>,
        }

        impl Reflective for Point {
            const TYPE_NAME: &'static str = "Point";
            const MEMBERS: &'static [Member] = &[
                Member { name: "x", kind: FieldKind::Int32 },
                Member { name: "label", kind: FieldKind::String },
            ];

            fn write_members(&self, writer: &mut dyn CompactWriter) -> Result<()> {
                writer.write_int32("x", self.x)?;
                writer.write_string("label", self.label.as_deref())
            }

            fn constructors() -> Vec<Constructor<Self>> {
                fn blank(_: &mut dyn CompactReader) -> Result<Point> {
                    Ok(Point { x: 0, label: None })
                }
                vec![Constructor { params: &[], construct: blank }]
            }

            fn read_member(&mut self, name: &str, reader: &mut dyn CompactReader) -> Result<()> {
                match name {
                    "x" => self.x = reader.read_int32("x")?,
                    _ => self.label = reader.read_string("label")?,
                }
                Ok(())
            }
        }

        let options = CompactOptions::builder()
            .add_type::<Point>()
            .unwrap()
            .add_serializer(ThingSerializer)
            .unwrap()
            .build()
            .unwrap();
        let codec = CompactCodec::new(options, Arc::new(MockChannel::with_members(1)));

        let before = codec.schema_of("Point").unwrap();
        assert_eq!(before.field("label").unwrap().kind(), FieldKind::String);
        assert_eq!(codec.schema_of("Thing"), None);
        assert_eq!(codec.schema_of("Missing"), None);

        let point = Point { x: 3, label: Some("p".into()) };
        let bytes = codec.encode(&point).unwrap();
        assert_eq!(codec.schema_of("Point"), Some(before.clone()));
        assert_eq!(i64::from_be_bytes(bytes[0..8].try_into().unwrap()), before.id());
        assert_eq!(codec.decode::<Point>(&bytes).unwrap(), point);
    }

    #[test]
    fn test_nested_values() {
        let (codec, _) = codec(Endianness::Big);
        let bag = Bag {
            main: Some(thing()),
            things: vec![Some(thing()), None, Some(Thing { name: String::new(), value: -1 })],
        };
        let bytes = codec.encode(&bag).unwrap();
        assert_eq!(codec.decode::<Bag>(&bytes).unwrap(), bag);

        let record = codec.decode_generic(&bytes).unwrap();
        let main = record.get_generic_record("main").unwrap().unwrap();
        assert_eq!(main.get_string("name").unwrap().as_deref(), Some("widget"));
        let things = record.get_array_of_generic_record("things").unwrap().unwrap();
        assert!(things[1].is_none());
        assert_eq!(things[2].as_ref().unwrap().get_int32("value").unwrap(), -1);

        let empty = Bag { main: None, things: vec![] };
        let bytes = codec.encode(&empty).unwrap();
        assert_eq!(codec.decode::<Bag>(&bytes).unwrap(), empty);
    }

    #[test]
    fn test_generic_record_reencodes_to_same_bytes() {
        let (codec, _) = codec(Endianness::Big);
        let bytes = codec.encode(&thing()).unwrap();
        let record = codec.decode_generic(&bytes).unwrap();
        assert_eq!(codec.encode(&record).unwrap(), bytes);
    }

    #[test]
    fn test_unregistered_types() {
        let (codec, _) = codec(Endianness::Big);
        assert!(codec.encode(&17u64).is_err());

        let record = GenericRecord::compact("Unregistered")
            .set_int32("n", 5)
            .unwrap()
            .build()
            .unwrap();
        let bytes = codec.encode(&record).unwrap();
        let any = codec.decode_any(&bytes).unwrap();
        assert_eq!(any.downcast_ref::<GenericRecord>(), Some(&record));
        assert!(codec.decode::<Thing>(&bytes).is_err());
    }

    #[test]
    fn test_unknown_schema_fails_decode() {
        let (writer, _) = codec(Endianness::Big);
        let bytes = writer.encode(&thing()).unwrap();
        let (reader, _) = codec(Endianness::Big);
        assert!(matches!(
            reader.decode::<Thing>(&bytes),
            Err(HazelcastError::UnknownSchema { .. })
        ));
    }

    #[test]
    fn test_declared_schema_is_used() {
        let declared = Schema::new(
            "Thing",
            [("name", FieldKind::String), ("value", FieldKind::Int32)],
        )
        .unwrap();
        let options = CompactOptions::builder()
            .add_schema(declared.clone())
            .unwrap()
            .add_serializer(ThingSerializer)
            .unwrap()
            .build()
            .unwrap();
        let codec = CompactCodec::new(options, Arc::new(MockChannel::with_members(1)));
        assert_eq!(codec.schema_of("Thing"), Some(declared.clone()));
        assert!(codec.schema_cache().try_get(declared.id()).is_some());
        let bytes = codec.encode(&thing()).unwrap();
        assert_eq!(codec.decode::<Thing>(&bytes).unwrap(), thing());
    }

    #[tokio::test]
    async fn test_to_data_publishes_and_from_data_fetches() {
        let channel = Arc::new(MockChannel::with_members(2));
        let writer = CompactCodec::new(options(Endianness::Big), channel.clone());
        let bag = Bag {
            main: Some(thing()),
            things: vec![None],
        };
        let data = writer.to_data(&bag).await.unwrap();
        assert_eq!(&data[..8], &[0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xC9]);
        assert_eq!(channel.sends.load(Ordering::SeqCst), 2);
        assert!(writer.schema_cache().unpublished().is_empty());

        writer.to_data(&bag).await.unwrap();
        assert_eq!(channel.sends.load(Ordering::SeqCst), 2);

        let reader = CompactCodec::new(options(Endianness::Big), channel.clone());
        let decoded: Bag = reader.from_data(&data).await.unwrap();
        assert_eq!(decoded, bag);
        assert_eq!(channel.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_from_data_rejects_other_type_ids() {
        let (codec, _) = codec(Endianness::Big);
        let bytes = [0, 0, 0, 0, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(codec.from_data::<Thing>(&bytes).await.is_err());
        assert!(codec.from_data::<Thing>(&bytes[..5]).await.is_err());
    }
}
