//! Compact serialization configuration and type registration.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{HazelcastError, Result};
use crate::serialization::Endianness;

use super::reflection::{Reflective, ReflectiveSerializer};
use super::schema::Schema;
use super::serializer::{CompactSerializer, DynCompactSerializer, TypedSerializer};

/// Default number of times a schema is sent before publication fails.
pub const DEFAULT_SCHEMA_REPLICATION_RETRIES: u32 = 100;
/// Default pause between two sends of the same schema.
pub const DEFAULT_SCHEMA_REPLICATION_DELAY: Duration = Duration::from_secs(1);

/// Registered compact types and the replication policy for their schemas.
#[derive(Clone)]
pub struct CompactOptions {
    type_names: HashMap<TypeId, String>,
    serializers: HashMap<String, Arc<dyn DynCompactSerializer>>,
    schemas: HashMap<String, Schema>,
    schema_replication_retries: u32,
    schema_replication_delay: Duration,
    endianness: Endianness,
}

impl CompactOptions {
    /// Creates a new options builder.
    pub fn builder() -> CompactOptionsBuilder {
        CompactOptionsBuilder::new()
    }

    /// Returns the type name registered for a Rust type.
    pub fn type_name_of(&self, type_id: TypeId) -> Option<&str> {
        self.type_names.get(&type_id).map(String::as_str)
    }

    /// Returns the serializer registered for a type name.
    pub fn serializer(&self, type_name: &str) -> Option<&Arc<dyn DynCompactSerializer>> {
        self.serializers.get(type_name)
    }

    /// Returns the schema declared for a type name.
    pub fn schema(&self, type_name: &str) -> Option<&Schema> {
        self.schemas.get(type_name)
    }

    /// Returns every declared schema.
    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    /// Returns true if more than one Rust type is registered under the name.
    pub fn is_shared(&self, type_name: &str) -> bool {
        self.type_names.values().filter(|n| *n == type_name).count() > 1
    }

    /// Returns how many times a schema is sent before publication fails.
    pub fn schema_replication_retries(&self) -> u32 {
        self.schema_replication_retries
    }

    /// Returns the pause between two sends of the same schema.
    pub fn schema_replication_delay(&self) -> Duration {
        self.schema_replication_delay
    }

    /// Returns the byte order of schema ids and payload integers.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }
}

impl Default for CompactOptions {
    fn default() -> Self {
        Self {
            type_names: HashMap::new(),
            serializers: HashMap::new(),
            schemas: HashMap::new(),
            schema_replication_retries: DEFAULT_SCHEMA_REPLICATION_RETRIES,
            schema_replication_delay: DEFAULT_SCHEMA_REPLICATION_DELAY,
            endianness: Endianness::default(),
        }
    }
}

impl std::fmt::Debug for CompactOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut type_names: Vec<&String> = self.serializers.keys().collect();
        type_names.sort();
        f.debug_struct("CompactOptions")
            .field("type_names", &type_names)
            .field("schemas", &self.schemas.len())
            .field("schema_replication_retries", &self.schema_replication_retries)
            .field("schema_replication_delay", &self.schema_replication_delay)
            .field("endianness", &self.endianness)
            .finish()
    }
}

impl From<CompactOptions> for CompactOptionsBuilder {
    fn from(options: CompactOptions) -> Self {
        Self {
            type_names: options.type_names,
            serializers: options.serializers,
            schemas: options.schemas,
            schema_replication_retries: Some(options.schema_replication_retries),
            schema_replication_delay: Some(options.schema_replication_delay),
            endianness: Some(options.endianness),
        }
    }
}

/// Builder for `CompactOptions`.
///
/// Registration methods check the registration rules immediately and return
/// [`HazelcastError::Configuration`] on a conflict.
#[derive(Default)]
pub struct CompactOptionsBuilder {
    type_names: HashMap<TypeId, String>,
    serializers: HashMap<String, Arc<dyn DynCompactSerializer>>,
    schemas: HashMap<String, Schema>,
    schema_replication_retries: Option<u32>,
    schema_replication_delay: Option<Duration>,
    endianness: Option<Endianness>,
}

impl CompactOptionsBuilder {
    /// Creates a new options builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the Rust type `T` to `type_name`, with an optional declared
    /// schema and the serializer handling the name.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if:
    /// - `T` is already bound to another type name
    /// - the schema's type name differs, or another schema is declared for the name
    /// - the serializer declares another name, or another serializer handles the name
    /// - the name would be shared between types through a reflective serializer
    pub fn register<T: Any + Send + Sync>(
        mut self,
        type_name: &str,
        schema: Option<Schema>,
        serializer: Arc<dyn DynCompactSerializer>,
    ) -> Result<Self> {
        let type_id = TypeId::of::<T>();
        let rust_type = std::any::type_name::<T>();

        if let Some(existing) = self.type_names.get(&type_id) {
            if existing != type_name {
                return Err(HazelcastError::configuration(format!(
                    "type {} is already registered as '{}', cannot register it as '{}'",
                    rust_type, existing, type_name
                )));
            }
        }
        if serializer.type_name() != type_name {
            return Err(HazelcastError::configuration(format!(
                "serializer for '{}' declares the type name '{}'",
                type_name,
                serializer.type_name()
            )));
        }
        if let Some(existing) = self.serializers.get(type_name) {
            if !Arc::ptr_eq(existing, &serializer) {
                return Err(HazelcastError::configuration(format!(
                    "a different serializer is already registered for '{}'",
                    type_name
                )));
            }
        }
        let shared = self
            .type_names
            .iter()
            .any(|(id, name)| *id != type_id && name == type_name);
        if shared && serializer.is_reflective() {
            return Err(HazelcastError::configuration(format!(
                "'{}' is shared by several types; the reflective serializer cannot tell them apart",
                type_name
            )));
        }
        if let Some(schema) = schema {
            self = self.add_schema_for(type_name, schema)?;
        }

        tracing::debug!(type_name, rust_type, "registered compact type");
        self.type_names.insert(type_id, type_name.to_string());
        self.serializers.insert(type_name.to_string(), serializer);
        Ok(self)
    }

    /// Registers `T` under its derived type name, serialized by reflection.
    pub fn add_type<T: Reflective>(self) -> Result<Self> {
        self.add_type_named::<T>(T::TYPE_NAME)
    }

    /// Registers `T` under an explicit type name, serialized by reflection.
    pub fn add_type_named<T: Reflective>(self, type_name: &str) -> Result<Self> {
        let serializer: Arc<dyn DynCompactSerializer> =
            Arc::new(ReflectiveSerializer::<T>::named(type_name));
        self.register::<T>(type_name, None, serializer)
    }

    /// Registers `T` with a hand-written serializer.
    pub fn add_serializer<T, S>(self, serializer: S) -> Result<Self>
    where
        T: Any + Send + Sync,
        S: CompactSerializer<T> + 'static,
    {
        let type_name = serializer.type_name().to_string();
        let serializer: Arc<dyn DynCompactSerializer> = Arc::new(TypedSerializer::new(serializer));
        self.register::<T>(&type_name, None, serializer)
    }

    /// Declares a schema up front, making it known without inference.
    pub fn add_schema(self, schema: Schema) -> Result<Self> {
        let type_name = schema.type_name().to_string();
        self.add_schema_for(&type_name, schema)
    }

    fn add_schema_for(mut self, type_name: &str, schema: Schema) -> Result<Self> {
        if schema.type_name() != type_name {
            return Err(HazelcastError::configuration(format!(
                "schema of '{}' cannot be declared for '{}'",
                schema.type_name(),
                type_name
            )));
        }
        match self.schemas.get(type_name) {
            Some(existing) if *existing != schema => {
                return Err(HazelcastError::configuration(format!(
                    "a different schema (id {}) is already declared for '{}'",
                    existing.id(),
                    type_name
                )));
            }
            Some(_) => {}
            None => {
                self.schemas.insert(type_name.to_string(), schema);
            }
        }
        Ok(self)
    }

    /// Sets how many times a schema is sent before publication fails.
    pub fn schema_replication_retries(mut self, retries: u32) -> Self {
        self.schema_replication_retries = Some(retries);
        self
    }

    /// Sets the pause between two sends of the same schema.
    pub fn schema_replication_delay(mut self, delay: Duration) -> Self {
        self.schema_replication_delay = Some(delay);
        self
    }

    /// Sets the byte order of schema ids and payload integers.
    pub fn endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = Some(endianness);
        self
    }

    /// Builds the options, returning an error if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `schema_replication_retries` is zero.
    pub fn build(self) -> Result<CompactOptions> {
        let schema_replication_retries = self
            .schema_replication_retries
            .unwrap_or(DEFAULT_SCHEMA_REPLICATION_RETRIES);
        if schema_replication_retries == 0 {
            return Err(HazelcastError::configuration(
                "schema_replication_retries must be at least 1",
            ));
        }

        Ok(CompactOptions {
            type_names: self.type_names,
            serializers: self.serializers,
            schemas: self.schemas,
            schema_replication_retries,
            schema_replication_delay: self
                .schema_replication_delay
                .unwrap_or(DEFAULT_SCHEMA_REPLICATION_DELAY),
            endianness: self.endianness.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::compact::{CompactReader, CompactWriter, FieldKind};

    struct Circle {
        radius: f64,
    }

    struct Square {
        side: f64,
    }

    struct CircleSerializer;

    impl CompactSerializer<Circle> for CircleSerializer {
        fn type_name(&self) -> &str {
            "Circle"
        }

        fn write(&self, writer: &mut dyn CompactWriter, value: &Circle) -> Result<()> {
            writer.write_float64("radius", value.radius)
        }

        fn read(&self, reader: &mut dyn CompactReader) -> Result<Circle> {
            Ok(Circle {
                radius: reader.read_float64("radius")?,
            })
        }
    }

    struct ShapeSerializer;

    impl DynCompactSerializer for ShapeSerializer {
        fn type_name(&self) -> &str {
            "Shape"
        }

        fn write(&self, writer: &mut dyn CompactWriter, value: &dyn Any) -> Result<()> {
            if let Some(c) = value.downcast_ref::<Circle>() {
                writer.write_float64("size", c.radius)
            } else if let Some(s) = value.downcast_ref::<Square>() {
                writer.write_float64("size", s.side)
            } else {
                Err(HazelcastError::Serialization("not a shape".into()))
            }
        }

        fn read(&self, reader: &mut dyn CompactReader) -> Result<Box<dyn Any + Send + Sync>> {
            Ok(Box::new(Circle {
                radius: reader.read_float64("size")?,
            }))
        }
    }

    #[test]
    fn test_defaults() {
        let options = CompactOptions::builder().build().unwrap();
        assert_eq!(options.schema_replication_retries(), 100);
        assert_eq!(options.schema_replication_delay(), Duration::from_secs(1));
        assert_eq!(options.endianness(), Endianness::Big);
    }

    #[test]
    fn test_zero_retries_rejected() {
        let err = CompactOptions::builder()
            .schema_replication_retries(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, HazelcastError::Configuration(_)));
    }

    #[test]
    fn test_add_serializer() {
        let options = CompactOptions::builder()
            .add_serializer(CircleSerializer)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(options.type_name_of(TypeId::of::<Circle>()), Some("Circle"));
        assert!(options.serializer("Circle").is_some());
        assert!(options.type_name_of(TypeId::of::<Square>()).is_none());
    }

    #[test]
    fn test_type_bound_to_two_names_rejected() {
        let shape: Arc<dyn DynCompactSerializer> = Arc::new(ShapeSerializer);
        let err = CompactOptions::builder()
            .add_serializer(CircleSerializer)
            .unwrap()
            .register::<Circle>("Shape", None, shape)
            .err()
            .unwrap();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_serializer_name_mismatch_rejected() {
        let shape: Arc<dyn DynCompactSerializer> = Arc::new(ShapeSerializer);
        assert!(CompactOptions::builder()
            .register::<Circle>("Circle", None, shape)
            .is_err());
    }

    #[test]
    fn test_second_serializer_for_name_rejected() {
        let first: Arc<dyn DynCompactSerializer> = Arc::new(ShapeSerializer);
        let second: Arc<dyn DynCompactSerializer> = Arc::new(ShapeSerializer);
        assert!(CompactOptions::builder()
            .register::<Circle>("Shape", None, first)
            .unwrap()
            .register::<Square>("Shape", None, second)
            .is_err());
    }

    #[test]
    fn test_shared_name_with_one_serializer() {
        let shape: Arc<dyn DynCompactSerializer> = Arc::new(ShapeSerializer);
        let options = CompactOptions::builder()
            .register::<Circle>("Shape", None, shape.clone())
            .unwrap()
            .register::<Square>("Shape", None, shape)
            .unwrap()
            .build()
            .unwrap();
        assert!(options.is_shared("Shape"));
        assert_eq!(options.type_name_of(TypeId::of::<Square>()), Some("Shape"));
    }

    #[test]
    fn test_declared_schema_rules() {
        let schema = Schema::new("Circle", [("radius", FieldKind::Float64)]).unwrap();
        let other = Schema::new("Circle", [("diameter", FieldKind::Float64)]).unwrap();
        let builder = CompactOptions::builder().add_schema(schema.clone()).unwrap();
        let builder = builder.add_schema(schema.clone()).unwrap();
        assert!(builder.add_schema(other).is_err());

        let circle: Arc<dyn DynCompactSerializer> =
            Arc::new(TypedSerializer::new(CircleSerializer));
        assert!(CompactOptions::builder()
            .register::<Circle>("Circle", Some(Schema::new("Round", Vec::<(&str, FieldKind)>::new()).unwrap()), circle)
            .is_err());
    }

    #[test]
    fn test_round_trip_through_builder() {
        let options = CompactOptions::builder()
            .endianness(Endianness::Little)
            .add_serializer(CircleSerializer)
            .unwrap()
            .build()
            .unwrap();
        let rebuilt = CompactOptionsBuilder::from(options)
            .schema_replication_retries(3)
            .build()
            .unwrap();
        assert_eq!(rebuilt.endianness(), Endianness::Little);
        assert_eq!(rebuilt.schema_replication_retries(), 3);
        assert!(rebuilt.serializer("Circle").is_some());
    }
}
