#![no_main]

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use libfuzzer_sys::fuzz_target;

use hazelcast_compact::{
    CompactCodec, CompactOptions, FieldKind, HazelcastCompact, Result, Schema, SchemaChannel,
};
use uuid::Uuid;

#[derive(Debug, HazelcastCompact)]
struct FuzzCompact {
    flag: bool,
    int8: i8,
    int16: i16,
    int32: i32,
    int64: i64,
    float32: f32,
    float64: f64,
    string: Option<String>,
    nullable_int32: Option<i32>,
    ints: Vec<i32>,
    names: Option<Vec<Option<String>>>,
}

struct Offline;

#[async_trait]
impl SchemaChannel for Offline {
    async fn fetch_schema(&self, _schema_id: i64) -> Result<Option<Schema>> {
        Ok(None)
    }

    async fn send_schema(&self, _schema: &Schema) -> Result<HashSet<Uuid>> {
        Ok(HashSet::new())
    }

    async fn send_all_schemas(&self, _schemas: &[Schema]) -> Result<()> {
        Ok(())
    }

    fn member_ids(&self) -> HashSet<Uuid> {
        HashSet::new()
    }
}

fn codec() -> &'static (CompactCodec, i64) {
    static CODEC: OnceLock<(CompactCodec, i64)> = OnceLock::new();
    CODEC.get_or_init(|| {
        let schema = Schema::new(
            "FuzzCompact",
            [
                ("flag", FieldKind::Boolean),
                ("int8", FieldKind::Int8),
                ("int16", FieldKind::Int16),
                ("int32", FieldKind::Int32),
                ("int64", FieldKind::Int64),
                ("float32", FieldKind::Float32),
                ("float64", FieldKind::Float64),
                ("string", FieldKind::String),
                ("nullable_int32", FieldKind::NullableInt32),
                ("ints", FieldKind::ArrayOfInt32),
                ("names", FieldKind::ArrayOfString),
            ],
        )
        .expect("valid schema");
        let id = schema.id();
        let options = CompactOptions::builder()
            .add_schema(schema)
            .and_then(|b| b.add_type::<FuzzCompact>())
            .and_then(|b| b.build())
            .expect("valid options");
        (CompactCodec::new(options, Arc::new(Offline)), id)
    })
}

fuzz_target!(|data: &[u8]| {
    let (codec, schema_id) = codec();
    let mut input = schema_id.to_be_bytes().to_vec();
    input.extend_from_slice(data);
    let _ = codec.decode::<FuzzCompact>(&input);
    let _ = codec.decode_any(&input);
});
