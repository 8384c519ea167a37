#![no_main]

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use libfuzzer_sys::fuzz_target;

use hazelcast_compact::{
    CompactCodec, CompactOptions, FieldKind, Result, Schema, SchemaChannel,
};
use uuid::Uuid;

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

fn codec() -> &'static (CompactCodec, Vec<i64>) {
    static CODEC: OnceLock<(CompactCodec, Vec<i64>)> = OnceLock::new();
    CODEC.get_or_init(|| {
        let leaf = Schema::new(
            "Leaf",
            [
                ("value", FieldKind::NullableInt64),
                ("when", FieldKind::TimestampWithTimezone),
                ("amount", FieldKind::Decimal),
            ],
        )
        .expect("valid schema");
        let node = Schema::new(
            "Node",
            [
                ("flags", FieldKind::ArrayOfBoolean),
                ("label", FieldKind::String),
                ("leaf", FieldKind::Compact),
                ("leaves", FieldKind::ArrayOfCompact),
                ("scores", FieldKind::ArrayOfNullableFloat32),
                ("dates", FieldKind::ArrayOfDate),
            ],
        )
        .expect("valid schema");
        let ids = vec![leaf.id(), node.id()];
        let options = CompactOptions::builder()
            .add_schema(leaf)
            .and_then(|b| b.add_schema(node))
            .and_then(|b| b.build())
            .expect("valid options");
        (CompactCodec::new(options, Arc::new(Offline)), ids)
    })
}

fuzz_target!(|data: &[u8]| {
    let (codec, ids) = codec();
    for schema_id in ids {
        let mut input = schema_id.to_be_bytes().to_vec();
        input.extend_from_slice(data);
        let Ok(record) = codec.decode_generic(&input) else {
            continue;
        };
        let _ = record.type_name();
        let names: Vec<String> = record.field_names().map(str::to_string).collect();
        for name in &names {
            if let Some(kind) = record.field_kind(name) {
                let _ = record.read(name, kind);
            }
            let _ = record.get_nullable_int64(name);
            let _ = record.get_int64(name);
            let _ = record.get_array_of_generic_record(name);
        }
        let _ = codec.encode(&record);
    }
});
