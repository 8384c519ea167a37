//! Compact encode/decode throughput benchmarks.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hazelcast_compact::{
    CompactCodec, CompactOptions, FieldKind, GenericRecord, HazelcastCompact, Result, Schema,
    SchemaChannel,
};
use uuid::Uuid;

#[derive(Debug, Clone, HazelcastCompact)]
struct Order {
    id: i64,
    customer: String,
    quantity: i32,
    express: bool,
    discount: Option<f64>,
    lines: Vec<Line>,
}

#[derive(Debug, Clone, HazelcastCompact)]
struct Line {
    sku: String,
    count: i32,
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

fn codec() -> CompactCodec {
    let options = CompactOptions::builder()
        .add_type::<Order>()
        .unwrap()
        .add_type::<Line>()
        .unwrap()
        .build()
        .unwrap();
    CompactCodec::new(options, Arc::new(Offline))
}

fn order(lines: usize) -> Order {
    Order {
        id: 42,
        customer: "ACME Corporation".into(),
        quantity: 7,
        express: true,
        discount: Some(0.15),
        lines: (0..lines)
            .map(|i| Line {
                sku: format!("SKU-{:05}", i),
                count: i as i32,
            })
            .collect(),
    }
}

fn bench_reflective(c: &mut Criterion) {
    let mut group = c.benchmark_group("reflective");
    let codec = codec();

    for lines in [0usize, 10, 100] {
        let value = order(lines);
        let bytes = codec.encode(&value).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", lines), &value, |b, v| {
            b.iter(|| black_box(codec.encode(black_box(v)).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", lines), &bytes, |b, data| {
            b.iter(|| black_box(codec.decode::<Order>(black_box(data)).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode_generic", lines), &bytes, |b, data| {
            b.iter(|| black_box(codec.decode_generic(black_box(data)).unwrap()))
        });
    }

    group.finish();
}

fn bench_generic_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("generic_record");
    let codec = codec();

    group.bench_function("build_inferred", |b| {
        b.iter(|| {
            GenericRecord::compact("Point")
                .set_int32("x", black_box(1))
                .and_then(|r| r.set_int32("y", black_box(2)))
                .and_then(|r| r.set_string("label", Some("origin".into())))
                .and_then(|r| r.build())
                .unwrap()
        })
    });

    let record = codec.decode_generic(&codec.encode(&order(10)).unwrap()).unwrap();
    group.bench_function("encode", |b| b.iter(|| black_box(codec.encode(&record).unwrap())));

    group.finish();
}

fn bench_schema(c: &mut Criterion) {
    let mut group = c.benchmark_group("schema");

    for fields in [2usize, 16, 64] {
        let names: Vec<String> = (0..fields).map(|i| format!("field{}", i)).collect();
        group.bench_with_input(BenchmarkId::new("fingerprint", fields), &names, |b, names| {
            b.iter(|| {
                Schema::new("Bench", names.iter().map(|n| (n.as_str(), FieldKind::Int64))).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reflective, bench_generic_record, bench_schema);
criterion_main!(benches);
