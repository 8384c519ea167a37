//! Discovery of the schemas referenced by a serialized object.

use futures::future::try_join_all;
use std::collections::{BTreeSet, HashSet};

use crate::error::{HazelcastError, Result};
use crate::serialization::{Endianness, ObjectDataInput};

use super::field_kind::FieldKind;
use super::offsets::OffsetWidth;
use super::reader::item_table;
use super::schema::Schema;
use super::schema_cache::SchemaCache;

/// Walks the object at `root` (the position of its schema id) breadth-first
/// and makes sure every schema it references is in `cache`.
///
/// Unknown schemas of one nesting level are fetched concurrently. Returns
/// the ids of every schema reached.
pub async fn scan(
    cache: &SchemaCache,
    data: &[u8],
    root: usize,
    endianness: Endianness,
) -> Result<HashSet<i64>> {
    let input = ObjectDataInput::with_endianness(data, endianness);
    let mut reached = HashSet::new();
    let mut level = BTreeSet::from([root]);

    while !level.is_empty() {
        let ids = level
            .iter()
            .map(|&position| input.read_long_at(position))
            .collect::<Result<Vec<i64>>>()?;

        let unknown: HashSet<i64> = ids
            .iter()
            .copied()
            .filter(|&id| cache.try_get(id).is_none())
            .collect();
        if !unknown.is_empty() {
            tracing::debug!(count = unknown.len(), "prefetching nested schemas");
            try_join_all(unknown.iter().map(|&id| cache.require(id))).await?;
        }

        let mut next = BTreeSet::new();
        for (&position, &schema_id) in level.iter().zip(&ids) {
            reached.insert(schema_id);
            let schema = cache
                .try_get(schema_id)
                .ok_or(HazelcastError::UnknownSchema { schema_id })?;
            children(&input, &schema, position + 8, &mut next)?;
        }
        level = next;
    }
    Ok(reached)
}

/// Adds the positions of the non-null nested objects of the object whose
/// layout starts at `start`.
fn children(
    input: &ObjectDataInput<'_>,
    schema: &Schema,
    start: usize,
    out: &mut BTreeSet<usize>,
) -> Result<()> {
    if !schema.has_reference_fields() {
        return Ok(());
    }
    let data_length = input.read_int_at(start)?;
    let data_length = usize::try_from(data_length).map_err(|_| {
        HazelcastError::serialization(format!("invalid data length: {}", data_length))
    })?;
    let data_start = start + 4;
    let offsets_position = data_start + data_length;
    let width = OffsetWidth::for_data_length(data_length);

    for field in schema.fields() {
        let kind = field.kind();
        if kind != FieldKind::Compact && kind != FieldKind::ArrayOfCompact {
            continue;
        }
        let entry = offsets_position + field.index() as usize * width.size();
        let Some(offset) = width.read(input, entry)? else {
            continue;
        };
        let position = data_start + offset;
        if kind == FieldKind::Compact {
            out.insert(position);
            continue;
        }
        let mut cursor = input.clone();
        cursor.move_to(position)?;
        let (items_start, count, item_offsets, item_width) = item_table(&mut cursor)?;
        for i in 0..count {
            if let Some(item) = item_width.read(input, item_offsets + i * item_width.size())? {
                out.insert(items_start + item);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::compact::schema_cache::tests::MockChannel;
    use crate::serialization::compact::{CompactCodec, CompactOptions, GenericRecord};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn leaf(n: i32) -> GenericRecord {
        GenericRecord::compact("Leaf").set_int32("n", n).unwrap().build().unwrap()
    }

    /// Root -> [Branch, null, Branch] -> Leaf, plus a direct Leaf.
    fn tree() -> GenericRecord {
        let branch = |n| {
            GenericRecord::compact("Branch")
                .set_generic_record("leaf", Some(leaf(n)))
                .unwrap()
                .build()
                .unwrap()
        };
        GenericRecord::compact("Root")
            .set_array_of_generic_record("branches", Some(vec![Some(branch(1)), None, Some(branch(2))]))
            .unwrap()
            .set_generic_record("direct", Some(leaf(3)))
            .unwrap()
            .set_string("label", Some("root".into()))
            .unwrap()
            .build()
            .unwrap()
    }

    fn ids(record: &GenericRecord) -> HashSet<i64> {
        let branch = record.get_array_of_generic_record("branches").unwrap().unwrap();
        let branch = branch[0].as_ref().unwrap();
        let leaf = branch.get_generic_record("leaf").unwrap().unwrap();
        HashSet::from([record.schema().id(), branch.schema().id(), leaf.schema().id()])
    }

    #[tokio::test]
    async fn test_scan_fetches_every_level() {
        let channel = Arc::new(MockChannel::with_members(1));
        let writer = CompactCodec::new(CompactOptions::default(), channel.clone());
        let record = tree();
        let bytes = writer.encode(&record).unwrap();
        for schema in writer.schema_cache().unpublished() {
            channel.cluster.lock().unwrap().insert(schema.id(), schema);
        }

        let cache = SchemaCache::new(channel.clone());
        let reached = scan(&cache, &bytes, 0, Endianness::Big).await.unwrap();
        assert_eq!(reached, ids(&record));
        assert_eq!(cache.len(), 3);
        assert_eq!(channel.fetches.load(Ordering::SeqCst), 3);

        scan(&cache, &bytes, 0, Endianness::Big).await.unwrap();
        assert_eq!(channel.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_scan_reports_missing_schema() {
        let channel = Arc::new(MockChannel::with_members(1));
        let writer = CompactCodec::new(CompactOptions::default(), channel.clone());
        let bytes = writer.encode(&tree()).unwrap();

        let cache = SchemaCache::new(channel);
        assert!(matches!(
            scan(&cache, &bytes, 0, Endianness::Big).await,
            Err(HazelcastError::UnknownSchema { .. })
        ));
    }

    #[tokio::test]
    async fn test_scan_of_flat_object() {
        let channel = Arc::new(MockChannel::with_members(1));
        let writer = CompactCodec::new(CompactOptions::default(), channel.clone());
        let bytes = writer.encode(&leaf(9)).unwrap();
        let reached = scan(writer.schema_cache(), &bytes, 0, Endianness::Big).await.unwrap();
        assert_eq!(reached.len(), 1);
        assert_eq!(channel.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scan_rejects_truncated_data() {
        let channel = Arc::new(MockChannel::with_members(1));
        let writer = CompactCodec::new(CompactOptions::default(), channel);
        let bytes = writer.encode(&tree()).unwrap();
        let result = scan(writer.schema_cache(), &bytes[..bytes.len() - 6], 0, Endianness::Big).await;
        assert!(result.is_err());
    }
}
