//! Common test utilities for integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hazelcast_compact::{
    CompactCodec, CompactOptions, Result, Schema, SchemaChannel,
};
use uuid::Uuid;

/// An in-memory cluster whose members acknowledge every schema they are sent.
#[derive(Default)]
pub struct InMemoryCluster {
    schemas: Mutex<HashMap<i64, Schema>>,
    members: Mutex<HashSet<Uuid>>,
    pub fetches: AtomicUsize,
    pub sends: AtomicUsize,
}

impl InMemoryCluster {
    pub fn with_members(count: usize) -> Arc<Self> {
        let cluster = Self::default();
        *cluster.members.lock().unwrap() = (0..count).map(|_| Uuid::new_v4()).collect();
        Arc::new(cluster)
    }

    pub fn knows(&self, schema_id: i64) -> bool {
        self.schemas.lock().unwrap().contains_key(&schema_id)
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.lock().unwrap().len()
    }

    /// Simulates a cluster restart that loses every replicated schema.
    pub fn forget_all(&self) {
        self.schemas.lock().unwrap().clear();
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaChannel for InMemoryCluster {
    async fn fetch_schema(&self, schema_id: i64) -> Result<Option<Schema>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.schemas.lock().unwrap().get(&schema_id).cloned())
    }

    async fn send_schema(&self, schema: &Schema) -> Result<HashSet<Uuid>> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.schemas
            .lock()
            .unwrap()
            .insert(schema.id(), schema.clone());
        Ok(self.members.lock().unwrap().clone())
    }

    async fn send_all_schemas(&self, schemas: &[Schema]) -> Result<()> {
        let mut known = self.schemas.lock().unwrap();
        for schema in schemas {
            known.insert(schema.id(), schema.clone());
        }
        Ok(())
    }

    fn member_ids(&self) -> HashSet<Uuid> {
        self.members.lock().unwrap().clone()
    }
}

/// A client codec connected to `cluster`.
pub fn client(options: CompactOptions, cluster: &Arc<InMemoryCluster>) -> CompactCodec {
    CompactCodec::new(options, cluster.clone())
}
