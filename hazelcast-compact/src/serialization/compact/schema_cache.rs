//! Local schema registry and replication of schemas to cluster members.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{HazelcastError, Result};

use super::options::{DEFAULT_SCHEMA_REPLICATION_DELAY, DEFAULT_SCHEMA_REPLICATION_RETRIES};
use super::schema::Schema;

/// Request/response channel to the cluster used to exchange schemas.
///
/// Transport failures should be reported as [`HazelcastError::Connection`]
/// (or [`HazelcastError::Io`] through `?` on an `io::Error`). Callers of the
/// cache and codec receive them unchanged.
#[async_trait]
pub trait SchemaChannel: Send + Sync {
    /// Looks up a schema on the cluster; `None` if no member knows it.
    async fn fetch_schema(&self, schema_id: i64) -> Result<Option<Schema>>;

    /// Sends one schema and returns the members that acknowledged it.
    async fn send_schema(&self, schema: &Schema) -> Result<HashSet<Uuid>>;

    /// Sends every given schema in a single request.
    async fn send_all_schemas(&self, schemas: &[Schema]) -> Result<()>;

    /// Members currently connected to the client.
    fn member_ids(&self) -> HashSet<Uuid>;
}

#[derive(Debug, Clone)]
struct Entry {
    schema: Schema,
    published: bool,
}

/// Schemas known to this client, keyed by schema id.
///
/// Lookups and inserts never suspend. Fetching and publishing go through the
/// [`SchemaChannel`].
pub struct SchemaCache {
    entries: RwLock<HashMap<i64, Entry>>,
    channel: Arc<dyn SchemaChannel>,
    replication_retries: u32,
    replication_delay: Duration,
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("len", &self.len())
            .field("replication_retries", &self.replication_retries)
            .field("replication_delay", &self.replication_delay)
            .finish()
    }
}

impl SchemaCache {
    /// Creates a cache with the default replication policy.
    pub fn new(channel: Arc<dyn SchemaChannel>) -> Self {
        Self::with_replication(
            channel,
            DEFAULT_SCHEMA_REPLICATION_RETRIES,
            DEFAULT_SCHEMA_REPLICATION_DELAY,
        )
    }

    /// Creates a cache that sends each schema at most `retries` times,
    /// sleeping `delay` between attempts.
    pub fn with_replication(channel: Arc<dyn SchemaChannel>, retries: u32, delay: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            channel,
            replication_retries: retries.max(1),
            replication_delay: delay,
        }
    }

    // A panic while holding the lock cannot leave a map entry half-written.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<i64, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<i64, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a locally known schema.
    pub fn try_get(&self, schema_id: i64) -> Option<Schema> {
        self.read().get(&schema_id).map(|e| e.schema.clone())
    }

    /// Returns a known schema, fetching it from the cluster if needed.
    ///
    /// A schema the cluster does not know is not remembered, so a later call
    /// asks again.
    pub async fn get_or_fetch(&self, schema_id: i64) -> Result<Option<Schema>> {
        if let Some(schema) = self.try_get(schema_id) {
            return Ok(Some(schema));
        }
        tracing::debug!(schema_id, "schema not cached, fetching from cluster");
        match self.channel.fetch_schema(schema_id).await? {
            Some(schema) => {
                if schema.id() != schema_id {
                    return Err(HazelcastError::Serialization(format!(
                        "cluster returned schema {} for id {}",
                        schema.id(),
                        schema_id
                    )));
                }
                tracing::debug!(schema_id, type_name = schema.type_name(), "fetched schema");
                self.add(schema.clone(), true);
                Ok(Some(schema))
            }
            None => {
                tracing::debug!(schema_id, "schema unknown to the cluster");
                Ok(None)
            }
        }
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), failing with
    /// [`HazelcastError::UnknownSchema`] when the schema is absent.
    pub async fn require(&self, schema_id: i64) -> Result<Schema> {
        self.get_or_fetch(schema_id)
            .await?
            .ok_or(HazelcastError::UnknownSchema { schema_id })
    }

    /// Records a schema. A published entry is never downgraded.
    pub fn add(&self, schema: Schema, published: bool) {
        let mut entries = self.write();
        let entry = entries.entry(schema.id()).or_insert_with(|| Entry {
            schema,
            published: false,
        });
        entry.published |= published;
    }

    /// Returns true once every connected member acknowledged the schema.
    pub fn is_published(&self, schema_id: i64) -> bool {
        self.read().get(&schema_id).is_some_and(|e| e.published)
    }

    /// Schemas known locally but not yet acknowledged by the cluster.
    pub fn unpublished(&self) -> Vec<Schema> {
        let mut schemas: Vec<Schema> = self
            .read()
            .values()
            .filter(|e| !e.published)
            .map(|e| e.schema.clone())
            .collect();
        schemas.sort_by_key(|s| s.id());
        schemas
    }

    /// Number of cached schemas.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if no schema is cached.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Publishes every unpublished schema.
    pub async fn publish(&self) -> Result<()> {
        let schemas = self.unpublished();
        self.replicate(schemas).await
    }

    /// Publishes the named schemas that are not yet published.
    pub async fn publish_ids(&self, schema_ids: &[i64]) -> Result<()> {
        let schemas: Vec<Schema> = {
            let entries = self.read();
            let mut seen = HashSet::new();
            schema_ids
                .iter()
                .filter(|id| seen.insert(**id))
                .filter_map(|id| entries.get(id))
                .filter(|e| !e.published)
                .map(|e| e.schema.clone())
                .collect()
        };
        self.replicate(schemas).await
    }

    /// Sends every known schema in one request and marks them all published.
    pub async fn publish_all(&self) -> Result<()> {
        let mut schemas: Vec<Schema> = self.read().values().map(|e| e.schema.clone()).collect();
        if schemas.is_empty() {
            return Ok(());
        }
        schemas.sort_by_key(|s| s.id());
        self.channel.send_all_schemas(&schemas).await?;
        let mut entries = self.write();
        for schema in &schemas {
            if let Some(entry) = entries.get_mut(&schema.id()) {
                entry.published = true;
            }
        }
        tracing::info!(count = schemas.len(), "re-sent all schemas to the cluster");
        Ok(())
    }

    async fn replicate(&self, schemas: Vec<Schema>) -> Result<()> {
        let mut incomplete = Vec::new();
        for schema in schemas {
            if !self.replicate_one(&schema).await? {
                incomplete.push(schema.id());
            }
        }
        if incomplete.is_empty() {
            return Ok(());
        }
        tracing::error!(
            schema_ids = ?incomplete,
            attempts = self.replication_retries,
            "schema replication did not reach every member"
        );
        Err(HazelcastError::ReplicationIncomplete {
            schema_ids: incomplete,
            attempts: self.replication_retries,
        })
    }

    /// Sends one schema until the acknowledging members cover the connected
    /// members. Returns false when the retries ran out.
    async fn replicate_one(&self, schema: &Schema) -> Result<bool> {
        let schema_id = schema.id();
        let mut acknowledged: HashSet<Uuid> = HashSet::new();
        for attempt in 1..=self.replication_retries {
            if attempt > 1 {
                tokio::time::sleep(self.replication_delay).await;
                if self.channel.member_ids().is_subset(&acknowledged) {
                    self.mark_published(schema_id);
                    return Ok(true);
                }
            }
            acknowledged.extend(self.channel.send_schema(schema).await?);
            let members = self.channel.member_ids();
            if members.is_subset(&acknowledged) {
                self.mark_published(schema_id);
                tracing::info!(
                    schema_id,
                    type_name = schema.type_name(),
                    attempt,
                    "schema replicated to all members"
                );
                return Ok(true);
            }
            tracing::warn!(
                schema_id,
                attempt,
                missing = members.difference(&acknowledged).count(),
                "schema not yet replicated to all members"
            );
        }
        Ok(false)
    }

    fn mark_published(&self, schema_id: i64) {
        if let Some(entry) = self.write().get_mut(&schema_id) {
            entry.published = true;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::serialization::compact::FieldKind;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory cluster: a schema store plus scripted acknowledgements.
    #[derive(Default)]
    pub(crate) struct MockChannel {
        pub(crate) cluster: Mutex<HashMap<i64, Schema>>,
        pub(crate) members: Mutex<HashSet<Uuid>>,
        pub(crate) acks: Mutex<VecDeque<HashSet<Uuid>>>,
        pub(crate) fetches: AtomicUsize,
        pub(crate) sends: AtomicUsize,
        pub(crate) send_alls: AtomicUsize,
    }

    impl MockChannel {
        /// Every member acknowledges every send.
        pub(crate) fn with_members(count: usize) -> Self {
            let channel = Self::default();
            *channel.members.lock().unwrap() = (0..count).map(|_| Uuid::new_v4()).collect();
            channel
        }

        pub(crate) fn member_list(&self) -> Vec<Uuid> {
            let mut members: Vec<Uuid> = self.members.lock().unwrap().iter().copied().collect();
            members.sort();
            members
        }
    }

    #[async_trait]
    impl SchemaChannel for MockChannel {
        async fn fetch_schema(&self, schema_id: i64) -> Result<Option<Schema>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.cluster.lock().unwrap().get(&schema_id).cloned())
        }

        async fn send_schema(&self, schema: &Schema) -> Result<HashSet<Uuid>> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            self.cluster
                .lock()
                .unwrap()
                .insert(schema.id(), schema.clone());
            let scripted = self.acks.lock().unwrap().pop_front();
            Ok(scripted.unwrap_or_else(|| self.members.lock().unwrap().clone()))
        }

        async fn send_all_schemas(&self, schemas: &[Schema]) -> Result<()> {
            self.send_alls.fetch_add(1, Ordering::SeqCst);
            let mut cluster = self.cluster.lock().unwrap();
            for schema in schemas {
                cluster.insert(schema.id(), schema.clone());
            }
            Ok(())
        }

        fn member_ids(&self) -> HashSet<Uuid> {
            self.members.lock().unwrap().clone()
        }
    }

    fn schema(name: &str) -> Schema {
        Schema::new(name, [("value", FieldKind::Int32)]).unwrap()
    }

    fn cache(channel: &Arc<MockChannel>, retries: u32) -> SchemaCache {
        SchemaCache::with_replication(channel.clone(), retries, Duration::from_millis(10))
    }

    #[test]
    fn test_add_and_try_get() {
        let channel = Arc::new(MockChannel::with_members(1));
        let cache = cache(&channel, 3);
        let s = schema("A");
        assert!(cache.try_get(s.id()).is_none());
        cache.add(s.clone(), false);
        assert_eq!(cache.try_get(s.id()), Some(s.clone()));
        assert!(!cache.is_published(s.id()));
        assert_eq!(cache.unpublished(), vec![s.clone()]);
        cache.add(s.clone(), true);
        assert!(cache.is_published(s.id()));
        cache.add(s.clone(), false);
        assert!(cache.is_published(s.id()));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_get_or_fetch_caches_hits() {
        let channel = Arc::new(MockChannel::with_members(1));
        let s = schema("Remote");
        channel.cluster.lock().unwrap().insert(s.id(), s.clone());
        let cache = cache(&channel, 3);
        assert_eq!(cache.get_or_fetch(s.id()).await.unwrap(), Some(s.clone()));
        assert_eq!(cache.get_or_fetch(s.id()).await.unwrap(), Some(s.clone()));
        assert_eq!(channel.fetches.load(Ordering::SeqCst), 1);
        assert!(cache.is_published(s.id()));
    }

    #[tokio::test]
    async fn test_get_or_fetch_does_not_cache_misses() {
        let channel = Arc::new(MockChannel::with_members(1));
        let cache = cache(&channel, 3);
        assert_eq!(cache.get_or_fetch(42).await.unwrap(), None);
        assert_eq!(cache.get_or_fetch(42).await.unwrap(), None);
        assert_eq!(channel.fetches.load(Ordering::SeqCst), 2);
        assert!(matches!(
            cache.require(42).await,
            Err(HazelcastError::UnknownSchema { schema_id: 42 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_converges_across_three_members() {
        let channel = Arc::new(MockChannel::with_members(3));
        let members = channel.member_list();
        channel
            .acks
            .lock()
            .unwrap()
            .push_back(members[..2].iter().copied().collect());
        let cache = cache(&channel, 5);
        let s = schema("Replicated");
        cache.add(s.clone(), false);

        cache.publish().await.unwrap();
        assert_eq!(channel.sends.load(Ordering::SeqCst), 2);
        assert!(cache.is_published(s.id()));

        cache.publish().await.unwrap();
        assert_eq!(channel.sends.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_fails_after_retries() {
        let channel = Arc::new(MockChannel::with_members(2));
        let first = channel.member_list()[0];
        for _ in 0..3 {
            channel
                .acks
                .lock()
                .unwrap()
                .push_back(HashSet::from([first]));
        }
        let cache = cache(&channel, 3);
        let s = schema("Stuck");
        cache.add(s.clone(), false);
        match cache.publish().await {
            Err(HazelcastError::ReplicationIncomplete {
                schema_ids,
                attempts,
            }) => {
                assert_eq!(schema_ids, vec![s.id()]);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!cache.is_published(s.id()));
        assert_eq!(channel.sends.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_succeeds_when_missing_member_leaves() {
        let channel = Arc::new(MockChannel::with_members(2));
        let members = channel.member_list();
        channel
            .acks
            .lock()
            .unwrap()
            .push_back(HashSet::from([members[0]]));
        let cache = cache(&channel, 5);
        let s = schema("Shrinking");
        cache.add(s.clone(), false);

        let publish = cache.publish();
        tokio::pin!(publish);
        // First attempt is acknowledged by one member only; the other leaves
        // before the retry.
        tokio::select! {
            biased;
            _ = &mut publish => panic!("publish should wait for the retry delay"),
            _ = tokio::task::yield_now() => {}
        }
        channel.members.lock().unwrap().remove(&members[1]);
        publish.await.unwrap();
        assert_eq!(channel.sends.load(Ordering::SeqCst), 1);
        assert!(cache.is_published(s.id()));
    }

    #[tokio::test]
    async fn test_publish_ids_only_named() {
        let channel = Arc::new(MockChannel::with_members(1));
        let cache = cache(&channel, 3);
        let a = schema("A");
        let b = schema("B");
        cache.add(a.clone(), false);
        cache.add(b.clone(), false);
        cache.publish_ids(&[a.id(), a.id(), 7]).await.unwrap();
        assert!(cache.is_published(a.id()));
        assert!(!cache.is_published(b.id()));
        assert_eq!(channel.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_publish_all_sends_one_request() {
        let channel = Arc::new(MockChannel::with_members(1));
        let cache = cache(&channel, 3);
        cache.add(schema("A"), true);
        cache.add(schema("B"), false);
        cache.publish_all().await.unwrap();
        assert_eq!(channel.send_alls.load(Ordering::SeqCst), 1);
        assert_eq!(channel.sends.load(Ordering::SeqCst), 0);
        assert!(cache.unpublished().is_empty());
        assert_eq!(channel.cluster.lock().unwrap().len(), 2);
    }

    struct Disconnected;

    #[async_trait]
    impl SchemaChannel for Disconnected {
        async fn fetch_schema(&self, _schema_id: i64) -> Result<Option<Schema>> {
            Err(HazelcastError::Connection("no connection to the cluster".into()))
        }

        async fn send_schema(&self, _schema: &Schema) -> Result<HashSet<Uuid>> {
            Err(HazelcastError::Connection("no connection to the cluster".into()))
        }

        async fn send_all_schemas(&self, _schemas: &[Schema]) -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed").into())
        }

        fn member_ids(&self) -> HashSet<Uuid> {
            HashSet::new()
        }
    }

    #[tokio::test]
    async fn test_channel_failures_propagate() {
        let cache = SchemaCache::with_replication(Arc::new(Disconnected), 3, Duration::ZERO);
        let s = schema("A");
        assert!(matches!(
            cache.get_or_fetch(s.id()).await,
            Err(HazelcastError::Connection(_))
        ));

        cache.add(s.clone(), false);
        let err = cache.publish().await.unwrap_err();
        assert!(matches!(err, HazelcastError::Connection(_)));
        assert!(err.is_retryable());
        assert!(!cache.is_published(s.id()));

        assert!(matches!(cache.publish_all().await, Err(HazelcastError::Io(_))));
        assert!(!cache.is_published(s.id()));
    }
}
