//! Schema cache shared by every caller of one catalog
//!
//! Schemas are fetched from a [`SchemaFetcher`] on demand and kept under three key
//! shapes: the latest catalog schema, the latest schema of an entity type and an entity
//! schema at an exact version. A fetched entity schema is stored under both its exact
//! version and the latest pointer; the latest pointer never moves back to an older
//! version, whatever order concurrent fetches complete in.
//!
//! Entries unused for longer than the retention window are evicted by a sweep that runs
//! at most once per sweep interval, on whichever thread gets there first.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::error::{Result, SchemaError};
use crate::mutation::SchemaChange;
use crate::schema::{CatalogSchema, EntitySchema};

/// Source of schemas the cache falls back to on a miss
///
/// Implementations are called concurrently and possibly several times for the same miss.
pub trait SchemaFetcher: Send + Sync {
    /// Latest schema of an entity type, `None` when the type doesn't exist
    fn fetch_entity_schema(&self, entity_type: &str) -> Result<Option<EntitySchema>>;

    fn fetch_catalog_schema(&self) -> Result<CatalogSchema>;
}

/// Millisecond wall clock used for usage timestamps and sweep throttling
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

impl<F: Fn() -> i64 + Send + Sync> Clock for F {
    fn now_millis(&self) -> i64 {
        self()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaCacheKey {
    CatalogLatest,
    EntityLatest(String),
    EntityVersion(String, u32),
}

#[derive(Debug, Clone)]
enum CachedSchema {
    Catalog(Arc<CatalogSchema>),
    Entity(Arc<EntitySchema>),
}

impl CachedSchema {
    fn version(&self) -> u32 {
        match self {
            CachedSchema::Catalog(schema) => schema.version(),
            CachedSchema::Entity(schema) => schema.version(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    schema: CachedSchema,
    last_used: AtomicI64,
}

impl CacheEntry {
    fn new(schema: CachedSchema, now: i64) -> Self {
        Self {
            schema,
            last_used: AtomicI64::new(now),
        }
    }
}

pub struct SchemaCache<C: Clock = SystemClock> {
    entries: DashMap<SchemaCacheKey, CacheEntry>,
    last_sweep: AtomicI64,
    sweep_interval_ms: i64,
    retention_ms: i64,
    clock: C,
}

impl SchemaCache<SystemClock> {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for SchemaCache<SystemClock> {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl<C: Clock> SchemaCache<C> {
    pub fn with_clock(config: &CacheConfig, clock: C) -> Self {
        let millis = |secs: u64| i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        Self {
            entries: DashMap::new(),
            last_sweep: AtomicI64::new(clock.now_millis()),
            sweep_interval_ms: millis(config.sweep_interval_secs),
            retention_ms: millis(config.retention_secs),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &SchemaCacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Cached entry, marking it used
    fn lookup(&self, key: &SchemaCacheKey) -> Option<CachedSchema> {
        let entry = self.entries.get(key)?;
        entry.last_used.store(self.clock.now_millis(), Ordering::Relaxed);
        Some(entry.schema.clone())
    }

    /// Insert under `key` unless a newer schema is cached there
    fn store_not_older(&self, key: SchemaCacheKey, schema: CachedSchema) {
        let now = self.clock.now_millis();
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().schema.version() <= schema.version() {
                    occupied.insert(CacheEntry::new(schema, now));
                } else {
                    trace!(key = ?occupied.key(), "keeping newer cached schema");
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(schema, now));
            }
        }
    }

    fn store_entity_schema(&self, schema: &Arc<EntitySchema>) {
        let name = schema.name().to_string();
        self.entries.insert(
            SchemaCacheKey::EntityVersion(name.clone(), schema.version()),
            CacheEntry::new(CachedSchema::Entity(Arc::clone(schema)), self.clock.now_millis()),
        );
        self.store_not_older(SchemaCacheKey::EntityLatest(name), CachedSchema::Entity(Arc::clone(schema)));
    }

    /// Latest catalog schema, fetched on a miss
    pub fn latest_catalog_schema(&self, fetcher: &dyn SchemaFetcher) -> Result<Arc<CatalogSchema>> {
        self.sweep_if_due();
        if let Some(CachedSchema::Catalog(schema)) = self.lookup(&SchemaCacheKey::CatalogLatest) {
            trace!("catalog schema cache hit");
            return Ok(schema);
        }
        self.fetch_catalog_schema(fetcher)
    }

    fn fetch_catalog_schema(&self, fetcher: &dyn SchemaFetcher) -> Result<Arc<CatalogSchema>> {
        let schema = Arc::new(fetcher.fetch_catalog_schema()?);
        debug!(catalog = %schema.name(), version = schema.version(), "catalog schema fetched");
        self.store_not_older(SchemaCacheKey::CatalogLatest, CachedSchema::Catalog(Arc::clone(&schema)));
        Ok(schema)
    }

    /// Latest schema of `entity_type`, fetched on a miss; `None` when the type doesn't exist
    pub fn latest_entity_schema(
        &self,
        entity_type: &str,
        fetcher: &dyn SchemaFetcher,
    ) -> Result<Option<Arc<EntitySchema>>> {
        self.latest_entity_schema_with(entity_type, fetcher, |_| false)
    }

    /// Like [`latest_entity_schema`](Self::latest_entity_schema), also refetching when
    /// `should_refetch` rejects the cached schema
    pub fn latest_entity_schema_with(
        &self,
        entity_type: &str,
        fetcher: &dyn SchemaFetcher,
        should_refetch: impl Fn(&EntitySchema) -> bool,
    ) -> Result<Option<Arc<EntitySchema>>> {
        self.sweep_if_due();
        if let Some(CachedSchema::Entity(schema)) = self.lookup(&SchemaCacheKey::EntityLatest(entity_type.to_string())) {
            if !should_refetch(&schema) {
                trace!(entity_type, version = schema.version(), "entity schema cache hit");
                return Ok(Some(schema));
            }
        }
        self.fetch_entity_schema(entity_type, fetcher)
    }

    fn fetch_entity_schema(&self, entity_type: &str, fetcher: &dyn SchemaFetcher) -> Result<Option<Arc<EntitySchema>>> {
        let Some(schema) = fetcher.fetch_entity_schema(entity_type)? else {
            debug!(entity_type, "entity schema not found");
            return Ok(None);
        };
        if schema.name() != entity_type {
            return Err(SchemaError::Fetch(format!(
                "asked for the schema of `{entity_type}`, got `{}`",
                schema.name()
            )));
        }
        let schema = Arc::new(schema);
        debug!(entity_type, version = schema.version(), "entity schema fetched");
        self.store_entity_schema(&schema);
        Ok(Some(schema))
    }

    /// Schema of `entity_type` at exactly `version`
    ///
    /// A miss fetches the latest schema; if that isn't the requested version the call fails
    /// with [`SchemaError::VersionUnavailable`].
    pub fn entity_schema(
        &self,
        entity_type: &str,
        version: u32,
        fetcher: &dyn SchemaFetcher,
    ) -> Result<Arc<EntitySchema>> {
        self.sweep_if_due();
        let key = SchemaCacheKey::EntityVersion(entity_type.to_string(), version);
        if let Some(CachedSchema::Entity(schema)) = self.lookup(&key) {
            trace!(entity_type, version, "versioned entity schema cache hit");
            return Ok(schema);
        }
        let latest = self
            .fetch_entity_schema(entity_type, fetcher)?
            .ok_or_else(|| SchemaError::EntityTypeNotFound(entity_type.to_string()))?;
        if latest.version() == version {
            Ok(latest)
        } else {
            Err(SchemaError::VersionUnavailable {
                entity_type: entity_type.to_string(),
                requested: version,
                latest: latest.version(),
            })
        }
    }

    /// Record a schema known to be current, e.g. after a committed change
    pub fn set_latest_entity_schema(&self, schema: Arc<EntitySchema>) {
        debug!(entity_type = %schema.name(), version = schema.version(), "latest entity schema set");
        self.store_entity_schema(&schema);
    }

    pub fn set_latest_catalog_schema(&self, schema: Arc<CatalogSchema>) {
        debug!(catalog = %schema.name(), version = schema.version(), "latest catalog schema set");
        self.store_not_older(SchemaCacheKey::CatalogLatest, CachedSchema::Catalog(schema));
    }

    pub fn remove_latest_entity_schema(&self, entity_type: &str) {
        if self
            .entries
            .remove(&SchemaCacheKey::EntityLatest(entity_type.to_string()))
            .is_some()
        {
            debug!(entity_type, "latest entity schema evicted");
        }
    }

    pub fn remove_latest_catalog_schema(&self) {
        if self.entries.remove(&SchemaCacheKey::CatalogLatest).is_some() {
            debug!("latest catalog schema evicted");
        }
    }

    /// Evict the entries a committed change made stale
    ///
    /// An entity change evicts that type's latest pointer only; versioned entries stay valid.
    /// A removed entity type loses every entry.
    pub fn apply(&self, change: &SchemaChange) {
        match change {
            SchemaChange::Catalog(_) => self.remove_latest_catalog_schema(),
            SchemaChange::Entity(mutation) => self.remove_latest_entity_schema(&mutation.entity_type),
            SchemaChange::EntityRemoved { entity_type } => {
                self.entries.retain(|key, _| match key {
                    SchemaCacheKey::EntityLatest(name) | SchemaCacheKey::EntityVersion(name, _) => name != entity_type,
                    SchemaCacheKey::CatalogLatest => true,
                });
                debug!(entity_type = %entity_type, "entity type evicted");
            }
        }
    }

    /// Sweep if the interval since the last sweep elapsed and no other thread claimed it
    pub fn sweep_if_due(&self) -> bool {
        let now = self.clock.now_millis();
        let last = self.last_sweep.load(Ordering::Acquire);
        if now.saturating_sub(last) < self.sweep_interval_ms {
            return false;
        }
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.sweep(now);
        true
    }

    fn sweep(&self, now: i64) {
        let threshold = now.saturating_sub(self.retention_ms);
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.last_used.load(Ordering::Relaxed) >= threshold);
        let evicted = before.saturating_sub(self.entries.len());
        debug!(evicted, remaining = self.entries.len(), "schema cache swept");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Fetcher {
        schemas: Mutex<Vec<EntitySchema>>,
        entity_fetches: AtomicUsize,
        catalog_fetches: AtomicUsize,
    }

    impl Fetcher {
        fn serving(schema: EntitySchema) -> Self {
            let fetcher = Fetcher::default();
            fetcher.schemas.lock().unwrap().push(schema);
            fetcher
        }
    }

    impl SchemaFetcher for Fetcher {
        fn fetch_entity_schema(&self, entity_type: &str) -> Result<Option<EntitySchema>> {
            self.entity_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .schemas
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|s| s.name() == entity_type)
                .cloned())
        }

        fn fetch_catalog_schema(&self) -> Result<CatalogSchema> {
            self.catalog_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(CatalogSchema::new("shop"))
        }
    }

    fn evolved(name: &str, times: u32) -> EntitySchema {
        (0..times).fold(EntitySchema::new(name), |schema, _| schema.evolve(|_| {}).unwrap())
    }

    #[test]
    fn test_fetch_once_then_hit() {
        let cache = SchemaCache::new(&CacheConfig::default());
        let fetcher = Fetcher::serving(EntitySchema::new("Product"));
        for _ in 0..3 {
            let schema = cache.latest_entity_schema("Product", &fetcher).unwrap().unwrap();
            assert_eq!(schema.version(), 1);
        }
        assert_eq!(fetcher.entity_fetches.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&SchemaCacheKey::EntityVersion("Product".into(), 1)));
        assert!(cache.latest_entity_schema("Brand", &fetcher).unwrap().is_none());
    }

    #[test]
    fn test_latest_pointer_never_regresses() {
        let cache = SchemaCache::new(&CacheConfig::default());
        cache.set_latest_entity_schema(Arc::new(evolved("Product", 4)));
        let fetcher = Fetcher::serving(evolved("Product", 2));
        let refetched = cache
            .latest_entity_schema_with("Product", &fetcher, |_| true)
            .unwrap()
            .unwrap();
        assert_eq!(refetched.version(), 3);
        let latest = cache.latest_entity_schema("Product", &fetcher).unwrap().unwrap();
        assert_eq!(latest.version(), 5);
        assert!(cache.contains(&SchemaCacheKey::EntityVersion("Product".into(), 3)));
    }

    #[test]
    fn test_exact_version() {
        let cache = SchemaCache::new(&CacheConfig::default());
        let fetcher = Fetcher::serving(evolved("Product", 1));
        assert_eq!(cache.entity_schema("Product", 2, &fetcher).unwrap().version(), 2);
        let err = cache.entity_schema("Product", 7, &fetcher).unwrap_err();
        assert!(matches!(err, SchemaError::VersionUnavailable { requested: 7, latest: 2, .. }));
        assert!(matches!(
            cache.entity_schema("Brand", 1, &fetcher).unwrap_err(),
            SchemaError::EntityTypeNotFound(_)
        ));
    }

    #[test]
    fn test_change_invalidation() {
        use crate::mutation::{ModifyCatalogSchemaMutation, ModifyEntitySchemaMutation};

        let cache = SchemaCache::new(&CacheConfig::default());
        let fetcher = Fetcher::default();
        cache.set_latest_entity_schema(Arc::new(EntitySchema::new("Product")));
        cache.set_latest_entity_schema(Arc::new(EntitySchema::new("Brand")));
        cache.latest_catalog_schema(&fetcher).unwrap();
        assert_eq!(cache.len(), 5);

        cache.apply(&SchemaChange::Entity(ModifyEntitySchemaMutation::new("Product", vec![])));
        assert!(!cache.contains(&SchemaCacheKey::EntityLatest("Product".into())));
        assert!(cache.contains(&SchemaCacheKey::EntityVersion("Product".into(), 1)));
        assert!(cache.contains(&SchemaCacheKey::EntityLatest("Brand".into())));

        cache.apply(&SchemaChange::Catalog(ModifyCatalogSchemaMutation::default()));
        assert!(!cache.contains(&SchemaCacheKey::CatalogLatest));

        cache.apply(&SchemaChange::EntityRemoved {
            entity_type: "Brand".into(),
        });
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sweep_throttled_and_evicts_unused() {
        let now = Arc::new(AtomicI64::new(0));
        let clock = {
            let now = Arc::clone(&now);
            move || now.load(Ordering::SeqCst)
        };
        let config = CacheConfig {
            sweep_interval_secs: 60,
            retention_secs: 600,
        };
        let cache = SchemaCache::with_clock(&config, clock);
        let fetcher = Fetcher::serving(EntitySchema::new("Product"));
        cache.set_latest_entity_schema(Arc::new(EntitySchema::new("Brand")));

        now.store(30_000, Ordering::SeqCst);
        assert!(!cache.sweep_if_due());

        now.store(500_000, Ordering::SeqCst);
        cache.latest_entity_schema("Product", &fetcher).unwrap();

        now.store(700_000, Ordering::SeqCst);
        assert!(cache.sweep_if_due());
        assert!(!cache.contains(&SchemaCacheKey::EntityLatest("Brand".into())));
        assert!(cache.contains(&SchemaCacheKey::EntityLatest("Product".into())));
        assert!(!cache.sweep_if_due());
    }
}
