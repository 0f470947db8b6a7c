use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use entity_schemas::config::CacheConfig;
use entity_schemas::{
    CatalogSchema, EntitySchema, EntitySchemaMutation, Result, SchemaCache, SchemaCacheKey, SchemaFetcher,
};

/// Serves whatever schema was published last and counts fetches
struct RemoteCatalog {
    current: Mutex<EntitySchema>,
    fetches: AtomicUsize,
}

impl RemoteCatalog {
    fn new(schema: EntitySchema) -> Self {
        Self {
            current: Mutex::new(schema),
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SchemaFetcher for RemoteCatalog {
    fn fetch_entity_schema(&self, entity_type: &str) -> Result<Option<EntitySchema>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let current = self.current.lock().unwrap();
        Ok((current.name() == entity_type).then(|| current.clone()))
    }

    fn fetch_catalog_schema(&self) -> Result<CatalogSchema> {
        Ok(CatalogSchema::new("shop"))
    }
}

/// `Product` evolved to `version` through description changes
fn product_at(version: u32) -> EntitySchema {
    let catalog = CatalogSchema::new("shop");
    (2..=version).fold(EntitySchema::new("Product"), |schema, v| {
        EntitySchemaMutation::ModifyDescription {
            description: Some(format!("revision {v}")),
        }
        .mutate(&catalog, &schema)
        .unwrap()
        .unwrap()
    })
}

#[test]
fn test_set_latest_skips_fetch_until_removed() {
    let cache = SchemaCache::new(&CacheConfig::default());
    let remote = RemoteCatalog::new(product_at(5));

    cache.set_latest_entity_schema(Arc::new(product_at(5)));
    let latest = cache.latest_entity_schema("Product", &remote).unwrap().unwrap();
    assert_eq!(latest.version(), 5);
    assert_eq!(remote.fetches(), 0);

    cache.remove_latest_entity_schema("Product");
    assert!(cache.contains(&SchemaCacheKey::EntityVersion("Product".into(), 5)));
    cache.latest_entity_schema("Product", &remote).unwrap();
    cache.latest_entity_schema("Product", &remote).unwrap();
    assert_eq!(remote.fetches(), 1);
}

#[test]
fn test_concurrent_publishers_never_regress_latest() {
    let cache = Arc::new(SchemaCache::new(&CacheConfig::default()));
    let versions: Vec<Arc<EntitySchema>> = (1..=24).map(|v| Arc::new(product_at(v))).collect();
    cache.set_latest_entity_schema(Arc::clone(&versions[0]));
    let remote = Arc::new(RemoteCatalog::new(product_at(1)));

    let barrier = Arc::new(Barrier::new(5));
    let mut handles = Vec::new();
    for worker in 0..4 {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        let mine: Vec<_> = versions.iter().skip(worker).step_by(4).cloned().collect();
        handles.push(thread::spawn(move || {
            barrier.wait();
            for schema in mine.into_iter().rev() {
                cache.set_latest_entity_schema(schema);
            }
        }));
    }

    let reader = {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        let remote = Arc::clone(&remote);
        thread::spawn(move || {
            barrier.wait();
            let mut seen = 0;
            for _ in 0..500 {
                let version = cache
                    .latest_entity_schema("Product", remote.as_ref())
                    .unwrap()
                    .unwrap()
                    .version();
                assert!(version >= seen, "latest went from v{seen} back to v{version}");
                seen = version;
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    reader.join().unwrap();

    let latest = cache.latest_entity_schema("Product", remote.as_ref()).unwrap().unwrap();
    assert_eq!(latest.version(), 24);
    assert_eq!(remote.fetches(), 0);
    for version in 1..=24 {
        assert!(cache.contains(&SchemaCacheKey::EntityVersion("Product".into(), version)));
    }
}

#[test]
fn test_concurrent_sweep_runs_once() {
    let now = Arc::new(AtomicI64::new(0));
    let clock = {
        let now = Arc::clone(&now);
        move || now.load(Ordering::SeqCst)
    };
    let config = CacheConfig {
        sweep_interval_secs: 60,
        retention_secs: 30,
    };
    let cache = Arc::new(SchemaCache::with_clock(&config, clock));
    cache.set_latest_entity_schema(Arc::new(product_at(1)));
    now.store(120_000, Ordering::SeqCst);

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.sweep_if_due()
            })
        })
        .collect();
    let sweeps = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|swept| *swept)
        .count();

    assert_eq!(sweeps, 1);
    assert!(cache.is_empty());
}
