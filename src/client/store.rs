//! Client-local key-value storage.
//!
//! The cache and fetch queue live on top of an explicit store interface with
//! versioned schema migrations applied at startup. Each migration is a pure,
//! idempotent function over the store, so re-running the whole chain is
//! always safe.

/// Minimal synchronous key-value interface. The cache subsystem is
/// single-writer, so no interior locking is needed here.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

/// In-memory store. Ordered map so key listings are deterministic.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: std::collections::BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }
}

pub const SCHEMA_VERSION_KEY: &str = "meta:schema_version";

pub struct StoreMigration {
    pub version: u32,
    pub name: &'static str,
    pub apply: fn(&mut dyn KeyValueStore),
}

/// Migration chain, oldest first. Versions are contiguous from 1.
pub fn migrations() -> Vec<StoreMigration> {
    vec![
        StoreMigration {
            version: 1,
            name: "namespace price entries",
            apply: namespace_price_entries,
        },
        StoreMigration {
            version: 2,
            name: "drop retired queue namespace",
            apply: drop_retired_queue_namespace,
        },
    ]
}

/// Bring a store up to the current schema version. Idempotent: already
/// applied migrations are skipped via the persisted version marker, and each
/// step is itself a no-op on already-migrated data.
pub fn migrate(store: &mut dyn KeyValueStore) {
    let current: u32 = store
        .get(SCHEMA_VERSION_KEY)
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);

    let mut latest = current;
    for migration in migrations() {
        if migration.version <= current {
            continue;
        }
        tracing::info!(
            "Applying store migration v{}: {}",
            migration.version,
            migration.name
        );
        (migration.apply)(store);
        latest = migration.version;
    }

    if latest != current {
        store.put(SCHEMA_VERSION_KEY, &latest.to_string());
    }
}

/// v1: early builds stored price entries under bare "variant|source" keys.
/// Move them into the "price:" namespace.
fn namespace_price_entries(store: &mut dyn KeyValueStore) {
    for key in store.keys_with_prefix("") {
        if key.contains('|') && !key.contains(':') {
            if let Some(value) = store.get(&key) {
                store.put(&format!("price:{}", key), &value);
                store.remove(&key);
            }
        }
    }
}

/// v2: the pre-release fetch queue lived under "queue_v0:" and stored bare
/// variant ids without a card id. Those entries cannot be batch-loaded, so
/// they are dropped; reads repopulate the queue on demand.
fn drop_retired_queue_namespace(store: &mut dyn KeyValueStore) {
    for key in store.keys_with_prefix("queue_v0:") {
        store.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_stamps_schema_version() {
        let mut store = MemoryStore::new();
        migrate(&mut store);
        assert_eq!(store.get(SCHEMA_VERSION_KEY), Some("2".to_string()));
    }

    #[test]
    fn test_migrate_moves_legacy_price_keys() {
        let mut store = MemoryStore::new();
        store.put("v1|cardmarket", "{\"legacy\":true}");
        store.put("price:v2|tcgplayer", "{\"current\":true}");

        migrate(&mut store);

        assert_eq!(store.get("v1|cardmarket"), None);
        assert_eq!(store.get("price:v1|cardmarket"), Some("{\"legacy\":true}".to_string()));
        assert_eq!(store.get("price:v2|tcgplayer"), Some("{\"current\":true}".to_string()));
    }

    #[test]
    fn test_migrate_drops_retired_queue_entries() {
        let mut store = MemoryStore::new();
        store.put("queue_v0:v1", "v1");
        store.put("queue:v2|cardmarket", "{}");

        migrate(&mut store);

        assert_eq!(store.get("queue_v0:v1"), None);
        assert_eq!(store.get("queue:v2|cardmarket"), Some("{}".to_string()));
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let mut store = MemoryStore::new();
        store.put("v1|cardmarket", "{\"legacy\":true}");

        migrate(&mut store);
        let snapshot = store.clone();
        migrate(&mut store);

        assert_eq!(store.entries, snapshot.entries);
    }

    #[test]
    fn test_keys_with_prefix() {
        let mut store = MemoryStore::new();
        store.put("price:a", "1");
        store.put("price:b", "2");
        store.put("queue:a", "3");

        assert_eq!(store.keys_with_prefix("price:").len(), 2);
        assert_eq!(store.keys_with_prefix("queue:"), vec!["queue:a".to_string()]);
    }
}
