//! Freshness-aware local price cache plus the deferred-fetch queue.
//!
//! Reads never block on the network: a missing entry is recorded on the
//! fetch queue and `None` is returned; a stale entry is returned as-is and
//! re-queued (stale-while-revalidate). The batch loader later resolves the
//! queue and writes back through `put`, which clears queue entries by
//! identity.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::store::{migrate, KeyValueStore};
use crate::models::price::PriceRow;
use crate::sources::SourceType;

/// Entries older than this are still served, but trigger a re-fetch.
pub fn stale_after() -> Duration {
    Duration::hours(12)
}

/// A price row as last pulled by this client. `fetched_at` is the client
/// receipt time, distinct from the server-side `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPrice {
    pub row: PriceRow,
    pub fetched_at: DateTime<Utc>,
}

/// A pending request to refresh one (variant, source) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchQueueEntry {
    pub card_id: String,
    pub variant_id: String,
    pub source_type: SourceType,
    /// FIFO ordering hint; entries without one drain last.
    pub added_at: Option<DateTime<Utc>>,
}

pub struct PriceCache<S: KeyValueStore> {
    store: S,
}

fn price_key(variant_id: &str, source_type: SourceType) -> String {
    format!("price:{}|{}", variant_id, source_type)
}

fn queue_key(variant_id: &str, source_type: SourceType) -> String {
    format!("queue:{}|{}", variant_id, source_type)
}

impl<S: KeyValueStore> PriceCache<S> {
    /// Wrap a store, applying any pending schema migrations first.
    pub fn new(mut store: S) -> Self {
        migrate(&mut store);
        Self { store }
    }

    pub fn get(
        &mut self,
        card_id: &str,
        variant_id: &str,
        source_type: SourceType,
    ) -> Option<CachedPrice> {
        self.get_at(Utc::now(), card_id, variant_id, source_type)
    }

    /// Clock-injected variant of `get`.
    pub fn get_at(
        &mut self,
        now: DateTime<Utc>,
        card_id: &str,
        variant_id: &str,
        source_type: SourceType,
    ) -> Option<CachedPrice> {
        let cached = self
            .store
            .get(&price_key(variant_id, source_type))
            .and_then(|raw| serde_json::from_str::<CachedPrice>(&raw).ok());

        match cached {
            None => {
                self.enqueue(now, card_id, variant_id, source_type);
                None
            }
            Some(entry) => {
                if now - entry.fetched_at > stale_after() {
                    self.enqueue(now, card_id, variant_id, source_type);
                }
                Some(entry)
            }
        }
    }

    /// Idempotent overwrite by identity; each written identity's queue entry
    /// is removed unconditionally.
    pub fn put(&mut self, entries: Vec<CachedPrice>) {
        for entry in entries {
            let variant_id = entry.row.variant_id.clone();
            let source_type = entry.row.source_type;

            match serde_json::to_string(&entry) {
                Ok(raw) => {
                    self.store.put(&price_key(&variant_id, source_type), &raw);
                    self.store.remove(&queue_key(&variant_id, source_type));
                }
                Err(e) => {
                    tracing::warn!("Dropping cache write for {}: {}", variant_id, e);
                }
            }
        }
    }

    /// Pending queue entries ordered by `added_at` ascending, `None` last.
    /// Entries stay queued until a `put` resolves them, so an interrupted
    /// batch fetch loses nothing.
    pub fn drain_queue(&mut self) -> Vec<FetchQueueEntry> {
        let mut entries: Vec<FetchQueueEntry> = self
            .store
            .keys_with_prefix("queue:")
            .into_iter()
            .filter_map(|key| {
                let raw = self.store.get(&key)?;
                serde_json::from_str(&raw).ok()
            })
            .collect();

        entries.sort_by_key(|entry| (entry.added_at.is_none(), entry.added_at));
        entries
    }

    /// Queue a refresh. An already-queued identity keeps its original
    /// position; duplicate-looking enqueues are harmless by design.
    fn enqueue(
        &mut self,
        now: DateTime<Utc>,
        card_id: &str,
        variant_id: &str,
        source_type: SourceType,
    ) {
        let key = queue_key(variant_id, source_type);
        if self.store.get(&key).is_some() {
            return;
        }

        let entry = FetchQueueEntry {
            card_id: card_id.to_string(),
            variant_id: variant_id.to_string(),
            source_type,
            added_at: Some(now),
        };

        match serde_json::to_string(&entry) {
            Ok(raw) => self.store.put(&key, &raw),
            Err(e) => tracing::warn!("Dropping queue entry for {}: {}", variant_id, e),
        }
    }
}
