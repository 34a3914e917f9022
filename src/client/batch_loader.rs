//! Batch loader: coalesces pending price fetches into one bulk request per
//! source type.
//!
//! Composite ids arrive as `"{variant_id}|{source_type}"`. Ids with an
//! unrecognized source type are dropped, not failed: to this client they are
//! simply not applicable. Every id that survives grouping ends up with a
//! cache entry after a successful load, either a real row or a placeholder
//! marking "queried, confirmed absent".

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

use super::cache::{CachedPrice, PriceCache};
use super::store::KeyValueStore;
use crate::models::price::{BulkLoadRequest, BulkLoadResponse, PriceRow};
use crate::sources::{SourceGroups, SourceType};

#[derive(Debug)]
pub enum TransportError {
    /// HTTP 404 for the group: terminal, never retried.
    NotFound,
    Status(u16, String),
    Network(String),
}

impl TransportError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportError::NotFound)
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::NotFound => write!(f, "Bulk endpoint returned not found"),
            TransportError::Status(code, body) => write!(f, "Bulk endpoint HTTP {}: {}", code, body),
            TransportError::Network(msg) => write!(f, "Network error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Transport seam for the bulk-load endpoint. The retry policy lives in the
/// implementation, not in the loader.
#[async_trait]
pub trait PriceTransport {
    async fn bulk_load(
        &self,
        source_type: SourceType,
        variant_ids: &[String],
    ) -> Result<Vec<PriceRow>, TransportError>;
}

#[derive(Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub retry_max: u32,
    pub retry_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            retry_max: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// HTTP transport against `POST /card-prices/bulk-load`, retrying
/// non-terminal failures up to `retry_max` times.
#[derive(Clone)]
pub struct HttpPriceTransport {
    client: Client,
    config: TransportConfig,
}

impl HttpPriceTransport {
    pub fn new(config: TransportConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()
            .expect("Failed to build HTTP client");

        Self { client, config }
    }

    async fn try_bulk_load(
        &self,
        source_type: SourceType,
        variant_ids: &[String],
    ) -> Result<Vec<PriceRow>, TransportError> {
        let url = format!("{}/card-prices/bulk-load", self.config.base_url);
        let body = BulkLoadRequest {
            source_type,
            variant_ids: variant_ids.to_vec(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Status(status.as_u16(), text));
        }

        let parsed: BulkLoadResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(parsed.data)
    }
}

#[async_trait]
impl PriceTransport for HttpPriceTransport {
    async fn bulk_load(
        &self,
        source_type: SourceType,
        variant_ids: &[String],
    ) -> Result<Vec<PriceRow>, TransportError> {
        let mut attempt = 0;
        loop {
            match self.try_bulk_load(source_type, variant_ids).await {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_terminal() || attempt >= self.config.retry_max => return Err(e),
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(
                        "Bulk load for {} failed (attempt {}/{}): {}",
                        source_type,
                        attempt,
                        self.config.retry_max,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct GroupStats {
    pub found: usize,
    pub placeholders: usize,
}

/// Per-source outcome of one load. Groups succeed and fail independently.
#[derive(Debug)]
pub struct GroupOutcome {
    pub source_type: SourceType,
    pub requested: usize,
    pub result: Result<GroupStats, TransportError>,
}

/// Split a composite id into its variant id and source type. Ids without a
/// separator or with an unknown source type yield `None`.
pub fn parse_composite_id(id: &str) -> Option<(String, SourceType)> {
    let (variant_id, source) = id.split_once('|')?;
    if variant_id.is_empty() {
        return None;
    }
    Some((variant_id.to_string(), SourceType::parse(source)?))
}

pub struct BatchLoader<T: PriceTransport> {
    transport: T,
}

impl<T: PriceTransport> BatchLoader<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Load the given composite ids through one request per source group and
    /// persist the merged results. After a group succeeds, every requested
    /// id in it has a cache entry and no queue entry.
    pub async fn load<S: KeyValueStore>(
        &self,
        cache: &mut PriceCache<S>,
        composite_ids: &[String],
    ) -> Vec<GroupOutcome> {
        let mut groups = SourceGroups::default();
        for id in composite_ids {
            match parse_composite_id(id) {
                Some((variant_id, source_type)) => groups.push(source_type, variant_id),
                None => tracing::debug!("Dropping request id with unknown source: {}", id),
            }
        }

        let mut outcomes = Vec::new();

        for (source_type, variant_ids) in groups.non_empty() {
            let outcome = match self.transport.bulk_load(source_type, variant_ids).await {
                Ok(rows) => {
                    let stats = merge_into_cache(cache, source_type, variant_ids, rows);
                    GroupOutcome {
                        source_type,
                        requested: variant_ids.len(),
                        result: Ok(stats),
                    }
                }
                Err(e) => {
                    tracing::warn!("Bulk load group {} failed: {}", source_type, e);
                    GroupOutcome {
                        source_type,
                        requested: variant_ids.len(),
                        result: Err(e),
                    }
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Load everything currently waiting on the fetch queue.
    pub async fn drain<S: KeyValueStore>(&self, cache: &mut PriceCache<S>) -> Vec<GroupOutcome> {
        let composite_ids: Vec<String> = cache
            .drain_queue()
            .into_iter()
            .map(|entry| format!("{}|{}", entry.variant_id, entry.source_type))
            .collect();

        if composite_ids.is_empty() {
            return Vec::new();
        }

        self.load(cache, &composite_ids).await
    }
}

/// Merge found rows with placeholders for confirmed-absent ids and write the
/// whole group to the cache in one `put`.
fn merge_into_cache<S: KeyValueStore>(
    cache: &mut PriceCache<S>,
    source_type: SourceType,
    requested: &[String],
    rows: Vec<PriceRow>,
) -> GroupStats {
    let now = Utc::now();
    let mut by_variant: HashMap<String, PriceRow> = rows
        .into_iter()
        .map(|row| (row.variant_id.clone(), row))
        .collect();

    let mut entries = Vec::with_capacity(requested.len());
    let mut found = 0;
    let mut placeholders = 0;

    for variant_id in requested {
        let row = match by_variant.remove(variant_id) {
            Some(row) => {
                found += 1;
                row
            }
            None => {
                placeholders += 1;
                placeholder_row(variant_id, source_type)
            }
        };
        entries.push(CachedPrice {
            row,
            fetched_at: now,
        });
    }

    cache.put(entries);

    GroupStats {
        found,
        placeholders,
    }
}

/// "Queried, confirmed absent" marker: distinguishable from "never checked"
/// by its presence, and from a real row by its empty fields.
fn placeholder_row(variant_id: &str, source_type: SourceType) -> PriceRow {
    PriceRow {
        card_id: String::new(),
        variant_id: variant_id.to_string(),
        source_type,
        source_link: String::new(),
        source_product_id: None,
        updated_at: Some(Utc::now()),
        data: None,
        price: None,
    }
}
