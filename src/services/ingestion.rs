//! Ingestion pipeline.
//!
//! Pulls raw data from one external source, archives it, normalizes it into
//! the shared payload map, and hands the map to the pairing engine. Also
//! hosts the on-demand single-item scrape refresh.

use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use std::collections::HashMap;

use crate::entities::{card_price_history, card_prices, prelude::*};
use crate::services::blob_store::ArtifactStore;
use crate::services::pairing::{self, PairingSummary};
use crate::sources::cardmarket::{CardmarketScraper, ScrapeError};
use crate::sources::tcgplayer::{normalize_rows, FeedError, TcgplayerFeed};
use crate::sources::{PricePayload, SourceType};

/// Name of the merged per-day normalized artifact.
const NORMALIZED_ARTIFACT: &str = "normalized.json";

#[derive(Debug)]
pub enum IngestionError {
    Feed(FeedError),
    Scrape(ScrapeError),
    Database(DbErr),
    Storage(std::io::Error),
    Serialization(serde_json::Error),
    /// The targeted canonical row does not exist.
    NotFound {
        card_id: String,
        variant_id: String,
        source_type: SourceType,
    },
    /// Single-item refresh is only implemented for the scrape source.
    UnsupportedSource(SourceType),
}

impl std::fmt::Display for IngestionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestionError::Feed(e) => write!(f, "{}", e),
            IngestionError::Scrape(e) => write!(f, "{}", e),
            IngestionError::Database(e) => write!(f, "Database error: {}", e),
            IngestionError::Storage(e) => write!(f, "Artifact storage error: {}", e),
            IngestionError::Serialization(e) => write!(f, "Serialization error: {}", e),
            IngestionError::NotFound {
                card_id,
                variant_id,
                source_type,
            } => write!(
                f,
                "No price row for card {} variant {} source {}",
                card_id, variant_id, source_type
            ),
            IngestionError::UnsupportedSource(source_type) => {
                write!(f, "Price fetch is not supported for source {}", source_type)
            }
        }
    }
}

impl std::error::Error for IngestionError {}

impl From<FeedError> for IngestionError {
    fn from(e: FeedError) -> Self {
        IngestionError::Feed(e)
    }
}

impl From<ScrapeError> for IngestionError {
    fn from(e: ScrapeError) -> Self {
        IngestionError::Scrape(e)
    }
}

impl From<DbErr> for IngestionError {
    fn from(e: DbErr) -> Self {
        IngestionError::Database(e)
    }
}

impl From<std::io::Error> for IngestionError {
    fn from(e: std::io::Error) -> Self {
        IngestionError::Storage(e)
    }
}

impl From<serde_json::Error> for IngestionError {
    fn from(e: serde_json::Error) -> Self {
        IngestionError::Serialization(e)
    }
}

#[derive(Debug)]
pub struct IngestionReport {
    pub run_id: uuid::Uuid,
    pub run_date: NaiveDate,
    /// True when the same-day normalized artifact was reused instead of
    /// re-fetching the feed.
    pub reused_artifact: bool,
    pub normalized_products: usize,
    pub pairing: PairingSummary,
}

#[derive(Clone)]
pub struct IngestionService {
    db: DatabaseConnection,
    feed: TcgplayerFeed,
    scraper: CardmarketScraper,
    artifacts: ArtifactStore,
}

impl IngestionService {
    pub fn new(
        db: DatabaseConnection,
        feed: TcgplayerFeed,
        scraper: CardmarketScraper,
        artifacts: ArtifactStore,
    ) -> Self {
        Self {
            db,
            feed,
            scraper,
            artifacts,
        }
    }

    /// Run a full bulk-feed ingestion: build (or reuse) today's normalized
    /// map, then pair it against the canonical rows.
    pub async fn run_bulk_feed(&self, force: bool) -> Result<IngestionReport, IngestionError> {
        let run_id = uuid::Uuid::new_v4();
        let run_date = Utc::now().date_naive();
        let run_at = Utc::now();

        tracing::info!("Starting bulk feed ingestion run {}", run_id);

        let (normalized, reused_artifact) = self.load_or_build_normalized(run_date, force).await?;

        let pairing =
            pairing::pair_and_upsert(&self.db, SourceType::Tcgplayer, &normalized, run_at).await?;

        Ok(IngestionReport {
            run_id,
            run_date,
            reused_artifact,
            normalized_products: normalized.len(),
            pairing,
        })
    }

    /// Today's normalized map: reused from the dated artifact when present
    /// (unless forced), otherwise rebuilt from the live feed.
    ///
    /// A failed group index aborts the run; a failed individual group is
    /// logged and skipped, and the merged map reflects the groups that
    /// succeeded. Raw bodies are archived before any normalization.
    pub async fn load_or_build_normalized(
        &self,
        run_date: NaiveDate,
        force: bool,
    ) -> Result<(HashMap<String, PricePayload>, bool), IngestionError> {
        if !force {
            if let Some(bytes) = self
                .artifacts
                .get(SourceType::Tcgplayer, run_date, NORMALIZED_ARTIFACT)
                .await?
            {
                match serde_json::from_slice::<HashMap<String, PricePayload>>(&bytes) {
                    Ok(map) => {
                        tracing::info!(
                            "Reusing normalized artifact for {} ({} products)",
                            run_date,
                            map.len()
                        );
                        return Ok((map, true));
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Discarding unreadable normalized artifact for {}: {}",
                            run_date,
                            e
                        );
                    }
                }
            }
        }

        let (raw_groups, groups) = self.feed.fetch_groups().await?;
        self.artifacts
            .put(
                SourceType::Tcgplayer,
                run_date,
                "groups.json",
                raw_groups.as_bytes(),
            )
            .await?;

        tracing::info!("Fetched {} feed groups", groups.len());

        let mut merged: HashMap<String, PricePayload> = HashMap::new();
        let mut failed_groups = 0;

        // Sequential on purpose: one in-flight request against the provider
        for group in &groups {
            match self.feed.fetch_group_prices(group.group_id).await {
                Ok((raw, rows)) => {
                    self.artifacts
                        .put(
                            SourceType::Tcgplayer,
                            run_date,
                            &format!("group-{}.json", group.group_id),
                            raw.as_bytes(),
                        )
                        .await?;
                    merged.extend(normalize_rows(rows));
                }
                Err(e) => {
                    failed_groups += 1;
                    tracing::warn!(
                        "Skipping group {} ({}): {}",
                        group.group_id,
                        group.name,
                        e
                    );
                }
            }
        }

        if failed_groups > 0 {
            tracing::warn!(
                "Partial ingestion: {}/{} groups failed",
                failed_groups,
                groups.len()
            );
        }

        let merged_bytes = serde_json::to_vec(&merged)?;
        self.artifacts
            .put(
                SourceType::Tcgplayer,
                run_date,
                NORMALIZED_ARTIFACT,
                &merged_bytes,
            )
            .await?;

        Ok((merged, false))
    }

    /// Immediate single-item refresh for the scrape source. Terminal error
    /// for this one item on any fetch/parse failure; no retry.
    pub async fn refresh_single(
        &self,
        card_id: &str,
        variant_id: &str,
        source_type: SourceType,
    ) -> Result<card_prices::Model, IngestionError> {
        if source_type != SourceType::Cardmarket {
            return Err(IngestionError::UnsupportedSource(source_type));
        }

        let row = CardPrices::find_by_id((
            card_id.to_string(),
            variant_id.to_string(),
            source_type,
        ))
        .one(&self.db)
        .await?
        .ok_or_else(|| IngestionError::NotFound {
            card_id: card_id.to_string(),
            variant_id: variant_id.to_string(),
            source_type,
        })?;

        let scraped = self.scraper.fetch_product_page(&row.source_link).await?;
        let payload = PricePayload::Cardmarket(scraped);
        let data = serde_json::to_value(&payload)?;
        let price = payload.display_price();
        let run_at = Utc::now();

        let mut active: card_prices::ActiveModel = row.into();
        active.updated_at = Set(Some(run_at.fixed_offset()));
        active.data = Set(Some(data.clone()));
        active.price = Set(Some(price));
        let updated = active.update(&self.db).await?;

        card_price_history::ActiveModel {
            card_id: Set(updated.card_id.clone()),
            variant_id: Set(updated.variant_id.clone()),
            source_type: Set(updated.source_type),
            data: Set(data),
            price: Set(price),
            created_at: Set(run_at.fixed_offset()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        tracing::info!(
            "Refreshed {}/{} from {} (price {})",
            updated.card_id,
            updated.variant_id,
            updated.source_type,
            price
        );

        Ok(updated)
    }
}
