//! Pairing & upsert engine.
//!
//! Joins a normalized payload map (keyed by external product id) against the
//! canonical rows of one source, computes the display price, and writes the
//! results in fixed-size batches: an upsert into `card_prices` plus an
//! append into `card_price_history`, both stamped with the run timestamp.
//!
//! The upsert's conflict clause only touches the derived columns
//! (`updated_at`, `data`, `price`). `source_link` and `source_product_id`
//! are admin-managed configuration and must survive any ingestion run, even
//! one racing a concurrent admin edit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};
use std::collections::HashMap;

use crate::entities::{card_price_history, card_prices, prelude::*};
use crate::sources::{PricePayload, SourceType};

/// Rows per insert statement, bounding transaction size.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// One canonical row successfully paired against the normalized map.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedRow {
    pub card_id: String,
    pub variant_id: String,
    pub source_type: SourceType,
    pub source_link: String,
    pub source_product_id: String,
    pub data: serde_json::Value,
    pub price: Decimal,
    pub run_at: DateTime<Utc>,
}

impl PairedRow {
    fn upsert_model(&self) -> card_prices::ActiveModel {
        card_prices::ActiveModel {
            card_id: Set(self.card_id.clone()),
            variant_id: Set(self.variant_id.clone()),
            source_type: Set(self.source_type),
            source_link: Set(self.source_link.clone()),
            source_product_id: Set(Some(self.source_product_id.clone())),
            updated_at: Set(Some(self.run_at.fixed_offset())),
            data: Set(Some(self.data.clone())),
            price: Set(Some(self.price)),
        }
    }

    fn history_model(&self) -> card_price_history::ActiveModel {
        card_price_history::ActiveModel {
            card_id: Set(self.card_id.clone()),
            variant_id: Set(self.variant_id.clone()),
            source_type: Set(self.source_type),
            data: Set(self.data.clone()),
            price: Set(self.price),
            created_at: Set(self.run_at.fixed_offset()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct PairingSummary {
    pub candidate_rows: usize,
    pub paired: usize,
    pub skipped_no_product_id: usize,
    pub skipped_unmatched: usize,
    pub batches: usize,
}

/// Pure staging step: decide, per canonical row, what will be written.
/// Rows without a pairing key or without a match in the map are skipped.
pub fn stage_pairs(
    rows: Vec<card_prices::Model>,
    normalized: &HashMap<String, PricePayload>,
    run_at: DateTime<Utc>,
    summary: &mut PairingSummary,
) -> Vec<PairedRow> {
    let mut staged = Vec::new();
    summary.candidate_rows = rows.len();

    for row in rows {
        let Some(product_id) = row.source_product_id else {
            summary.skipped_no_product_id += 1;
            continue;
        };

        let Some(payload) = normalized.get(&product_id) else {
            summary.skipped_unmatched += 1;
            continue;
        };

        let data = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    "Skipping {}/{}: payload serialization failed: {}",
                    row.card_id,
                    row.variant_id,
                    e
                );
                continue;
            }
        };

        staged.push(PairedRow {
            card_id: row.card_id,
            variant_id: row.variant_id,
            source_type: row.source_type,
            source_link: row.source_link,
            source_product_id: product_id,
            data,
            price: payload.display_price(),
            run_at,
        });
    }

    summary.paired = staged.len();
    staged
}

/// Run pairing for one source against the given normalized map and persist
/// the results. Safe to re-run with the same map and timestamp: the current
/// table converges, history gains one row per pairing per invocation.
pub async fn pair_and_upsert(
    db: &DatabaseConnection,
    source_type: SourceType,
    normalized: &HashMap<String, PricePayload>,
    run_at: DateTime<Utc>,
) -> Result<PairingSummary, DbErr> {
    let rows = CardPrices::find()
        .filter(card_prices::Column::SourceType.eq(source_type))
        .filter(card_prices::Column::SourceProductId.is_not_null())
        .all(db)
        .await?;

    let mut summary = PairingSummary::default();
    let staged = stage_pairs(rows, normalized, run_at, &mut summary);

    for chunk in staged.chunks(UPSERT_BATCH_SIZE) {
        CardPrices::insert_many(chunk.iter().map(PairedRow::upsert_model))
            .on_conflict(
                OnConflict::columns([
                    card_prices::Column::CardId,
                    card_prices::Column::VariantId,
                    card_prices::Column::SourceType,
                ])
                .update_columns([
                    card_prices::Column::UpdatedAt,
                    card_prices::Column::Data,
                    card_prices::Column::Price,
                ])
                .to_owned(),
            )
            .exec(db)
            .await?;

        CardPriceHistory::insert_many(chunk.iter().map(PairedRow::history_model))
            .exec(db)
            .await?;

        summary.batches += 1;
    }

    tracing::info!(
        "Pairing complete for {}: {} candidates, {} paired, {} without product id, {} unmatched, {} batches",
        source_type,
        summary.candidate_rows,
        summary.paired,
        summary.skipped_no_product_id,
        summary.skipped_unmatched,
        summary.batches
    );

    Ok(summary)
}
