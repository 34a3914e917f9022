//! Handlers for the /card-prices endpoints.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{Duration, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, Order, QueryFilter, QueryOrder, Set};

use crate::entities::{card_price_history, card_prices, prelude::*};
use crate::models::price::{
    BulkLoadRequest, BulkLoadResponse, CreateSourceRequest, ErrorResponse, FetchPriceRequest,
    FetchPriceResponse, HistoryQuery, HistoryResponse, HistoryRow, PriceIdentityQuery, PriceRow,
};
use crate::services::ingestion::IngestionError;
use crate::AppState;

/// Admin endpoints authenticate with this header.
const ADMIN_KEY_HEADER: &str = "x-api-key";

/// Upper bound on ids per bulk-load request.
const MAX_BULK_IDS: usize = 500;

const HISTORY_MIN_DAYS: i64 = 1;
const HISTORY_MAX_DAYS: i64 = 60;
const HISTORY_DEFAULT_DAYS: i64 = 30;

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn db_error(e: DbErr) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: format!("Database error: {}", e),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> HandlerError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn not_found(message: impl Into<String>) -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Check the admin API key. A server configured without one refuses all
/// admin calls rather than accepting any.
fn require_admin(headers: &HeaderMap, expected: &str) -> Result<(), HandlerError> {
    let provided = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if expected.is_empty() || provided != Some(expected) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid or missing API key".to_string(),
            }),
        ));
    }

    Ok(())
}

/// POST /card-prices/bulk-load
///
/// One batch lookup per source type. Ids with no canonical row are simply
/// absent from the response; the client synthesizes placeholders.
pub async fn bulk_load(
    State(state): State<AppState>,
    Json(request): Json<BulkLoadRequest>,
) -> Result<Json<BulkLoadResponse>, HandlerError> {
    if request.variant_ids.len() > MAX_BULK_IDS {
        return Err(bad_request(format!(
            "Too many variant ids: {} (max {})",
            request.variant_ids.len(),
            MAX_BULK_IDS
        )));
    }

    if request.variant_ids.is_empty() {
        return Ok(Json(BulkLoadResponse {
            success: true,
            data: vec![],
        }));
    }

    let rows = CardPrices::find()
        .filter(card_prices::Column::SourceType.eq(request.source_type))
        .filter(card_prices::Column::VariantId.is_in(request.variant_ids))
        .all(&state.db)
        .await
        .map_err(db_error)?;

    Ok(Json(BulkLoadResponse {
        success: true,
        data: rows.into_iter().map(PriceRow::from).collect(),
    }))
}

/// POST /card-prices/create-source
///
/// Admin upsert of one row's configuration fields. Derived columns are left
/// alone on conflict, so re-registering a source never wipes fetched data.
pub async fn create_source(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateSourceRequest>,
) -> Result<Json<PriceRow>, HandlerError> {
    require_admin(&headers, &state.admin_api_key)?;

    if request.card_id.trim().is_empty() || request.variant_id.trim().is_empty() {
        return Err(bad_request("card_id and variant_id are required"));
    }
    if request.source_link.trim().is_empty() {
        return Err(bad_request("source_link is required"));
    }

    let active = card_prices::ActiveModel {
        card_id: Set(request.card_id.clone()),
        variant_id: Set(request.variant_id.clone()),
        source_type: Set(request.source_type),
        source_link: Set(request.source_link),
        source_product_id: Set(request.source_product_id),
        ..Default::default()
    };

    CardPrices::insert(active)
        .on_conflict(
            OnConflict::columns([
                card_prices::Column::CardId,
                card_prices::Column::VariantId,
                card_prices::Column::SourceType,
            ])
            .update_columns([
                card_prices::Column::SourceLink,
                card_prices::Column::SourceProductId,
            ])
            .to_owned(),
        )
        .exec(&state.db)
        .await
        .map_err(db_error)?;

    let row = CardPrices::find_by_id((
        request.card_id.clone(),
        request.variant_id.clone(),
        request.source_type,
    ))
    .one(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Upserted row not found".to_string(),
            }),
        )
    })?;

    Ok(Json(PriceRow::from(row)))
}

/// DELETE /card-prices
///
/// Removes one row by full identity. History rows are kept.
pub async fn delete_price(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(identity): Query<PriceIdentityQuery>,
) -> Result<StatusCode, HandlerError> {
    require_admin(&headers, &state.admin_api_key)?;

    let result = CardPrices::delete_by_id((
        identity.card_id.clone(),
        identity.variant_id.clone(),
        identity.source_type,
    ))
    .exec(&state.db)
    .await
    .map_err(db_error)?;

    if result.rows_affected == 0 {
        return Err(not_found(format!(
            "No price row for card {} variant {} source {}",
            identity.card_id, identity.variant_id, identity.source_type
        )));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// GET /card-prices
pub async fn get_price(
    State(state): State<AppState>,
    Query(identity): Query<PriceIdentityQuery>,
) -> Result<Json<PriceRow>, HandlerError> {
    let row = CardPrices::find_by_id((
        identity.card_id.clone(),
        identity.variant_id.clone(),
        identity.source_type,
    ))
    .one(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| {
        not_found(format!(
            "No price row for card {} variant {} source {}",
            identity.card_id, identity.variant_id, identity.source_type
        ))
    })?;

    Ok(Json(PriceRow::from(row)))
}

/// GET /card-prices/history
///
/// Requires at least one of card_id/variant_id; days defaults to 30 and
/// must stay within 1..=60. Rows come back oldest first.
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, HandlerError> {
    if query.card_id.is_none() && query.variant_id.is_none() {
        return Err(bad_request(
            "At least one of card_id or variant_id is required",
        ));
    }

    let days = query.days.unwrap_or(HISTORY_DEFAULT_DAYS);
    if !(HISTORY_MIN_DAYS..=HISTORY_MAX_DAYS).contains(&days) {
        return Err(bad_request(format!(
            "days must be between {} and {}",
            HISTORY_MIN_DAYS, HISTORY_MAX_DAYS
        )));
    }

    let cutoff = Utc::now() - Duration::days(days);

    let mut finder = CardPriceHistory::find()
        .filter(card_price_history::Column::CreatedAt.gte(cutoff.fixed_offset()));

    if let Some(card_id) = &query.card_id {
        finder = finder.filter(card_price_history::Column::CardId.eq(card_id));
    }
    if let Some(variant_id) = &query.variant_id {
        finder = finder.filter(card_price_history::Column::VariantId.eq(variant_id));
    }
    if let Some(source_type) = query.source_type {
        finder = finder.filter(card_price_history::Column::SourceType.eq(source_type));
    }

    let rows = finder
        .order_by(card_price_history::Column::CreatedAt, Order::Asc)
        .all(&state.db)
        .await
        .map_err(db_error)?;

    if rows.is_empty() {
        return Err(not_found("No price history for the given filters"));
    }

    Ok(Json(HistoryResponse {
        success: true,
        data: rows.into_iter().map(HistoryRow::from).collect(),
    }))
}

/// POST /card-prices/fetch-price
///
/// Immediate single-item refresh. Only the scrape source is supported; any
/// other source answers with a success-shaped `success: false` payload so
/// clients treat it as a final answer rather than an error to retry.
pub async fn fetch_price(
    State(state): State<AppState>,
    Json(request): Json<FetchPriceRequest>,
) -> Result<Json<FetchPriceResponse>, HandlerError> {
    match state
        .ingestion
        .refresh_single(&request.card_id, &request.variant_id, request.source_type)
        .await
    {
        Ok(row) => Ok(Json(FetchPriceResponse {
            success: true,
            message: None,
            data: Some(PriceRow::from(row)),
        })),
        Err(IngestionError::UnsupportedSource(source_type)) => Ok(Json(FetchPriceResponse {
            success: false,
            message: Some(format!(
                "Price fetch is not supported for source {}",
                source_type
            )),
            data: None,
        })),
        Err(e @ IngestionError::NotFound { .. }) => Err(not_found(e.to_string())),
        Err(e @ IngestionError::Scrape(_)) => Err((
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}
