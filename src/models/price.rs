//! Request/response models for the /card-prices endpoints.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::{card_price_history, card_prices};
use crate::sources::SourceType;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Wire shape of one canonical price row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub card_id: String,
    pub variant_id: String,
    pub source_type: SourceType,
    pub source_link: String,
    #[serde(default)]
    pub source_product_id: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl From<card_prices::Model> for PriceRow {
    fn from(model: card_prices::Model) -> Self {
        Self {
            card_id: model.card_id,
            variant_id: model.variant_id,
            source_type: model.source_type,
            source_link: model.source_link,
            source_product_id: model.source_product_id,
            updated_at: model.updated_at.map(|ts| ts.with_timezone(&Utc)),
            data: model.data,
            price: model.price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkLoadRequest {
    pub source_type: SourceType,
    pub variant_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkLoadResponse {
    pub success: bool,
    pub data: Vec<PriceRow>,
}

/// Upsert of the admin-managed configuration fields of one price row.
#[derive(Debug, Deserialize)]
pub struct CreateSourceRequest {
    pub card_id: String,
    pub variant_id: String,
    pub source_type: SourceType,
    pub source_link: String,
    #[serde(default)]
    pub source_product_id: Option<String>,
}

/// Full identity of one price row, used by the single-row GET and DELETE.
#[derive(Debug, Deserialize)]
pub struct PriceIdentityQuery {
    pub card_id: String,
    pub variant_id: String,
    pub source_type: SourceType,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub card_id: Option<String>,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub source_type: Option<SourceType>,
    #[serde(default)]
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub card_id: String,
    pub variant_id: String,
    pub source_type: SourceType,
    pub data: serde_json::Value,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<card_price_history::Model> for HistoryRow {
    fn from(model: card_price_history::Model) -> Self {
        Self {
            card_id: model.card_id,
            variant_id: model.variant_id,
            source_type: model.source_type,
            data: model.data,
            price: model.price,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub data: Vec<HistoryRow>,
}

#[derive(Debug, Deserialize)]
pub struct FetchPriceRequest {
    pub card_id: String,
    pub variant_id: String,
    pub source_type: SourceType,
}

/// Success-shaped response for the single-item refresh. An unsupported
/// source answers `success: false` with a message, not an HTTP error, so
/// clients neither retry nor alarm.
#[derive(Debug, Serialize)]
pub struct FetchPriceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PriceRow>,
}
