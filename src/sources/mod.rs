pub mod cardmarket;
pub mod tcgplayer;

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// External price providers. Persisted as a string column, so the set of
/// accepted values is closed at compile time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[sea_orm(string_value = "cardmarket")]
    Cardmarket,
    #[sea_orm(string_value = "tcgplayer")]
    Tcgplayer,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Cardmarket => "cardmarket",
            SourceType::Tcgplayer => "tcgplayer",
        }
    }

    /// Parse a wire identifier. Unknown identifiers yield `None` so callers
    /// can drop them instead of failing a whole batch.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cardmarket" => Some(SourceType::Cardmarket),
            "tcgplayer" => Some(SourceType::Tcgplayer),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One visible listing row on a scraped product page (seller-agnostic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketListing {
    pub price: Decimal,
    pub quantity: u32,
}

/// Fields scraped from a Cardmarket product page. Absent or unparsable
/// values are zero, not null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardmarketPriceData {
    pub available_items: u32,
    pub from_price: Decimal,
    pub price_trend: Decimal,
    pub avg_1_day: Decimal,
    pub avg_7_day: Decimal,
    pub avg_30_day: Decimal,
    /// First listings shown on the page, at most three.
    pub listings: Vec<MarketListing>,
}

/// One product row from the TCGplayer bulk price feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcgplayerPriceData {
    pub low: Option<Decimal>,
    pub mid: Option<Decimal>,
    pub high: Option<Decimal>,
    pub market: Option<Decimal>,
    pub direct_low: Option<Decimal>,
    pub sub_type: String,
}

/// Normalized per-product payload, one concrete shape per source. The full
/// payload is persisted as the `data` column so history keeps every field,
/// while `display_price` picks the single indexed scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum PricePayload {
    Cardmarket(CardmarketPriceData),
    Tcgplayer(TcgplayerPriceData),
}

impl PricePayload {
    pub fn source_type(&self) -> SourceType {
        match self {
            PricePayload::Cardmarket(_) => SourceType::Cardmarket,
            PricePayload::Tcgplayer(_) => SourceType::Tcgplayer,
        }
    }

    /// Canonical display price, per-source fallback chain. First present
    /// value wins; a payload with nothing usable prices at zero.
    pub fn display_price(&self) -> Decimal {
        match self {
            PricePayload::Cardmarket(data) => data
                .listings
                .first()
                .map(|listing| listing.price)
                .unwrap_or(data.avg_1_day),
            PricePayload::Tcgplayer(data) => data
                .market
                .or(data.mid)
                .or(data.low)
                .or(data.high)
                .or(data.direct_low)
                .unwrap_or(Decimal::ZERO),
        }
    }
}

/// Variant ids bucketed per source type. A fixed struct rather than a
/// string-keyed map: every source has a field, unknown sources cannot exist.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SourceGroups {
    pub cardmarket: Vec<String>,
    pub tcgplayer: Vec<String>,
}

impl SourceGroups {
    pub fn push(&mut self, source_type: SourceType, variant_id: String) {
        match source_type {
            SourceType::Cardmarket => self.cardmarket.push(variant_id),
            SourceType::Tcgplayer => self.tcgplayer.push(variant_id),
        }
    }

    /// Non-empty groups in a stable order.
    pub fn non_empty(&self) -> Vec<(SourceType, &[String])> {
        let mut groups = Vec::new();
        if !self.cardmarket.is_empty() {
            groups.push((SourceType::Cardmarket, self.cardmarket.as_slice()));
        }
        if !self.tcgplayer.is_empty() {
            groups.push((SourceType::Tcgplayer, self.tcgplayer.as_slice()));
        }
        groups
    }

    pub fn is_empty(&self) -> bool {
        self.cardmarket.is_empty() && self.tcgplayer.is_empty()
    }
}
