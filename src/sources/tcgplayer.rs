use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::{PricePayload, TcgplayerPriceData};

#[derive(Debug)]
pub enum FeedError {
    Fetch(String),
    Status(u16),
    Decode(String),
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Fetch(msg) => write!(f, "Feed fetch error: {}", msg),
            FeedError::Status(code) => write!(f, "Feed returned HTTP {}", code),
            FeedError::Decode(msg) => write!(f, "Feed decode error: {}", msg),
        }
    }
}

impl std::error::Error for FeedError {}

/// Feed endpoint configuration, read from the environment in `main`.
#[derive(Clone)]
pub struct FeedConfig {
    pub base_url: String,
    /// Product category to ingest (one game line).
    pub category_id: u32,
}

#[derive(Debug, Deserialize)]
struct FeedEnvelope<T> {
    results: Vec<T>,
}

/// One product group (roughly: one printed set) in the bulk feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedGroup {
    pub group_id: i64,
    pub name: String,
    #[serde(default)]
    pub abbreviation: Option<String>,
}

/// One price row in a group's price file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPriceRow {
    pub product_id: i64,
    pub low_price: Option<Decimal>,
    pub mid_price: Option<Decimal>,
    pub high_price: Option<Decimal>,
    pub market_price: Option<Decimal>,
    pub direct_low_price: Option<Decimal>,
    pub sub_type_name: String,
}

/// Client for the TCGplayer bulk price feed (group index + one price file
/// per group). Returns raw response bodies alongside the decoded rows so the
/// ingestion pipeline can archive them before normalization.
#[derive(Clone)]
pub struct TcgplayerFeed {
    client: Client,
    config: FeedConfig,
}

impl TcgplayerFeed {
    pub fn new(config: FeedConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .user_agent("cardvault/0.1")
            .build()
            .expect("Failed to build HTTP client");

        Self { client, config }
    }

    pub async fn fetch_groups(&self) -> Result<(String, Vec<FeedGroup>), FeedError> {
        let url = format!("{}/{}/groups", self.config.base_url, self.config.category_id);
        let raw = self.fetch_raw(&url).await?;

        let envelope: FeedEnvelope<FeedGroup> =
            serde_json::from_str(&raw).map_err(|e| FeedError::Decode(e.to_string()))?;

        Ok((raw, envelope.results))
    }

    pub async fn fetch_group_prices(
        &self,
        group_id: i64,
    ) -> Result<(String, Vec<FeedPriceRow>), FeedError> {
        let url = format!(
            "{}/{}/{}/prices",
            self.config.base_url, self.config.category_id, group_id
        );
        let raw = self.fetch_raw(&url).await?;

        let envelope: FeedEnvelope<FeedPriceRow> =
            serde_json::from_str(&raw).map_err(|e| FeedError::Decode(e.to_string()))?;

        Ok((raw, envelope.results))
    }

    async fn fetch_raw(&self, url: &str) -> Result<String, FeedError> {
        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| FeedError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FeedError::Fetch(e.to_string()))
    }
}

/// Normalize one group's rows into the shared payload map shape, keyed by
/// external product id.
pub fn normalize_rows(rows: Vec<FeedPriceRow>) -> HashMap<String, PricePayload> {
    rows.into_iter()
        .map(|row| {
            (
                row.product_id.to_string(),
                PricePayload::Tcgplayer(TcgplayerPriceData {
                    low: row.low_price,
                    mid: row.mid_price,
                    high: row.high_price,
                    market: row.market_price,
                    direct_low: row.direct_low_price,
                    sub_type: row.sub_type_name,
                }),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decode_group_index() {
        let raw = r#"{
            "results": [
                {"groupId": 604, "name": "Scarlet & Violet", "abbreviation": "SVI"},
                {"groupId": 605, "name": "Paldea Evolved"}
            ]
        }"#;

        let envelope: FeedEnvelope<FeedGroup> = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.results.len(), 2);
        assert_eq!(envelope.results[0].group_id, 604);
        assert_eq!(envelope.results[1].abbreviation, None);
    }

    #[test]
    fn test_decode_price_rows_with_nulls() {
        let raw = r#"{
            "results": [
                {
                    "productId": 88211,
                    "lowPrice": 1.00,
                    "midPrice": 2.50,
                    "highPrice": null,
                    "marketPrice": null,
                    "directLowPrice": null,
                    "subTypeName": "Holofoil"
                }
            ]
        }"#;

        let envelope: FeedEnvelope<FeedPriceRow> = serde_json::from_str(raw).unwrap();
        let row = &envelope.results[0];
        assert_eq!(row.product_id, 88211);
        assert_eq!(row.mid_price, Some(dec!(2.50)));
        assert_eq!(row.market_price, None);
    }

    #[test]
    fn test_normalize_rows_keys_by_product_id() {
        let rows = vec![FeedPriceRow {
            product_id: 88211,
            low_price: Some(dec!(1.00)),
            mid_price: Some(dec!(2.50)),
            high_price: None,
            market_price: None,
            direct_low_price: None,
            sub_type_name: "Holofoil".to_string(),
        }];

        let map = normalize_rows(rows);
        let payload = map.get("88211").expect("row keyed by product id");
        // market is null, mid is the first present fallback
        assert_eq!(payload.display_price(), dec!(2.50));
    }
}
