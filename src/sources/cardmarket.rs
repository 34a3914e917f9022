use lazy_static::lazy_static;
use moka::future::Cache;
use regex::Regex;
use reqwest::Client;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::{CardmarketPriceData, MarketListing};

/// Listing rows extracted per page. Seller details are ignored on purpose.
const MAX_LISTINGS: usize = 3;

lazy_static! {
    // Monetary values like "1.234,56 €" or "0,79 €" (comma decimal separator)
    static ref MONEY_REGEX: Regex = Regex::new(r"(\d+(?:\.\d{3})*(?:,\d+)?)").unwrap();
    static ref COUNT_REGEX: Regex = Regex::new(r"(\d+)").unwrap();
}

#[derive(Debug)]
pub enum ScrapeError {
    Fetch(String),
    Status(u16),
    Parse(String),
}

impl std::fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrapeError::Fetch(msg) => write!(f, "Fetch error: {}", msg),
            ScrapeError::Status(code) => write!(f, "Unexpected HTTP status: {}", code),
            ScrapeError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for ScrapeError {}

/// Scraping client for Cardmarket product pages.
///
/// Pages are cached for a short TTL so a burst of single-item refreshes for
/// the same product does not hammer the marketplace.
#[derive(Clone)]
pub struct CardmarketScraper {
    client: Client,
    page_cache: Arc<Cache<String, String>>,
}

impl CardmarketScraper {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .user_agent("cardvault/0.1")
            .build()
            .expect("Failed to build HTTP client");

        let page_cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(600))
            .build();

        Self {
            client,
            page_cache: Arc::new(page_cache),
        }
    }

    /// Fetch and parse one product page. Any failure is terminal for this
    /// single item; callers processing several items handle each outcome
    /// independently.
    pub async fn fetch_product_page(&self, url: &str) -> Result<CardmarketPriceData, ScrapeError> {
        if let Some(html) = self.page_cache.get(url).await {
            tracing::debug!("Page cache hit for {}", url);
            return Ok(parse_product_page(&html));
        }

        tracing::info!("Scraping product page {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScrapeError::Status(response.status().as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ScrapeError::Fetch(e.to_string()))?;

        if html.trim().is_empty() {
            return Err(ScrapeError::Parse("empty document".to_string()));
        }

        self.page_cache.insert(url.to_string(), html.clone()).await;

        Ok(parse_product_page(&html))
    }
}

impl Default for CardmarketScraper {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a rendered product page into the normalized shape. Absent or
/// malformed fields come out as zero rather than failing the whole page.
pub fn parse_product_page(html: &str) -> CardmarketPriceData {
    let document = Html::parse_document(html);

    let mut data = CardmarketPriceData {
        available_items: 0,
        from_price: Decimal::ZERO,
        price_trend: Decimal::ZERO,
        avg_1_day: Decimal::ZERO,
        avg_7_day: Decimal::ZERO,
        avg_30_day: Decimal::ZERO,
        listings: Vec::new(),
    };

    // The info box is a <dl> of label/value pairs
    if let (Ok(dt_selector), Ok(dd_selector)) = (Selector::parse("dl dt"), Selector::parse("dl dd"))
    {
        let labels: Vec<String> = document
            .select(&dt_selector)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect();
        let values: Vec<String> = document
            .select(&dd_selector)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect();

        for (label, value) in labels.iter().zip(values.iter()) {
            match label.as_str() {
                "Available items" => data.available_items = parse_count(value),
                "From" => data.from_price = parse_eu_decimal(value),
                "Price Trend" => data.price_trend = parse_eu_decimal(value),
                "1-day average price" => data.avg_1_day = parse_eu_decimal(value),
                "7-days average price" => data.avg_7_day = parse_eu_decimal(value),
                "30-days average price" => data.avg_30_day = parse_eu_decimal(value),
                _ => {}
            }
        }
    }

    // Individual offer rows: price + quantity only, first few rows
    if let Ok(row_selector) = Selector::parse("div.article-row") {
        let price_selector = Selector::parse(".price-container").ok();
        let amount_selector = Selector::parse(".item-count").ok();

        for row in document.select(&row_selector).take(MAX_LISTINGS) {
            let price = price_selector
                .as_ref()
                .and_then(|sel| row.select(sel).next())
                .map(|el| parse_eu_decimal(&el.text().collect::<String>()))
                .unwrap_or(Decimal::ZERO);
            let quantity = amount_selector
                .as_ref()
                .and_then(|sel| row.select(sel).next())
                .map(|el| parse_count(&el.text().collect::<String>()))
                .unwrap_or(0);

            data.listings.push(MarketListing { price, quantity });
        }
    }

    data
}

/// Parse a monetary string in the source locale ("." thousands separator,
/// "," decimal separator). Returns zero when nothing parsable is present.
pub fn parse_eu_decimal(text: &str) -> Decimal {
    let Some(captures) = MONEY_REGEX.captures(text) else {
        return Decimal::ZERO;
    };

    let normalized = captures[1].replace('.', "").replace(',', ".");
    Decimal::from_str(&normalized).unwrap_or(Decimal::ZERO)
}

fn parse_count(text: &str) -> u32 {
    COUNT_REGEX
        .captures(text)
        .and_then(|captures| captures[1].parse::<u32>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const PRODUCT_PAGE: &str = r#"
        <html><body>
        <dl class="labeled">
            <dt>Available items</dt><dd>247</dd>
            <dt>From</dt><dd>0,79 €</dd>
            <dt>Price Trend</dt><dd>1.234,56 €</dd>
            <dt>30-days average price</dt><dd>1,02 €</dd>
            <dt>7-days average price</dt><dd>1,10 €</dd>
            <dt>1-day average price</dt><dd>1,15 €</dd>
        </dl>
        <div class="table-body">
            <div class="article-row">
                <span class="seller">ignored</span>
                <span class="price-container">0,79 €</span>
                <span class="item-count">4</span>
            </div>
            <div class="article-row">
                <span class="price-container">0,85 €</span>
                <span class="item-count">1</span>
            </div>
            <div class="article-row">
                <span class="price-container">0,90 €</span>
                <span class="item-count">2</span>
            </div>
            <div class="article-row">
                <span class="price-container">99,99 €</span>
                <span class="item-count">7</span>
            </div>
        </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_eu_decimal() {
        assert_eq!(parse_eu_decimal("0,79 €"), dec!(0.79));
        assert_eq!(parse_eu_decimal("1.234,56 €"), dec!(1234.56));
        assert_eq!(parse_eu_decimal("1234,56"), dec!(1234.56));
        assert_eq!(parse_eu_decimal("12 €"), dec!(12));
        assert_eq!(parse_eu_decimal("garbage"), Decimal::ZERO);
        assert_eq!(parse_eu_decimal(""), Decimal::ZERO);
    }

    #[test]
    fn test_parse_product_page() {
        let data = parse_product_page(PRODUCT_PAGE);

        assert_eq!(data.available_items, 247);
        assert_eq!(data.from_price, dec!(0.79));
        assert_eq!(data.price_trend, dec!(1234.56));
        assert_eq!(data.avg_1_day, dec!(1.15));
        assert_eq!(data.avg_7_day, dec!(1.10));
        assert_eq!(data.avg_30_day, dec!(1.02));
    }

    #[test]
    fn test_parse_product_page_caps_listings() {
        let data = parse_product_page(PRODUCT_PAGE);

        assert_eq!(data.listings.len(), 3);
        assert_eq!(
            data.listings[0],
            MarketListing {
                price: dec!(0.79),
                quantity: 4
            }
        );
        assert_eq!(data.listings[2].price, dec!(0.90));
    }

    #[test]
    fn test_parse_product_page_missing_fields_default_to_zero() {
        let data = parse_product_page("<html><body><p>nothing here</p></body></html>");

        assert_eq!(data.available_items, 0);
        assert_eq!(data.from_price, Decimal::ZERO);
        assert_eq!(data.avg_1_day, Decimal::ZERO);
        assert!(data.listings.is_empty());
    }
}
