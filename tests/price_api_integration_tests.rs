mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use cardvault_backend::handlers::prices;
use cardvault_backend::jobs;
use cardvault_backend::services::blob_store::ArtifactStore;
use cardvault_backend::services::ingestion::IngestionService;
use cardvault_backend::sources::cardmarket::CardmarketScraper;
use cardvault_backend::sources::tcgplayer::{FeedConfig, TcgplayerFeed};
use cardvault_backend::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::common::setup_test_db;

const TEST_ADMIN_KEY: &str = "test-admin-key";

async fn build_test_router() -> Router {
    let db = setup_test_db().await.expect("Failed to connect to test DB");

    // Feed endpoint is unroutable: these tests never run a bulk ingestion
    let ingestion = IngestionService::new(
        db.clone(),
        TcgplayerFeed::new(FeedConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            category_id: 3,
        }),
        CardmarketScraper::new(),
        ArtifactStore::new(tempfile::tempdir().expect("temp dir").keep()),
    );

    let state = AppState {
        db,
        ingestion,
        admin_api_key: TEST_ADMIN_KEY.to_string(),
        sync_status: jobs::new_shared_sync_status(),
    };

    Router::new()
        .route(
            "/card-prices",
            get(prices::get_price).delete(prices::delete_price),
        )
        .route("/card-prices/bulk-load", post(prices::bulk_load))
        .route("/card-prices/create-source", post(prices::create_source))
        .route("/card-prices/history", get(prices::get_history))
        .route("/card-prices/fetch-price", post(prices::fetch_price))
        .with_state(state)
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    with_admin_key: bool,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if with_admin_key {
        builder = builder.header("x-api-key", TEST_ADMIN_KEY);
    }

    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, value)
}

fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

#[tokio::test]
async fn test_create_get_delete_roundtrip() {
    let app = build_test_router().await;
    let card_id = unique_id("card");
    let variant_id = unique_id("variant");

    let (status, created) = send_json(
        &app,
        "POST",
        "/card-prices/create-source",
        Some(json!({
            "card_id": card_id,
            "variant_id": variant_id,
            "source_type": "cardmarket",
            "source_link": "https://example.com/product/1",
            "source_product_id": "1001"
        })),
        true,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["card_id"], card_id.as_str());
    // Never fetched: all derived fields are null
    assert!(created["price"].is_null());
    assert!(created["updated_at"].is_null());
    assert!(created["data"].is_null());

    let identity_uri = format!(
        "/card-prices?card_id={}&variant_id={}&source_type=cardmarket",
        card_id, variant_id
    );

    let (status, fetched) = send_json(&app, "GET", &identity_uri, None, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["source_link"], "https://example.com/product/1");

    let (status, _) = send_json(&app, "DELETE", &identity_uri, None, true).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(&app, "GET", &identity_uri, None, false).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, "DELETE", &identity_uri, None, true).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_source_requires_api_key() {
    let app = build_test_router().await;

    let (status, _) = send_json(
        &app,
        "POST",
        "/card-prices/create-source",
        Some(json!({
            "card_id": unique_id("card"),
            "variant_id": unique_id("variant"),
            "source_type": "cardmarket",
            "source_link": "https://example.com/product/1"
        })),
        false,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_source_rejects_blank_identity() {
    let app = build_test_router().await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/card-prices/create-source",
        Some(json!({
            "card_id": " ",
            "variant_id": unique_id("variant"),
            "source_type": "cardmarket",
            "source_link": "https://example.com/product/1"
        })),
        true,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("card_id"));
}

#[tokio::test]
async fn test_bulk_load_returns_only_existing_rows() {
    let app = build_test_router().await;
    let card_id = unique_id("card");
    let existing = unique_id("variant");
    let missing = unique_id("variant");

    send_json(
        &app,
        "POST",
        "/card-prices/create-source",
        Some(json!({
            "card_id": card_id,
            "variant_id": existing,
            "source_type": "tcgplayer",
            "source_link": "https://example.com/product/2",
            "source_product_id": "2002"
        })),
        true,
    )
    .await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/card-prices/bulk-load",
        Some(json!({
            "source_type": "tcgplayer",
            "variant_ids": [existing, missing]
        })),
        false,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // The missing id is simply absent, not an error and not a placeholder
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["variant_id"], existing.as_str());
}

#[tokio::test]
async fn test_bulk_load_rejects_oversized_requests() {
    let app = build_test_router().await;
    let ids: Vec<String> = (0..501).map(|i| format!("v{}", i)).collect();

    let (status, _) = send_json(
        &app,
        "POST",
        "/card-prices/bulk-load",
        Some(json!({ "source_type": "tcgplayer", "variant_ids": ids })),
        false,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_requires_card_or_variant_filter() {
    let app = build_test_router().await;

    let (status, body) = send_json(
        &app,
        "GET",
        "/card-prices/history?source_type=cardmarket",
        None,
        false,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("card_id"));
}

#[tokio::test]
async fn test_history_rejects_out_of_range_days() {
    let app = build_test_router().await;

    for days in ["0", "61"] {
        let (status, _) = send_json(
            &app,
            "GET",
            &format!("/card-prices/history?card_id=card-1&days={}", days),
            None,
            false,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "days={}", days);
    }
}

#[tokio::test]
async fn test_history_with_no_rows_is_not_found() {
    let app = build_test_router().await;

    let (status, _) = send_json(
        &app,
        "GET",
        &format!("/card-prices/history?card_id={}", unique_id("card")),
        None,
        false,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_fetch_price_unsupported_source_is_success_shaped() {
    let app = build_test_router().await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/card-prices/fetch-price",
        Some(json!({
            "card_id": unique_id("card"),
            "variant_id": unique_id("variant"),
            "source_type": "tcgplayer"
        })),
        false,
    )
    .await;

    // Deliberately not an HTTP error
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("not supported"));
}
