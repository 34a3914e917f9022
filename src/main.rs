use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use std::env;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardvault_backend::handlers::prices;
use cardvault_backend::jobs::{self, SyncStatus};
use cardvault_backend::services::blob_store::ArtifactStore;
use cardvault_backend::services::ingestion::IngestionService;
use cardvault_backend::sources::cardmarket::CardmarketScraper;
use cardvault_backend::sources::tcgplayer::{FeedConfig, TcgplayerFeed};
use cardvault_backend::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cardvault_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let feed_config = FeedConfig {
        base_url: env::var("FEED_BASE_URL")
            .unwrap_or_else(|_| "https://tcgcsv.com/tcgplayer".to_string()),
        category_id: env::var("FEED_CATEGORY_ID")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(3),
    };
    let artifact_root = env::var("ARTIFACT_DIR").unwrap_or_else(|_| "./artifacts".to_string());
    let admin_api_key = env::var("ADMIN_API_KEY").unwrap_or_default();
    if admin_api_key.is_empty() {
        tracing::warn!("ADMIN_API_KEY not set; admin endpoints are disabled");
    }

    let ingestion = IngestionService::new(
        db.clone(),
        TcgplayerFeed::new(feed_config),
        CardmarketScraper::new(),
        ArtifactStore::new(artifact_root),
    );

    let sync_status = jobs::new_shared_sync_status();

    // Start the scheduled bulk-feed ingestion
    jobs::price_feed_sync::start_price_feed_sync_job(ingestion.clone(), sync_status.clone()).await;

    let state = AppState {
        db,
        ingestion,
        admin_api_key,
        sync_status,
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route(
            "/card-prices",
            get(prices::get_price).delete(prices::delete_price),
        )
        .route("/card-prices/bulk-load", post(prices::bulk_load))
        .route("/card-prices/create-source", post(prices::create_source))
        .route("/card-prices/history", get(prices::get_history))
        .route("/card-prices/fetch-price", post(prices::fetch_price))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listen address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    last_feed_sync: Option<SyncStatus>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let last_feed_sync = state.sync_status.read().clone();
    Json(HealthResponse {
        status: "ok",
        last_feed_sync,
    })
}
