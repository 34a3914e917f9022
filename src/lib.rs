// src/lib.rs

use jobs::SharedSyncStatus;
use sea_orm::DatabaseConnection;
use services::ingestion::IngestionService;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub ingestion: IngestionService,
    pub admin_api_key: String,
    pub sync_status: SharedSyncStatus,
}

pub mod entities {
    pub mod prelude;

    pub mod card_price_history;
    pub mod card_prices;
}

pub mod services {
    pub mod blob_store;
    pub mod ingestion;
    pub mod pairing;
}

pub mod client;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod sources;
