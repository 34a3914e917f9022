pub mod price_feed_sync;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Outcome of the most recent ingestion attempt, shared between the job
/// loop and the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub last_attempt_at: DateTime<Utc>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub type SharedSyncStatus = Arc<RwLock<Option<SyncStatus>>>;

pub fn new_shared_sync_status() -> SharedSyncStatus {
    Arc::new(RwLock::new(None))
}
