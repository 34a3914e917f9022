use chrono::Utc;
use tokio::time::{interval, Duration};

use super::{SharedSyncStatus, SyncStatus};
use crate::services::ingestion::IngestionService;

/// Daily bulk-feed ingestion. The first tick fires immediately on startup;
/// the dated normalized artifact makes a same-day restart cheap.
pub async fn start_price_feed_sync_job(ingestion: IngestionService, status: SharedSyncStatus) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(86400));

        loop {
            interval.tick().await;
            tracing::info!("Starting scheduled price feed ingestion");

            let attempt_at = Utc::now();
            match ingestion.run_bulk_feed(false).await {
                Ok(report) => {
                    tracing::info!(
                        "Price feed ingestion complete for {}: {} normalized products, {} paired ({}artifact reuse)",
                        report.run_date,
                        report.normalized_products,
                        report.pairing.paired,
                        if report.reused_artifact { "" } else { "no " }
                    );
                    *status.write() = Some(SyncStatus {
                        last_attempt_at: attempt_at,
                        last_success_at: Some(Utc::now()),
                        last_error: None,
                    });
                }
                Err(e) => {
                    tracing::error!("Price feed ingestion failed: {}", e);
                    let last_success_at =
                        status.read().as_ref().and_then(|s| s.last_success_at);
                    *status.write() = Some(SyncStatus {
                        last_attempt_at: attempt_at,
                        last_success_at,
                        last_error: Some(e.to_string()),
                    });
                }
            }
        }
    });
}
