//! Background job: purge stale registrations and old read notifications.
//!
//! Runs hourly. Unverified users older than 24 hours are removed together
//! with their credentials; read notifications older than the retention
//! window are deleted. Unread notifications are never purged.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;

use crate::store::{NotificationStore, Store, UserStore};

const UNVERIFIED_TTL_HOURS: i64 = 24;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub users_purged: u64,
    pub notifications_purged: u64,
}

/// Spawn the background cleanup task. Call this once at startup.
pub fn spawn(store: Arc<dyn Store>, retention_days: i64) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(3600)); // every hour
        loop {
            interval.tick().await;
            if let Err(e) = run_once(store.as_ref(), retention_days).await {
                tracing::error!("cleanup job failed: {}", e);
            }
        }
    });
}

pub async fn run_once(store: &dyn Store, retention_days: i64) -> anyhow::Result<CleanupReport> {
    let now = Utc::now();

    let users_purged = store
        .purge_unverified_before(now - chrono::Duration::hours(UNVERIFIED_TTL_HOURS))
        .await?;
    if users_purged > 0 {
        tracing::info!(rows = users_purged, "purged expired unverified registrations");
    }

    let notifications_purged = store
        .purge_read_before(now - chrono::Duration::days(retention_days))
        .await?;
    if notifications_purged > 0 {
        tracing::info!(rows = notifications_purged, "purged old read notifications");
    }

    Ok(CleanupReport {
        users_purged,
        notifications_purged,
    })
}
