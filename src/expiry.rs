// src/expiry.rs
use chrono::{DateTime, Utc};
use tracing::info;

use crate::database::DatabaseBackend;
use crate::error::Result;
use crate::stats::StatsCollector;

/// Flag every stored certificate whose validity ended before `now`.
/// Idempotent and one-way: the flag is never cleared.
pub async fn mark_expired(
    store: &dyn DatabaseBackend,
    now: DateTime<Utc>,
    stats: &StatsCollector,
) -> Result<u64> {
    let flagged = store.mark_expired(now).await?;
    stats.add_expired(flagged);

    info!("Marked {} certificates as expired", flagged);

    Ok(flagged)
}
