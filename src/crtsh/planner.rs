// src/crtsh/planner.rs
use std::time::Duration;
use tracing::{debug, error, info};

use super::client::CrtShClient;
use super::types::{CtLogEntry, Harvest};
use crate::error::Result;
use crate::stats::StatsCollector;

/// Queries crt.sh once per tracked zone, strictly one after another
pub struct ZoneQueryPlanner<'a> {
    client: &'a CrtShClient,
    pacing: Duration,
}

impl<'a> ZoneQueryPlanner<'a> {
    pub fn new(client: &'a CrtShClient, pacing: Duration) -> Self {
        Self { client, pacing }
    }

    /// Query every zone and accumulate identifiers and hostnames across all
    /// of them. Stops at the first zone whose query fails twice.
    pub async fn harvest(&self, zones: &[String], stats: &StatsCollector) -> Result<Harvest> {
        let mut harvest = Harvest::new();

        for zone in zones {
            // The pacing delay precedes every zone, including the first
            tokio::time::sleep(self.pacing).await;

            let url = self.client.zone_query_url(zone);
            let entries: Vec<CtLogEntry> = match self.client.fetch_json_with_retry(&url).await {
                Ok(entries) => entries,
                Err(e) => {
                    error!("Query for zone {} failed: {}", zone, e);
                    return Err(e);
                }
            };

            stats.increment_zones_queried();

            let before = harvest.identifiers.len();
            harvest.absorb(&entries);

            debug!(
                "{}: {} entries, {} new identifiers",
                zone,
                entries.len(),
                harvest.identifiers.len() - before
            );
        }

        stats.add_identifiers_seen(harvest.identifiers.len() as u64);

        info!(
            "Queried {} zones: {} identifiers, {} hostnames",
            zones.len(),
            harvest.identifiers.len(),
            harvest.hostnames.len()
        );

        Ok(harvest)
    }
}
