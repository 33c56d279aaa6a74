// src/dns/linker.rs
use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::resolver::DnsResolver;
use crate::database::DatabaseBackend;
use crate::error::{HarvestError, Result};
use crate::stats::StatsCollector;
use crate::types::DnsRecord;
use crate::zones::ZoneRegistry;

/// Resolves certificate hostnames and stores the records that fall under a
/// tracked zone
pub struct HostnameLinker<'a> {
    resolver: &'a dyn DnsResolver,
    zones: &'a dyn ZoneRegistry,
    store: &'a dyn DatabaseBackend,
}

impl<'a> HostnameLinker<'a> {
    pub fn new(
        resolver: &'a dyn DnsResolver,
        zones: &'a dyn ZoneRegistry,
        store: &'a dyn DatabaseBackend,
    ) -> Self {
        Self {
            resolver,
            zones,
            store,
        }
    }

    /// Link every hostname; returns the number of DNS records inserted.
    /// Lookup failures skip the hostname, store failures abort.
    pub async fn link_all<'h, I>(&self, hostnames: I, stats: &StatsCollector) -> Result<u64>
    where
        I: IntoIterator<Item = &'h String>,
    {
        let mut inserted = 0;

        for hostname in hostnames {
            let records = match self.resolver.resolve(hostname).await {
                Ok(records) => records,
                Err(e) => {
                    warn!("DNS lookup for {} failed: {:#}", hostname, e);
                    continue;
                }
            };

            let created = Utc::now();

            for record in records {
                let Some(zone) = self.zones.zone_for(&record.fqdn) else {
                    debug!(
                        "{}: {} is outside every tracked zone, dropping",
                        hostname, record.fqdn
                    );
                    continue;
                };

                let dns_record = DnsRecord::discovered(record, zone, created);

                self.store
                    .insert_dns_record(&dns_record)
                    .await
                    .map_err(|e| {
                        error!("Could not store DNS record for {}: {:#}", dns_record.fqdn, e);
                        HarvestError::Persistence(e)
                    })?;

                stats.increment_dns_records();
                inserted += 1;
            }
        }

        info!("Added {} DNS records", inserted);

        Ok(inserted)
    }
}
