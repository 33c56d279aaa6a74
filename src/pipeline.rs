// src/pipeline.rs
//! One harvesting run: zone queries, DNS linking, ingestion and the expiry sweep

use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cert_parser::CertificateParser;
use crate::crtsh::{CrtShClient, ZoneQueryPlanner};
use crate::database::DatabaseBackend;
use crate::dedupe::KnownIdentifiers;
use crate::dns::{DnsResolver, HostnameLinker};
use crate::error::{HarvestError, Result};
use crate::expiry;
use crate::ingest::CertificateIngestor;
use crate::progress::ProgressIndicator;
use crate::stats::StatsCollector;
use crate::zones::ZoneRegistry;

/// How a run ended, when it did not end with a store error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every stage ran
    Completed,
    /// A zone query failed twice; nothing was written
    AggregatorUnreachable,
    /// A certificate download failed twice; earlier merges are kept
    FetchExhausted,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed | RunOutcome::AggregatorUnreachable => 0,
            RunOutcome::FetchExhausted => 1,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.exit_code() != 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub fetch_dns_records: bool,
    /// Raw certificates are written here when set
    pub save_dir: Option<PathBuf>,
    pub zone_pacing: Duration,
    pub show_progress: bool,
}

pub struct Pipeline<'a> {
    client: &'a CrtShClient,
    parser: &'a dyn CertificateParser,
    resolver: &'a dyn DnsResolver,
    zones: &'a dyn ZoneRegistry,
    store: &'a dyn DatabaseBackend,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        client: &'a CrtShClient,
        parser: &'a dyn CertificateParser,
        resolver: &'a dyn DnsResolver,
        zones: &'a dyn ZoneRegistry,
        store: &'a dyn DatabaseBackend,
        options: PipelineOptions,
    ) -> Self {
        Self {
            client,
            parser,
            resolver,
            zones,
            store,
            options,
        }
    }

    /// Run every stage once. Store failures come back as `Err`; aggregator
    /// failures are reported through the outcome.
    pub async fn run(&self, stats: &StatsCollector) -> Result<RunOutcome> {
        let tracked = self.zones.tracked_zones();
        let planner = ZoneQueryPlanner::new(self.client, self.options.zone_pacing);
        let harvest = match planner.harvest(tracked, stats).await {
            Ok(harvest) => harvest,
            Err(HarvestError::Persistence(e)) => return Err(HarvestError::Persistence(e)),
            Err(e) => {
                warn!("crt.sh is unreachable, ending the run: {}", e);
                return Ok(RunOutcome::AggregatorUnreachable);
            }
        };

        if self.options.fetch_dns_records {
            HostnameLinker::new(self.resolver, self.zones, self.store)
                .link_all(&harvest.hostnames, stats)
                .await?;
        }

        let known = KnownIdentifiers::snapshot(self.store)
            .await
            .map_err(|e| {
                error!("Could not load known crt.sh ids: {:#}", e);
                HarvestError::Persistence(e)
            })?;
        let (fresh, already_known) = known.partition(&harvest.identifiers);
        stats.add_identifiers_known(already_known.len() as u64);

        info!(
            "{} new crt.sh ids to download, {} already stored",
            fresh.len(),
            already_known.len()
        );

        let ingestor = CertificateIngestor::new(
            self.client,
            self.parser,
            self.store,
            self.options.save_dir.clone(),
        );
        let progress = ProgressIndicator::new(self.options.show_progress, fresh.len() as u64);

        match ingestor.ingest_all(&fresh, stats, &progress).await {
            Ok(()) => {}
            Err(HarvestError::Persistence(e)) => return Err(HarvestError::Persistence(e)),
            Err(e) => {
                error!("Stopping the run: {}", e);
                return Ok(RunOutcome::FetchExhausted);
            }
        }

        expiry::mark_expired(self.store, Utc::now(), stats).await?;

        info!("Run statistics: {}", stats.format_stats());

        Ok(RunOutcome::Completed)
    }
}
