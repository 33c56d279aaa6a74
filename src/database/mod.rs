// src/database/mod.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::job::JobStatus;
use crate::types::{CertificateRecord, DnsRecord, MergeOutcome};

pub mod memory;
pub mod postgres;

pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;

/// Database backend trait for certificate, DNS and job storage
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Every crt.sh identifier already linked to a stored certificate
    async fn known_min_ids(&self) -> Result<HashSet<i64>>;

    /// Insert `record` linked to `identifier`, or link the stored record
    /// with the same fingerprint. Must be atomic per fingerprint.
    ///
    /// An existing `crt_sh_min_id` is never replaced and the crt.sh source
    /// tag is added at most once.
    async fn merge_certificate(
        &self,
        record: &CertificateRecord,
        identifier: i64,
    ) -> Result<MergeOutcome>;

    /// Flag certificates whose `not_after` is before `now`; returns how many
    /// records changed. Never clears the flag.
    async fn mark_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Append a DNS record (no deduplication)
    async fn insert_dns_record(&self, record: &DnsRecord) -> Result<()>;

    /// Record the lifecycle state of a job for external monitoring
    async fn set_job_status(&self, job_name: &str, status: JobStatus) -> Result<()>;

    /// Health check
    async fn ping(&self) -> Result<()>;
}
