// src/database/memory.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::DatabaseBackend;
use crate::job::JobStatus;
use crate::types::{CRT_SH_SOURCE, CertificateRecord, DnsRecord, MergeOutcome};

#[derive(Default)]
struct MemoryState {
    certificates: HashMap<String, CertificateRecord>,
    dns_records: Vec<DnsRecord>,
    jobs: HashMap<String, JobStatus>,
}

/// In-process backend used for dry runs and tests
/// Holds nothing across process restarts
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a certificate discovered through some other channel
    pub async fn insert_certificate(&self, record: CertificateRecord) {
        let mut state = self.state.lock().await;
        state
            .certificates
            .insert(record.fingerprint_sha256.clone(), record);
    }

    pub async fn certificate(&self, fingerprint: &str) -> Option<CertificateRecord> {
        let state = self.state.lock().await;
        state.certificates.get(fingerprint).cloned()
    }

    /// All stored certificates, ordered by fingerprint
    pub async fn certificates(&self) -> Vec<CertificateRecord> {
        let state = self.state.lock().await;
        let mut certificates: Vec<_> = state.certificates.values().cloned().collect();
        certificates.sort_by(|a, b| a.fingerprint_sha256.cmp(&b.fingerprint_sha256));
        certificates
    }

    pub async fn dns_records(&self) -> Vec<DnsRecord> {
        let state = self.state.lock().await;
        state.dns_records.clone()
    }

    pub async fn job_status(&self, job_name: &str) -> Option<JobStatus> {
        let state = self.state.lock().await;
        state.jobs.get(job_name).copied()
    }
}

#[async_trait]
impl DatabaseBackend for MemoryBackend {
    async fn known_min_ids(&self) -> Result<HashSet<i64>> {
        let state = self.state.lock().await;
        Ok(state
            .certificates
            .values()
            .filter_map(|record| record.crt_sh_min_id)
            .collect())
    }

    async fn merge_certificate(
        &self,
        record: &CertificateRecord,
        identifier: i64,
    ) -> Result<MergeOutcome> {
        let mut state = self.state.lock().await;

        match state.certificates.entry(record.fingerprint_sha256.clone()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.crt_sh_min_id.get_or_insert(identifier);
                existing.sources.insert(CRT_SH_SOURCE.to_string());
                Ok(MergeOutcome::Linked)
            }
            Entry::Vacant(entry) => {
                let mut new_record = record.clone();
                new_record.crt_sh_min_id = Some(identifier);
                new_record.sources.insert(CRT_SH_SOURCE.to_string());
                entry.insert(new_record);
                Ok(MergeOutcome::Inserted)
            }
        }
    }

    async fn mark_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut flagged = 0;

        for record in state.certificates.values_mut() {
            if !record.is_expired && record.expired_at(now) {
                record.is_expired = true;
                flagged += 1;
            }
        }

        Ok(flagged)
    }

    async fn insert_dns_record(&self, record: &DnsRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state.dns_records.push(record.clone());
        debug!("Saved DNS record in memory: {}", record.fqdn);
        Ok(())
    }

    async fn set_job_status(&self, job_name: &str, status: JobStatus) -> Result<()> {
        let mut state = self.state.lock().await;
        state.jobs.insert(job_name.to_string(), status);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
