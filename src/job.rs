// src/job.rs
//! Job lifecycle markers used by external monitoring

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::database::DatabaseBackend;

/// Lifecycle state of a harvesting job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Complete,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "RUNNING",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Error => "ERROR",
        }
    }
}

/// One process-wide run of a named job.
///
/// Owned by the caller: `start` before the pipeline runs, then exactly one
/// of `complete` or `fail` afterwards.
pub struct JobRun {
    job_name: String,
    store: Arc<dyn DatabaseBackend>,
}

impl JobRun {
    pub fn new(job_name: impl Into<String>, store: Arc<dyn DatabaseBackend>) -> Self {
        Self {
            job_name: job_name.into(),
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.job_name
    }

    pub async fn start(&self) -> Result<()> {
        info!("Job {} started", self.job_name);
        self.store
            .set_job_status(&self.job_name, JobStatus::Running)
            .await
    }

    pub async fn complete(self) -> Result<()> {
        info!("Job {} complete", self.job_name);
        self.store
            .set_job_status(&self.job_name, JobStatus::Complete)
            .await
    }

    /// Mark the job failed. Recording the failure is best effort since the
    /// caller is already on an error path.
    pub async fn fail(self) {
        warn!("Job {} failed", self.job_name);
        if let Err(e) = self
            .store
            .set_job_status(&self.job_name, JobStatus::Error)
            .await
        {
            warn!("Could not record failure of job {}: {:#}", self.job_name, e);
        }
    }
}
