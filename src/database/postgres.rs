// src/database/postgres.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashSet;
use tracing::{debug, info};

use super::DatabaseBackend;
use crate::job::JobStatus;
use crate::types::{CRT_SH_SOURCE, CertificateRecord, DnsRecord, MergeOutcome};

/// PostgreSQL database backend
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Create new PostgreSQL backend
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to PostgreSQL database");

        let cleaned_url = Self::clean_connection_string(database_url);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(&cleaned_url)
            .await
            .context("Failed to connect to PostgreSQL database")?;

        info!("Connected to PostgreSQL successfully");

        Ok(Self { pool })
    }

    /// Remove connection string parameters sqlx does not recognize
    fn clean_connection_string(url_str: &str) -> String {
        use url::Url;

        let Ok(mut url) = Url::parse(url_str) else {
            return url_str.to_string();
        };

        let unsupported_params = ["channel_binding"];

        let cleaned_pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !unsupported_params.contains(&key.as_ref()))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        if cleaned_pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(cleaned_pairs);
        }

        url.to_string()
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS certificates (
                fingerprint_sha256 TEXT PRIMARY KEY,
                crt_sh_min_id BIGINT,
                serial_number TEXT NOT NULL,
                subject_common_names TEXT[] NOT NULL DEFAULT '{}',
                subject_dns_names TEXT[] NOT NULL DEFAULT '{}',
                issuer_common_name TEXT,
                issuer_organization TEXT,
                not_before TIMESTAMPTZ NOT NULL,
                not_after TIMESTAMPTZ NOT NULL,
                is_expired BOOLEAN NOT NULL DEFAULT FALSE,
                sources TEXT[] NOT NULL DEFAULT '{}',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create certificates table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_certificates_crt_sh_min_id
            ON certificates(crt_sh_min_id)
            WHERE crt_sh_min_id IS NOT NULL
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create index on crt_sh_min_id")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_certificates_not_after
            ON certificates(not_after)
            WHERE is_expired = FALSE
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create index on not_after")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dns_records (
                id BIGSERIAL PRIMARY KEY,
                fqdn TEXT NOT NULL,
                zone TEXT NOT NULL,
                record_type TEXT NOT NULL,
                value TEXT NOT NULL,
                status TEXT NOT NULL,
                source TEXT NOT NULL,
                created TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create dns_records table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_dns_records_zone
            ON dns_records(zone)
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create index on zone")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                job_name TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                updated TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create jobs table")?;

        info!("Database migrations completed successfully");

        Ok(())
    }
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
    async fn known_min_ids(&self) -> Result<HashSet<i64>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT crt_sh_min_id FROM certificates
            WHERE crt_sh_min_id IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch known crt.sh identifiers")?;

        let ids: HashSet<i64> = rows
            .into_iter()
            .map(|row| row.get::<i64, _>("crt_sh_min_id"))
            .collect();

        debug!("Loaded {} known crt.sh identifiers", ids.len());

        Ok(ids)
    }

    async fn merge_certificate(
        &self,
        record: &CertificateRecord,
        identifier: i64,
    ) -> Result<MergeOutcome> {
        let mut sources: Vec<String> = record.sources.iter().cloned().collect();
        if !record.sources.contains(CRT_SH_SOURCE) {
            sources.push(CRT_SH_SOURCE.to_string());
        }

        // xmax is zero only for a row created by this statement
        let row = sqlx::query(
            r#"
            INSERT INTO certificates (
                fingerprint_sha256, crt_sh_min_id, serial_number,
                subject_common_names, subject_dns_names,
                issuer_common_name, issuer_organization,
                not_before, not_after, is_expired, sources
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (fingerprint_sha256) DO UPDATE SET
                crt_sh_min_id = COALESCE(certificates.crt_sh_min_id, EXCLUDED.crt_sh_min_id),
                sources = CASE
                    WHEN $12::TEXT = ANY(certificates.sources) THEN certificates.sources
                    ELSE array_append(certificates.sources, $12::TEXT)
                END
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&record.fingerprint_sha256)
        .bind(identifier)
        .bind(&record.serial_number)
        .bind(&record.subject_common_names)
        .bind(&record.subject_dns_names)
        .bind(&record.issuer_common_name)
        .bind(&record.issuer_organization)
        .bind(record.not_before)
        .bind(record.not_after)
        .bind(record.is_expired)
        .bind(&sources)
        .bind(CRT_SH_SOURCE)
        .fetch_one(&self.pool)
        .await
        .with_context(|| {
            format!(
                "Failed to merge certificate {} (crt.sh id {})",
                record.fingerprint_sha256, identifier
            )
        })?;

        if row.get::<bool, _>("inserted") {
            Ok(MergeOutcome::Inserted)
        } else {
            Ok(MergeOutcome::Linked)
        }
    }

    async fn mark_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE certificates SET is_expired = TRUE
            WHERE not_after < $1 AND is_expired = FALSE
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to mark expired certificates")?;

        Ok(result.rows_affected())
    }

    async fn insert_dns_record(&self, record: &DnsRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dns_records (
                fqdn, zone, record_type, value, status, source, created
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.fqdn)
        .bind(&record.zone)
        .bind(&record.record_type)
        .bind(&record.value)
        .bind(&record.status)
        .bind(&record.source)
        .bind(record.created)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert DNS record for {}", record.fqdn))?;

        debug!(
            "Saved DNS record: {} {} {}",
            record.fqdn, record.record_type, record.value
        );

        Ok(())
    }

    async fn set_job_status(&self, job_name: &str, status: JobStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (job_name, status, updated)
            VALUES ($1, $2, NOW())
            ON CONFLICT (job_name)
            DO UPDATE SET status = $2, updated = NOW()
            "#,
        )
        .bind(job_name)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to record status of job {}", job_name))?;

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;

        Ok(())
    }
}
