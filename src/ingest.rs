// src/ingest.rs
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::cert_parser::CertificateParser;
use crate::crtsh::{ContentKind, CrtShClient};
use crate::database::DatabaseBackend;
use crate::error::{HarvestError, Result};
use crate::progress::ProgressIndicator;
use crate::stats::StatsCollector;
use crate::types::{CRT_SH_SOURCE, MergeOutcome};

/// Fetches, parses and merges new crt.sh certificates into the store
pub struct CertificateIngestor<'a> {
    client: &'a CrtShClient,
    parser: &'a dyn CertificateParser,
    store: &'a dyn DatabaseBackend,
    save_dir: Option<PathBuf>,
}

impl<'a> CertificateIngestor<'a> {
    pub fn new(
        client: &'a CrtShClient,
        parser: &'a dyn CertificateParser,
        store: &'a dyn DatabaseBackend,
        save_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            client,
            parser,
            store,
            save_dir,
        }
    }

    /// Ingest every identifier in order. Stops at the first identifier whose
    /// download fails twice or whose merge the store rejects; everything
    /// merged before that point stays.
    pub async fn ingest_all(
        &self,
        identifiers: &[i64],
        stats: &StatsCollector,
        progress: &ProgressIndicator,
    ) -> Result<()> {
        for &identifier in identifiers {
            progress.set_message(format!("crt.sh id {}", identifier));
            self.ingest(identifier, stats).await?;
            progress.inc();
        }

        progress.finish();
        Ok(())
    }

    /// Fetch, optionally save, parse and merge a single identifier.
    /// Returns `Ok(None)` when the certificate could not be parsed.
    pub async fn ingest(
        &self,
        identifier: i64,
        stats: &StatsCollector,
    ) -> Result<Option<MergeOutcome>> {
        let url = self.client.certificate_url(identifier);

        let bytes = match self.client.fetch_with_retry(&url, ContentKind::Binary).await {
            Ok(content) => content.into_bytes(),
            Err(e) => {
                error!(
                    "Failed twice downloading crt.sh id {}. Giving up for now: {}",
                    identifier, e
                );
                return Err(e);
            }
        };
        stats.increment_fetched();

        if let Some(ref dir) = self.save_dir {
            if let Err(e) = Self::save_raw(dir, identifier, &bytes).await {
                warn!("Could not save crt.sh id {} to disk: {:#}", identifier, e);
            }
        }

        let record = match self.parser.parse(&bytes, CRT_SH_SOURCE) {
            Ok(record) => record,
            Err(e) => {
                let e = HarvestError::Parse {
                    identifier,
                    reason: format!("{:#}", e),
                };
                warn!("{}. Skipping for now", e);
                stats.increment_parse_failures();
                return Ok(None);
            }
        };

        let outcome = self
            .store
            .merge_certificate(&record, identifier)
            .await
            .map_err(|e| {
                error!("Could not store crt.sh id {}: {:#}", identifier, e);
                HarvestError::Persistence(e)
            })?;

        match outcome {
            MergeOutcome::Inserted => {
                stats.increment_inserted();
                info!(
                    "Added crt.sh id {} SHA256: {}",
                    identifier, record.fingerprint_sha256
                );
            }
            MergeOutcome::Linked => {
                stats.increment_linked();
                info!(
                    "Linked crt.sh id {} to existing SHA256: {}",
                    identifier, record.fingerprint_sha256
                );
            }
        }

        Ok(Some(outcome))
    }

    /// Write the downloaded bytes to `<dir>/<identifier>.crt`
    pub async fn save_raw(dir: &Path, identifier: i64, bytes: &[u8]) -> anyhow::Result<PathBuf> {
        let path = dir.join(format!("{}.crt", identifier));

        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;

        debug!("Saved crt.sh id {} to {:?}", identifier, path);

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryBackend;
    use crate::types::CertificateRecord;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Treats the body as `<fingerprint>` or fails on "garbage"
    struct StubParser;

    impl CertificateParser for StubParser {
        fn parse(&self, bytes: &[u8], source_tag: &str) -> anyhow::Result<CertificateRecord> {
            let body = String::from_utf8_lossy(bytes).to_string();
            if body == "garbage" {
                anyhow::bail!("not a certificate");
            }
            let not_after = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();
            Ok(CertificateRecord {
                fingerprint_sha256: body,
                crt_sh_min_id: None,
                serial_number: "01".to_string(),
                subject_common_names: vec![],
                subject_dns_names: vec![],
                issuer_common_name: None,
                issuer_organization: None,
                not_before: not_after,
                not_after,
                is_expired: false,
                sources: BTreeSet::from([source_tag.to_string()]),
            })
        }
    }

    async fn serve(server: &MockServer, id: i64, body: &str) {
        Mock::given(method("GET"))
            .and(query_param("d", id.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn client_for(server: &MockServer) -> CrtShClient {
        CrtShClient::new(&server.uri(), Duration::from_secs(5), Duration::ZERO).unwrap()
    }

    #[tokio::test]
    async fn test_same_certificate_under_two_identifiers() {
        let server = MockServer::start().await;
        serve(&server, 100, "abc").await;
        serve(&server, 101, "abc").await;

        let client = client_for(&server);
        let store = MemoryBackend::new();
        let stats = StatsCollector::new();
        let ingestor = CertificateIngestor::new(&client, &StubParser, &store, None);

        ingestor
            .ingest_all(&[100, 101], &stats, &ProgressIndicator::disabled())
            .await
            .unwrap();

        let certificates = store.certificates().await;
        assert_eq!(certificates.len(), 1);
        assert_eq!(certificates[0].crt_sh_min_id, Some(100));
        assert_eq!(
            certificates[0].sources,
            BTreeSet::from(["crt_sh".to_string()])
        );

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.certificates_inserted, 1);
        assert_eq!(snapshot.certificates_linked, 1);
    }

    #[tokio::test]
    async fn test_parse_failure_skips_identifier() {
        let server = MockServer::start().await;
        serve(&server, 1, "garbage").await;
        serve(&server, 2, "def").await;

        let client = client_for(&server);
        let store = MemoryBackend::new();
        let stats = StatsCollector::new();
        let ingestor = CertificateIngestor::new(&client, &StubParser, &store, None);

        ingestor
            .ingest_all(&[1, 2], &stats, &ProgressIndicator::disabled())
            .await
            .unwrap();

        assert_eq!(store.certificates().await.len(), 1);
        assert!(store.certificate("def").await.is_some());
        assert_eq!(stats.snapshot().parse_failures, 1);
    }

    #[tokio::test]
    async fn test_saves_raw_bytes_before_parsing() {
        let server = MockServer::start().await;
        serve(&server, 42, "garbage").await;

        let dir = TempDir::new().unwrap();
        let client = client_for(&server);
        let store = MemoryBackend::new();
        let ingestor = CertificateIngestor::new(
            &client,
            &StubParser,
            &store,
            Some(dir.path().to_path_buf()),
        );

        let outcome = ingestor.ingest(42, &StatsCollector::new()).await.unwrap();

        assert_eq!(outcome, None);
        let saved = std::fs::read(dir.path().join("42.crt")).unwrap();
        assert_eq!(saved, b"garbage");
    }

    #[tokio::test]
    async fn test_unwritable_save_dir_is_not_fatal() {
        let server = MockServer::start().await;
        serve(&server, 7, "abc").await;

        let client = client_for(&server);
        let store = MemoryBackend::new();
        let ingestor = CertificateIngestor::new(
            &client,
            &StubParser,
            &store,
            Some(PathBuf::from("/nonexistent/ct-harvest/certs")),
        );

        let outcome = ingestor.ingest(7, &StatsCollector::new()).await.unwrap();
        assert_eq!(outcome, Some(MergeOutcome::Inserted));
    }

    #[tokio::test]
    async fn test_double_download_failure_is_fatal() {
        let server = MockServer::start().await;
        serve(&server, 1, "abc").await;
        Mock::given(method("GET"))
            .and(query_param("d", "2"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("d", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ghi"))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let store = MemoryBackend::new();
        let ingestor = CertificateIngestor::new(&client, &StubParser, &store, None);

        let result = ingestor
            .ingest_all(&[1, 2, 3], &StatsCollector::new(), &ProgressIndicator::disabled())
            .await;

        assert!(matches!(result, Err(HarvestError::ServiceExhausted { .. })));
        assert!(store.certificate("abc").await.is_some());
        assert_eq!(store.certificates().await.len(), 1);
    }
}
