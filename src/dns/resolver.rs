// src/dns/resolver.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::types::ResolvedRecord;

/// Looks up the DNS records currently published for a hostname
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Empty when the name has no records
    async fn resolve(&self, hostname: &str) -> Result<Vec<ResolvedRecord>>;
}

/// Google Public DNS JSON response
#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    name: String,
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

const NOERROR: u32 = 0;
const NXDOMAIN: u32 = 3;

/// Lower-case mnemonic for a numeric RR type, None for types we do not store
fn record_type_name(code: u16) -> Option<&'static str> {
    match code {
        1 => Some("a"),
        2 => Some("ns"),
        5 => Some("cname"),
        6 => Some("soa"),
        12 => Some("ptr"),
        15 => Some("mx"),
        16 => Some("txt"),
        28 => Some("aaaa"),
        33 => Some("srv"),
        257 => Some("caa"),
        _ => None,
    }
}

/// Resolver backed by a DNS-over-HTTPS JSON endpoint (dns.google by default)
pub struct GoogleDnsResolver {
    endpoint: Url,
    record_types: Vec<String>,
    http_client: reqwest::Client,
}

impl GoogleDnsResolver {
    pub fn new(endpoint: &str, record_types: Vec<String>, timeout: Duration) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("Invalid resolver URL: {}", endpoint))?;

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            endpoint,
            record_types,
            http_client,
        })
    }

    async fn query(&self, hostname: &str, record_type: &str) -> Result<Vec<ResolvedRecord>> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("name", hostname)
            .append_pair("type", record_type);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .with_context(|| format!("DNS query for {} {} failed", hostname, record_type))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "DNS query for {} {} failed with status {}",
                hostname,
                record_type,
                response.status()
            );
        }

        let body: DohResponse = response
            .json()
            .await
            .context("Failed to parse DNS JSON")?;

        match body.status {
            NOERROR => {}
            NXDOMAIN => return Ok(Vec::new()),
            rcode => anyhow::bail!(
                "DNS query for {} {} returned rcode {}",
                hostname,
                record_type,
                rcode
            ),
        }

        Ok(body
            .answer
            .into_iter()
            .filter_map(|answer| {
                let record_type = record_type_name(answer.record_type)?;
                Some(ResolvedRecord {
                    fqdn: answer.name.trim_end_matches('.').to_lowercase(),
                    record_type: record_type.to_string(),
                    value: answer.data.trim_end_matches('.').to_string(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl DnsResolver for GoogleDnsResolver {
    async fn resolve(&self, hostname: &str) -> Result<Vec<ResolvedRecord>> {
        let mut records: Vec<ResolvedRecord> = Vec::new();
        let mut last_error = None;
        let mut answered = 0;

        for record_type in &self.record_types {
            let answers = match self.query(hostname, record_type).await {
                Ok(answers) => answers,
                Err(e) => {
                    warn!("{} {} lookup failed: {:#}", hostname, record_type, e);
                    last_error = Some(e);
                    continue;
                }
            };
            answered += 1;

            for record in answers {
                // A CNAME chain shows up again in the A and AAAA answers
                if !records.contains(&record) {
                    records.push(record);
                }
            }
        }

        // Only an error when no record type could be looked up
        if let (0, Some(e)) = (answered, last_error) {
            return Err(e);
        }

        debug!("{}: resolved {} records", hostname, records.len());

        Ok(records)
    }
}
