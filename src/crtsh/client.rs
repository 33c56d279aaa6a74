// src/crtsh/client.rs
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, HarvestError};

/// What the caller wants back from a GET
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Binary,
}

/// Body of a successful (HTTP 200) response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Binary(Vec<u8>),
}

impl Content {
    pub fn into_text(self) -> String {
        match self {
            Content::Text(text) => text,
            Content::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Content::Text(text) => text.into_bytes(),
            Content::Binary(bytes) => bytes,
        }
    }
}

/// HTTP client for the crt.sh search and download endpoints
pub struct CrtShClient {
    base_url: Url,
    http_client: reqwest::Client,
    retry_delay: Duration,
}

impl CrtShClient {
    /// Create a new crt.sh client
    pub fn new(base_url: &str, timeout: Duration, retry_delay: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid aggregator URL: {}", base_url))?;

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(concat!("ct-harvest/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url,
            http_client,
            retry_delay,
        })
    }

    /// Search URL for every name under `zone`
    /// Endpoint: GET {base_url}/?q=%25.{zone}&output=json
    pub fn zone_query_url(&self, zone: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path("/");
        url.query_pairs_mut()
            .clear()
            .append_pair("q", &format!("%.{}", zone))
            .append_pair("output", "json");
        url
    }

    /// Download URL for a single certificate
    /// Endpoint: GET {base_url}/?d={identifier}
    pub fn certificate_url(&self, identifier: i64) -> Url {
        let mut url = self.base_url.clone();
        url.set_path("/");
        url.query_pairs_mut()
            .clear()
            .append_pair("d", &identifier.to_string());
        url
    }

    /// Perform exactly one GET; every failure mode is returned, never retried
    pub async fn fetch(&self, url: &Url, kind: ContentKind) -> Result<Content, FetchError> {
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::Connection)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                warn!("Rate limited by aggregator: {}", url);
            }
            return Err(FetchError::Status(status));
        }

        match kind {
            ContentKind::Text => response
                .text()
                .await
                .map(Content::Text)
                .map_err(FetchError::Body),
            ContentKind::Binary => response
                .bytes()
                .await
                .map(|bytes| Content::Binary(bytes.to_vec()))
                .map_err(FetchError::Body),
        }
    }

    /// Fetch with the two-attempt contract: one retry after a fixed delay,
    /// then give up
    pub async fn fetch_with_retry(
        &self,
        url: &Url,
        kind: ContentKind,
    ) -> Result<Content, HarvestError> {
        let first = match self.fetch(url, kind).await {
            Ok(content) => return Ok(content),
            Err(e) => e,
        };

        warn!(
            "Could not reach aggregator ({}): {}. Retrying in {:?}",
            url, first, self.retry_delay
        );
        tokio::time::sleep(self.retry_delay).await;

        self.fetch(url, kind).await.map_err(|second| {
            warn!("Second attempt against {} failed: {}", url, second);
            HarvestError::ServiceExhausted {
                url: url.to_string(),
            }
        })
    }

    /// Same two-attempt contract, where a body that does not decode as `T`
    /// also counts as a failed attempt
    pub async fn fetch_json_with_retry<T>(&self, url: &Url) -> Result<T, HarvestError>
    where
        T: serde::de::DeserializeOwned,
    {
        match self.fetch_json_once(url).await {
            Ok(value) => return Ok(value),
            Err(e) => warn!(
                "Query against {} failed: {}. Retrying in {:?}",
                url, e, self.retry_delay
            ),
        }

        tokio::time::sleep(self.retry_delay).await;

        self.fetch_json_once(url).await.map_err(|e| {
            warn!("Second query against {} failed: {}", url, e);
            match e {
                HarvestError::Decode { .. } => e,
                _ => HarvestError::ServiceExhausted {
                    url: url.to_string(),
                },
            }
        })
    }

    /// One attempt: a failed GET is `Transient`, a bad body is `Decode`
    async fn fetch_json_once<T>(&self, url: &Url) -> Result<T, HarvestError>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self
            .fetch(url, ContentKind::Text)
            .await
            .map_err(HarvestError::Transient)?
            .into_text();

        serde_json::from_str(&body).map_err(|source| HarvestError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CrtShClient {
        CrtShClient::new(&server.uri(), Duration::from_secs(5), Duration::ZERO).unwrap()
    }

    #[test]
    fn test_zone_query_url_encodes_wildcard() {
        let client = CrtShClient::new("https://crt.sh", Duration::from_secs(5), Duration::ZERO)
            .unwrap();
        let url = client.zone_query_url("example.com");
        assert_eq!(
            url.as_str(),
            "https://crt.sh/?q=%25.example.com&output=json"
        );
    }

    #[test]
    fn test_certificate_url() {
        let client = CrtShClient::new("https://crt.sh", Duration::from_secs(5), Duration::ZERO)
            .unwrap();
        assert_eq!(client.certificate_url(12345).as_str(), "https://crt.sh/?d=12345");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(CrtShClient::new("not a url", Duration::from_secs(5), Duration::ZERO).is_err());
    }

    #[tokio::test]
    async fn test_fetch_non_200_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503).set_body_string("[]"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client
            .fetch(&client.certificate_url(1), ContentKind::Binary)
            .await;
        assert!(matches!(result, Err(FetchError::Status(s)) if s.as_u16() == 503));
    }

    #[tokio::test]
    async fn test_fetch_binary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("d", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x30, 0x82, 0x00]))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let content = client
            .fetch(&client.certificate_url(7), ContentKind::Binary)
            .await
            .unwrap();
        assert_eq!(content, Content::Binary(vec![0x30, 0x82, 0x00]));
    }

    #[tokio::test]
    async fn test_retry_recovers_after_one_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("d", "9"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("d", "9"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let content = client
            .fetch_with_retry(&client.certificate_url(9), ContentKind::Text)
            .await
            .unwrap();
        assert_eq!(content, Content::Text("ok".to_string()));
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_two_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client
            .fetch_with_retry(&client.certificate_url(9), ContentKind::Binary)
            .await;
        assert!(matches!(result, Err(HarvestError::ServiceExhausted { .. })));
    }

    #[tokio::test]
    async fn test_malformed_json_is_retried_then_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result: Result<Vec<serde_json::Value>, _> = client
            .fetch_json_with_retry(&client.zone_query_url("example.com"))
            .await;
        assert!(matches!(result, Err(HarvestError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_single_failed_query_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result: Result<Vec<serde_json::Value>, _> = client
            .fetch_json_once(&client.zone_query_url("example.com"))
            .await;

        match result {
            Err(HarvestError::Transient(FetchError::Status(status))) => {
                assert_eq!(status.as_u16(), 503)
            }
            other => panic!("expected a transient 503, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_query_exhausted_only_after_second_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result: Result<Vec<serde_json::Value>, _> = client
            .fetch_json_with_retry(&client.zone_query_url("example.com"))
            .await;
        assert!(matches!(result, Err(HarvestError::ServiceExhausted { .. })));
    }
}
