// src/error.rs
use thiserror::Error;

/// A single failed GET against the aggregator or resolver
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection refused, DNS failure, TLS failure or timeout
    #[error("connection error: {0}")]
    Connection(#[source] reqwest::Error),

    /// Any status other than 200 OK
    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),

    /// The body could not be read or was not valid UTF-8
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
}

/// Errors raised by one harvesting run
#[derive(Error, Debug)]
pub enum HarvestError {
    /// One attempt against the aggregator failed; the caller may retry
    #[error("request failed: {0}")]
    Transient(#[source] FetchError),

    /// Both attempts against the aggregator failed
    #[error("gave up on {url} after two failed attempts")]
    ServiceExhausted { url: String },

    /// The aggregator answered with a body that does not match its schema
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Certificate bytes could not be turned into a record
    #[error("could not parse certificate {identifier}: {reason}")]
    Parse { identifier: i64, reason: String },

    /// The store rejected a read or write
    #[error("store operation failed: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, HarvestError>;
