// src/types.rs
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;

/// Tag recorded in `sources` for certificates seen through crt.sh
pub const CRT_SH_SOURCE: &str = "crt_sh";

/// Source tag attached to DNS records discovered from certificate names
pub const DNS_RECORD_SOURCE: &str = "ssl";

/// Status given to freshly inserted DNS records
pub const DNS_STATUS_UNKNOWN: &str = "unknown";

/// A certificate as persisted in the store, keyed by its SHA-256 fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    /// Lower-case hex SHA-256 of the DER encoding
    pub fingerprint_sha256: String,

    /// crt.sh identifier this certificate was first linked to
    pub crt_sh_min_id: Option<i64>,

    pub serial_number: String,
    pub subject_common_names: Vec<String>,
    pub subject_dns_names: Vec<String>,
    pub issuer_common_name: Option<String>,
    pub issuer_organization: Option<String>,

    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,

    /// One-way flag, only ever set to true by the expiry sweep
    pub is_expired: bool,

    /// Discovery channels that reported this certificate
    pub sources: BTreeSet<String>,
}

impl CertificateRecord {
    /// Whether the certificate's validity window ended before `now`
    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        self.not_after < now
    }
}

impl fmt::Display for CertificateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SHA256: {}", self.fingerprint_sha256)?;
        if let Some(id) = self.crt_sh_min_id {
            write!(f, " (crt.sh id: {})", id)?;
        }
        Ok(())
    }
}

/// Result of merging a fetched certificate into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No record with this fingerprint existed; a new one was created
    Inserted,
    /// The fingerprint was already stored; it was linked to crt.sh
    Linked,
}

/// One DNS answer observed for a certificate hostname
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedRecord {
    pub fqdn: String,
    pub record_type: String,
    pub value: String,
}

/// A DNS record attributed to a tracked zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub fqdn: String,
    pub zone: String,
    pub record_type: String,
    pub value: String,
    pub status: String,
    pub created: DateTime<Utc>,
    pub source: String,
}

impl DnsRecord {
    /// Build a freshly discovered record for `zone`
    pub fn discovered(record: ResolvedRecord, zone: &str, created: DateTime<Utc>) -> Self {
        Self {
            fqdn: record.fqdn,
            zone: zone.to_string(),
            record_type: record.record_type,
            value: record.value,
            status: DNS_STATUS_UNKNOWN.to_string(),
            created,
            source: DNS_RECORD_SOURCE.to_string(),
        }
    }
}
