// src/cert_parser.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::*;

use crate::types::CertificateRecord;

/// Turns raw certificate bytes into a store record
pub trait CertificateParser: Send + Sync {
    /// Parse `bytes`, tagging the record with `source_tag`
    fn parse(&self, bytes: &[u8], source_tag: &str) -> Result<CertificateRecord>;
}

/// X.509 parser accepting the PEM crt.sh serves as well as plain DER
#[derive(Debug, Clone, Copy, Default)]
pub struct X509CertificateParser;

impl X509CertificateParser {
    pub fn new() -> Self {
        Self
    }

    /// Strip a PEM envelope if present, otherwise assume DER
    fn to_der(bytes: &[u8]) -> Result<Vec<u8>> {
        if bytes.trim_ascii_start().starts_with(b"-----BEGIN") {
            let (_, pem) = x509_parser::pem::parse_x509_pem(bytes)
                .map_err(|e| anyhow::anyhow!("Failed to decode PEM certificate: {:?}", e))?;
            if pem.label != "CERTIFICATE" {
                anyhow::bail!("Unexpected PEM block: {}", pem.label);
            }
            Ok(pem.contents)
        } else {
            Ok(bytes.to_vec())
        }
    }

    fn fingerprint(der_bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(der_bytes);
        hex::encode(hasher.finalize())
    }

    fn timestamp(time: ASN1Time) -> Result<DateTime<Utc>> {
        DateTime::from_timestamp(time.timestamp(), 0)
            .with_context(|| format!("Validity timestamp out of range: {}", time))
    }

    /// DNS names from the Subject Alternative Name extension
    fn extract_dns_names(cert: &X509Certificate) -> Vec<String> {
        let mut names = Vec::new();

        for ext in cert.extensions() {
            if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
                for general_name in &san.general_names {
                    if let GeneralName::DNSName(dns_name) = general_name {
                        names.push(dns_name.to_lowercase());
                    }
                }
            }
        }

        names
    }

    fn extract_common_names(name: &X509Name) -> Vec<String> {
        name.iter_common_name()
            .filter_map(|attr| attr.as_str().ok())
            .map(|cn| cn.to_string())
            .collect()
    }

    fn extract_organization(name: &X509Name) -> Option<String> {
        name.iter_organization()
            .filter_map(|attr| attr.as_str().ok())
            .map(|org| org.to_string())
            .next()
    }
}

impl CertificateParser for X509CertificateParser {
    fn parse(&self, bytes: &[u8], source_tag: &str) -> Result<CertificateRecord> {
        let der_bytes = Self::to_der(bytes)?;

        let fingerprint_sha256 = Self::fingerprint(&der_bytes);

        let (_, cert) = X509Certificate::from_der(&der_bytes)
            .map_err(|e| anyhow::anyhow!("Failed to parse X.509 certificate: {:?}", e))?;

        let not_before = Self::timestamp(cert.validity().not_before)?;
        let not_after = Self::timestamp(cert.validity().not_after)?;

        let serial_number = cert.raw_serial_as_string().replace(':', "").to_lowercase();

        Ok(CertificateRecord {
            fingerprint_sha256,
            crt_sh_min_id: None,
            serial_number,
            subject_common_names: Self::extract_common_names(cert.subject()),
            subject_dns_names: Self::extract_dns_names(&cert),
            issuer_common_name: Self::extract_common_names(cert.issuer()).into_iter().next(),
            issuer_organization: Self::extract_organization(cert.issuer()),
            not_before,
            not_after,
            is_expired: not_after < Utc::now(),
            sources: BTreeSet::from([source_tag.to_string()]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, date_time_ymd};

    fn self_signed(names: &[&str], not_after_year: i32) -> rcgen::Certificate {
        let key_pair = KeyPair::generate().unwrap();
        let mut params =
            CertificateParams::new(names.iter().map(|n| n.to_string()).collect::<Vec<_>>())
                .unwrap();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, names[0]);
        dn.push(DnType::OrganizationName, "Example Org");
        params.distinguished_name = dn;
        params.not_before = date_time_ymd(2020, 1, 1);
        params.not_after = date_time_ymd(not_after_year, 1, 1);
        params.self_signed(&key_pair).unwrap()
    }

    #[test]
    fn test_parse_pem() {
        let cert = self_signed(&["foo.example.com", "bar.example.com"], 2099);
        let record = X509CertificateParser::new()
            .parse(cert.pem().as_bytes(), "crt_sh")
            .unwrap();

        assert_eq!(record.fingerprint_sha256.len(), 64);
        assert_eq!(
            record.subject_dns_names,
            vec!["foo.example.com".to_string(), "bar.example.com".to_string()]
        );
        assert_eq!(record.subject_common_names, vec!["foo.example.com".to_string()]);
        assert_eq!(record.issuer_organization.as_deref(), Some("Example Org"));
        assert_eq!(record.not_before.to_rfc3339(), "2020-01-01T00:00:00+00:00");
        assert!(!record.is_expired);
        assert!(record.sources.contains("crt_sh"));
        assert_eq!(record.crt_sh_min_id, None);
    }

    #[test]
    fn test_pem_and_der_share_fingerprint() {
        let cert = self_signed(&["foo.example.com"], 2099);
        let parser = X509CertificateParser::new();

        let from_pem = parser.parse(cert.pem().as_bytes(), "crt_sh").unwrap();
        let from_der = parser.parse(cert.der(), "crt_sh").unwrap();

        assert_eq!(from_pem.fingerprint_sha256, from_der.fingerprint_sha256);
        assert_eq!(
            from_der.fingerprint_sha256,
            hex::encode(Sha256::digest(&cert.der()[..]))
        );
    }

    #[test]
    fn test_expired_certificate_flagged() {
        let cert = self_signed(&["old.example.com"], 2021);
        let record = X509CertificateParser::new()
            .parse(cert.der(), "crt_sh")
            .unwrap();
        assert!(record.is_expired);
    }

    #[test]
    fn test_parse_garbage() {
        let parser = X509CertificateParser::new();
        assert!(parser.parse(b"<html>Certificate not found</html>", "crt_sh").is_err());
        assert!(parser.parse(b"", "crt_sh").is_err());
    }

    #[test]
    fn test_parse_truncated_pem() {
        let parser = X509CertificateParser::new();
        let pem = b"-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";
        assert!(parser.parse(pem, "crt_sh").is_err());
    }
}
