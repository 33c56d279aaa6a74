// src/crtsh/types.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One row of crt.sh's `output=json` search response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CtLogEntry {
    pub min_cert_id: i64,
    /// One or more names, newline separated
    pub name_value: String,
}

impl CtLogEntry {
    /// Non-wildcard hostnames carried by this entry, lower-cased
    pub fn hostnames(&self) -> impl Iterator<Item = String> + '_ {
        self.name_value
            .lines()
            .map(str::trim)
            .filter(|name| !name.is_empty() && !name.contains('*'))
            .map(str::to_lowercase)
    }
}

/// Identifiers and hostnames accumulated over every zone queried in a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Harvest {
    pub identifiers: BTreeSet<i64>,
    pub hostnames: BTreeSet<String>,
}

impl Harvest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one search response into the accumulated sets
    pub fn absorb(&mut self, entries: &[CtLogEntry]) {
        for entry in entries {
            self.identifiers.insert(entry.min_cert_id);
            for name in entry.hostnames() {
                self.hostnames.insert(name);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty() && self.hostnames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_search_response() {
        let json = r#"[
            {"issuer_ca_id": 16418, "issuer_name": "C=US, O=Let's Encrypt",
             "name_value": "foo.example.com", "min_cert_id": 100,
             "min_entry_timestamp": "2018-01-01T00:00:00", "not_before": "2018-01-01T00:00:00"},
            {"name_value": "*.example.com", "min_cert_id": 100}
        ]"#;

        let entries: Vec<CtLogEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].min_cert_id, 100);
        assert_eq!(entries[0].name_value, "foo.example.com");
    }

    #[test]
    fn test_deserialize_rejects_missing_id() {
        let json = r#"[{"name_value": "foo.example.com"}]"#;
        let result: Result<Vec<CtLogEntry>, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_wildcards_are_dropped() {
        let mut harvest = Harvest::new();
        harvest.absorb(&[
            CtLogEntry {
                min_cert_id: 100,
                name_value: "foo.example.com".to_string(),
            },
            CtLogEntry {
                min_cert_id: 100,
                name_value: "*.example.com".to_string(),
            },
        ]);

        assert_eq!(harvest.identifiers, BTreeSet::from([100]));
        assert_eq!(
            harvest.hostnames,
            BTreeSet::from(["foo.example.com".to_string()])
        );
    }

    #[test]
    fn test_multi_line_name_value() {
        let entry = CtLogEntry {
            min_cert_id: 5,
            name_value: "a.example.com\n*.b.example.com\nb.example.com\n".to_string(),
        };

        let names: Vec<String> = entry.hostnames().collect();
        assert_eq!(names, vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn test_absorb_deduplicates_across_calls() {
        let mut harvest = Harvest::new();
        let entries = vec![CtLogEntry {
            min_cert_id: 1,
            name_value: "www.example.com".to_string(),
        }];

        harvest.absorb(&entries);
        harvest.absorb(&entries);

        assert_eq!(harvest.identifiers.len(), 1);
        assert_eq!(harvest.hostnames.len(), 1);
        assert!(!harvest.is_empty());
    }

    #[test]
    fn test_hostnames_differing_in_case_collapse() {
        let mut harvest = Harvest::new();
        harvest.absorb(&[
            CtLogEntry {
                min_cert_id: 1,
                name_value: "Foo.Example.com".to_string(),
            },
            CtLogEntry {
                min_cert_id: 2,
                name_value: "foo.example.com\nWWW.example.com".to_string(),
            },
        ]);

        assert_eq!(
            harvest.hostnames,
            BTreeSet::from(["foo.example.com".to_string(), "www.example.com".to_string()])
        );
    }
}
