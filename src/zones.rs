// src/zones.rs
//! Tracked zone registry and hostname-to-zone attribution

use anyhow::Context;
use std::fs;
use std::path::Path;

/// Source of the zones a run harvests
pub trait ZoneRegistry: Send + Sync {
    /// Tracked zones in precedence order
    fn tracked_zones(&self) -> &[String];

    /// The first tracked zone `name` belongs to (exact or subdomain match)
    fn zone_for(&self, name: &str) -> Option<&str> {
        let name = name.trim_end_matches('.').to_lowercase();

        self.tracked_zones()
            .iter()
            .find(|zone| {
                name == **zone
                    || (name.len() > zone.len()
                        && name.ends_with(zone.as_str())
                        && name.as_bytes()[name.len() - zone.len() - 1] == b'.')
            })
            .map(String::as_str)
    }
}

/// Ordered, de-duplicated zone list loaded from config and/or a zone file
#[derive(Debug, Clone, Default)]
pub struct TrackedZones {
    zones: Vec<String>,
}

impl TrackedZones {
    /// Create a registry from a list of zones, keeping first-seen order
    pub fn from_list<I, S>(zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::default();
        registry.extend(zones);
        registry
    }

    /// Create a registry from a file containing zones (one per line)
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let mut registry = Self::default();
        registry.extend_from_file(path)?;
        Ok(registry)
    }

    /// Append the zones listed in `path`; blank lines and `#` comments are skipped
    pub fn extend_from_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read zone file {:?}", path))?;

        self.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#')),
        );

        Ok(())
    }

    fn extend<I, S>(&mut self, zones: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for zone in zones {
            let zone = Self::normalize(zone.as_ref());
            if !zone.is_empty() && !self.zones.contains(&zone) {
                self.zones.push(zone);
            }
        }
    }

    fn normalize(zone: &str) -> String {
        zone.trim()
            .trim_start_matches("*.")
            .trim_matches('.')
            .to_lowercase()
    }

    /// Get the number of tracked zones
    pub fn count(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl ZoneRegistry for TrackedZones {
    fn tracked_zones(&self) -> &[String] {
        &self.zones
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_list() {
        let zones = TrackedZones::from_list(["example.com", "test.org"]);

        assert_eq!(zones.count(), 2);
        assert_eq!(zones.zone_for("example.com"), Some("example.com"));
        assert_eq!(zones.zone_for("www.example.com"), Some("example.com"));
        assert_eq!(zones.zone_for("test.org"), Some("test.org"));
        assert_eq!(zones.zone_for("other.com"), None);
    }

    #[test]
    fn test_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "example.com").unwrap();
        writeln!(temp_file, "# comment line").unwrap();
        writeln!(temp_file).unwrap();
        writeln!(temp_file, "  Test.ORG  ").unwrap();
        temp_file.flush().unwrap();

        let zones = TrackedZones::from_file(temp_file.path()).unwrap();

        assert_eq!(zones.tracked_zones(), ["example.com", "test.org"]);
    }

    #[test]
    fn test_missing_file() {
        assert!(TrackedZones::from_file(Path::new("/nonexistent/zones.txt")).is_err());
    }

    #[test]
    fn test_no_partial_label_match() {
        let zones = TrackedZones::from_list(["example.com"]);

        assert_eq!(zones.zone_for("notexample.com"), None);
        assert_eq!(zones.zone_for("example.com.evil.net"), None);
        assert_eq!(zones.zone_for("examplecom"), None);
    }

    #[test]
    fn test_first_listed_zone_wins() {
        let broad_first = TrackedZones::from_list(["example.com", "a.example.com"]);
        assert_eq!(broad_first.zone_for("x.a.example.com"), Some("example.com"));

        let narrow_first = TrackedZones::from_list(["a.example.com", "example.com"]);
        assert_eq!(narrow_first.zone_for("x.a.example.com"), Some("a.example.com"));
        assert_eq!(narrow_first.zone_for("b.example.com"), Some("example.com"));
    }

    #[test]
    fn test_case_and_trailing_dot() {
        let zones = TrackedZones::from_list(["Example.COM"]);

        assert_eq!(zones.zone_for("WWW.EXAMPLE.COM."), Some("example.com"));
    }

    #[test]
    fn test_normalization_and_dedup() {
        let zones = TrackedZones::from_list(["*.example.com", ".example.com", "example.com.", ""]);
        assert_eq!(zones.tracked_zones(), ["example.com"]);
        assert!(!zones.is_empty());
    }
}
