// src/stats.rs
//! Run statistics for ct-harvest

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Default)]
struct Counters {
    zones_queried: AtomicU64,
    identifiers_seen: AtomicU64,
    identifiers_known: AtomicU64,
    certificates_fetched: AtomicU64,
    certificates_inserted: AtomicU64,
    certificates_linked: AtomicU64,
    parse_failures: AtomicU64,
    dns_records_added: AtomicU64,
    certificates_expired: AtomicU64,
}

/// Thread-safe statistics collector
#[derive(Clone)]
pub struct StatsCollector {
    counters: Arc<Counters>,
    start_time: Instant,
}

/// Snapshot of statistics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub zones_queried: u64,
    pub identifiers_seen: u64,
    pub identifiers_known: u64,
    pub certificates_fetched: u64,
    pub certificates_inserted: u64,
    pub certificates_linked: u64,
    pub parse_failures: u64,
    pub dns_records_added: u64,
    pub certificates_expired: u64,
    pub elapsed_secs: u64,
}

impl StatsCollector {
    /// Create a new StatsCollector
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            start_time: Instant::now(),
        }
    }

    pub fn increment_zones_queried(&self) {
        self.counters.zones_queried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_identifiers_seen(&self, count: u64) {
        self.counters
            .identifiers_seen
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_identifiers_known(&self, count: u64) {
        self.counters
            .identifiers_known
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_fetched(&self) {
        self.counters
            .certificates_fetched
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_inserted(&self) {
        self.counters
            .certificates_inserted
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_linked(&self) {
        self.counters
            .certificates_linked
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_parse_failures(&self) {
        self.counters.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dns_records(&self) {
        self.counters
            .dns_records_added
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_expired(&self, count: u64) {
        self.counters
            .certificates_expired
            .fetch_add(count, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        let c = &self.counters;
        StatsSnapshot {
            zones_queried: c.zones_queried.load(Ordering::Relaxed),
            identifiers_seen: c.identifiers_seen.load(Ordering::Relaxed),
            identifiers_known: c.identifiers_known.load(Ordering::Relaxed),
            certificates_fetched: c.certificates_fetched.load(Ordering::Relaxed),
            certificates_inserted: c.certificates_inserted.load(Ordering::Relaxed),
            certificates_linked: c.certificates_linked.load(Ordering::Relaxed),
            parse_failures: c.parse_failures.load(Ordering::Relaxed),
            dns_records_added: c.dns_records_added.load(Ordering::Relaxed),
            certificates_expired: c.certificates_expired.load(Ordering::Relaxed),
            elapsed_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Format statistics as a human-readable string
    pub fn format_stats(&self) -> String {
        let s = self.snapshot();
        format!(
            "{} zones | {} ids ({} known) | {} fetched | {} inserted | {} linked | \
             {} unparseable | {} dns records | {} expired | elapsed: {}",
            s.zones_queried,
            s.identifiers_seen,
            s.identifiers_known,
            s.certificates_fetched,
            s.certificates_inserted,
            s.certificates_linked,
            s.parse_failures,
            s.dns_records_added,
            s.certificates_expired,
            Self::format_duration(s.elapsed_secs)
        )
    }

    /// Format a duration in seconds
    pub fn format_duration(secs: u64) -> String {
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}
