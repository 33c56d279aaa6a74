// src/config.rs

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AggregatorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_zone_pacing")]
    pub zone_pacing_secs: u64,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String { "https://crt.sh".to_string() }
fn default_zone_pacing() -> u64 { 5 }
fn default_retry_delay() -> u64 { 3 }
fn default_timeout() -> u64 { 30 }

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            zone_pacing_secs: default_zone_pacing(),
            retry_delay_secs: default_retry_delay(),
            timeout_secs: default_timeout(),
        }
    }
}

impl AggregatorConfig {
    pub fn zone_pacing(&self) -> Duration {
        Duration::from_secs(self.zone_pacing_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    #[serde(default = "default_resolver_url")]
    pub url: String,
    #[serde(default = "default_record_types")]
    pub record_types: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_resolver_url() -> String { "https://dns.google/resolve".to_string() }
fn default_record_types() -> Vec<String> {
    vec!["A".to_string(), "AAAA".to_string(), "CNAME".to_string()]
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            url: default_resolver_url(),
            record_types: default_record_types(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_enabled")]
    pub enabled: bool,
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_enabled() -> bool { true }

fn default_database_url() -> String {
    "postgresql://localhost/marinus".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: default_database_enabled(),
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ZonesConfig {
    #[serde(default)]
    pub tracked: Vec<String>,
    /// One zone per line, merged after `tracked`
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_job_name")]
    pub job_name: String,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub zones: ZonesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_job_name() -> String { "get_crt_sh".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            job_name: default_job_name(),
            aggregator: AggregatorConfig::default(),
            resolver: ResolverConfig::default(),
            database: DatabaseConfig::default(),
            zones: ZonesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(cfg)
    }
}
