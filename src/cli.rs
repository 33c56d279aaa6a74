// src/cli.rs
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// ct-harvest: crt.sh certificate harvester
///
/// Queries crt.sh for every tracked zone, downloads certificates not yet
/// stored, links them into the inventory and marks expired certificates.
#[derive(Parser, Debug, Clone)]
#[command(name = "ct-harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // ===== Input & Configuration =====
    /// Path to TOML config file
    #[arg(short = 'c', long = "config", default_value = "ct-harvest.toml")]
    pub config: String,

    // ===== Harvesting =====
    /// Resolve certificate hostnames and record DNS results
    #[arg(long = "fetch_dns_records")]
    pub fetch_dns_records: bool,

    /// Store certificates in the database only, or also save them to disk
    #[arg(long = "download_methods", value_enum, default_value_t = DownloadMethod::DbOnly)]
    pub download_methods: DownloadMethod,

    /// Directory for raw certificates when saving to disk
    #[arg(long = "cert_save_location", default_value = "/mnt/workspace/crt_sh")]
    pub cert_save_location: PathBuf,

    // ===== Display =====
    /// Disable progress indicator
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    // ===== Logging =====
    /// Verbose logging (set log level to debug)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet logging (set log level to warn)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

/// Where downloaded certificates go
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DownloadMethod {
    /// Database and `<cert_save_location>/<id>.crt`
    #[value(name = "dbAndSave")]
    DbAndSave,
    /// Database only
    #[value(name = "dbOnly")]
    DbOnly,
}

impl Cli {
    /// Validate flag combinations and return errors for invalid usage
    pub fn validate(&self) -> anyhow::Result<()> {
        // Verbose and quiet are mutually exclusive
        if self.verbose && self.quiet {
            anyhow::bail!("Cannot specify both --verbose and --quiet");
        }

        if self.download_methods == DownloadMethod::DbAndSave
            && self.cert_save_location.as_os_str().is_empty()
        {
            anyhow::bail!("--cert_save_location cannot be empty with --download_methods dbAndSave");
        }

        Ok(())
    }

    /// Directory raw certificates are written to, if any
    pub fn save_dir(&self) -> Option<PathBuf> {
        match self.download_methods {
            DownloadMethod::DbAndSave => Some(self.cert_save_location.clone()),
            DownloadMethod::DbOnly => None,
        }
    }

    /// Check if progress indicator should be enabled
    pub fn should_show_progress(&self) -> bool {
        !self.no_progress && !self.quiet
    }

    /// Log level forced by flags, None to defer to the config file
    pub fn log_level(&self) -> Option<&str> {
        if self.verbose {
            Some("debug")
        } else if self.quiet {
            Some("warn")
        } else {
            None
        }
    }
}
