// src/lib.rs
// Library interface for ct-harvest
pub mod cert_parser;
pub mod cli;
pub mod config;
pub mod crtsh;
pub mod database;
pub mod dedupe;
pub mod dns;
pub mod error;
pub mod expiry;
pub mod ingest;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod stats;
pub mod types;
pub mod zones;
