// src/dns/mod.rs
pub mod linker;
pub mod resolver;

pub use linker::HostnameLinker;
pub use resolver::{DnsResolver, GoogleDnsResolver};
