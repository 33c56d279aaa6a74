// src/crtsh/mod.rs
pub mod client;
pub mod planner;
pub mod types;

pub use client::{Content, ContentKind, CrtShClient};
pub use planner::ZoneQueryPlanner;
pub use types::{CtLogEntry, Harvest};
