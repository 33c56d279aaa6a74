// src/dedupe.rs
use anyhow::Result;
use std::collections::HashSet;
use tracing::debug;

use crate::database::DatabaseBackend;

/// crt.sh identifiers already linked in the store when the run began.
///
/// Taken once per run and never refreshed, so identifiers ingested during
/// the run do not change its answers.
#[derive(Debug, Clone, Default)]
pub struct KnownIdentifiers {
    ids: HashSet<i64>,
}

impl KnownIdentifiers {
    /// Snapshot the identifiers currently linked in `store`
    pub async fn snapshot(store: &dyn DatabaseBackend) -> Result<Self> {
        let ids = store.known_min_ids().await?;
        debug!("Dedup snapshot holds {} identifiers", ids.len());
        Ok(Self { ids })
    }

    pub fn from_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Returns true if `identifier` needs no fetch
    pub fn already_known(&self, identifier: i64) -> bool {
        self.ids.contains(&identifier)
    }

    /// Split `identifiers` into (to fetch, already known), preserving order
    pub fn partition<'a, I>(&self, identifiers: I) -> (Vec<i64>, Vec<i64>)
    where
        I: IntoIterator<Item = &'a i64>,
    {
        identifiers
            .into_iter()
            .copied()
            .partition(|id| !self.already_known(*id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
