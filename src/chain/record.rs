//! Fetch chain records.

use crate::types::{ChainToken, Iri};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

/// Side-channel list of extra resources to fetch for a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestRecord {
    pub path: String,
    /// `None` until the manifest response has been handled
    pub resources: Option<Vec<Iri>>,
    pub error: Option<String>,
}

impl ManifestRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            resources: None,
            error: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.resources.is_some() || self.error.is_some()
    }
}

/// One logical navigation or nested fetch operation
#[derive(Debug, Clone)]
pub struct FetchChain {
    pub token: ChainToken,
    pub path: String,
    /// Member resources, insertion ordered, unique
    pub resources: Vec<Iri>,
    pub is_primary: bool,
    pub abort: bool,
    pub manifest: Option<ManifestRecord>,
    pub created_at: Instant,
    pub created_at_utc: DateTime<Utc>,
    /// A quiescence wait is outstanding
    pub(crate) finishing: bool,
}

impl FetchChain {
    pub fn new(
        token: ChainToken,
        path: &str,
        is_primary: bool,
        manifest_path: Option<String>,
    ) -> Self {
        Self {
            token,
            path: path.to_string(),
            resources: Vec::new(),
            is_primary,
            abort: false,
            manifest: manifest_path.map(ManifestRecord::new),
            created_at: Instant::now(),
            created_at_utc: Utc::now(),
            finishing: false,
        }
    }

    pub fn has_resource(&self, iri: &str) -> bool {
        self.resources.iter().any(|member| member == iri)
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            token: self.token,
            path: self.path.clone(),
            resources: self.resources.clone(),
            is_primary: self.is_primary,
            abort: self.abort,
            manifest: self.manifest.clone(),
            created_at: self.created_at_utc,
        }
    }
}

/// Read-only copy of a chain for callers outside the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainSnapshot {
    pub token: ChainToken,
    pub path: String,
    pub resources: Vec<Iri>,
    pub is_primary: bool,
    pub abort: bool,
    pub manifest: Option<ManifestRecord>,
    pub created_at: DateTime<Utc>,
}
