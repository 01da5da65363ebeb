//! Resource record and API state types.

use crate::error::ResourceError;
use crate::resource::{Resource, ResourceType};
use crate::types::Iri;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Request metadata that produced a successful payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessMeta {
    /// Primary chain root path sent in the `path` header
    pub path: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl SuccessMeta {
    pub fn for_path(path: Option<String>) -> Self {
        let mut headers = BTreeMap::new();
        if let Some(path) = &path {
            headers.insert("path".to_string(), path.clone());
        }
        Self { path, headers }
    }
}

/// Three-state API status of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiState {
    /// Fetch issued; `previous` keeps the last success meta while reloading
    Pending { previous: Option<SuccessMeta> },
    Success(SuccessMeta),
    Error {
        error: ResourceError,
        previous: Option<SuccessMeta>,
    },
}

impl ApiState {
    pub fn is_pending(&self) -> bool {
        matches!(self, ApiState::Pending { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApiState::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ApiState::Error { .. })
    }

    /// Most recent success meta, including one retained across a reload or failure
    pub fn success_meta(&self) -> Option<&SuccessMeta> {
        match self {
            ApiState::Success(meta) => Some(meta),
            ApiState::Pending { previous } | ApiState::Error { previous, .. } => previous.as_ref(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ApiState::Pending { .. } => "pending",
            ApiState::Success(_) => "success",
            ApiState::Error { .. } => "error",
        }
    }
}

/// One stored resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub iri: Iri,
    pub resource_type: Option<ResourceType>,
    pub data: Option<Value>,
    pub state: ApiState,
    /// Outstanding fetches that marked this record pending
    #[serde(skip)]
    pub(crate) pending_claims: u32,
}

impl ResourceRecord {
    pub(crate) fn pending(iri: &str) -> Self {
        Self {
            iri: iri.to_string(),
            resource_type: ResourceType::from_iri(iri),
            data: None,
            state: ApiState::Pending { previous: None },
            pending_claims: 0,
        }
    }

    pub fn resource(&self) -> Option<Resource> {
        self.data.as_ref().map(|data| Resource {
            iri: self.iri.clone(),
            resource_type: self.resource_type,
            data: data.clone(),
        })
    }

    /// Whether this record counts as settled for a chain rooted at `root_path`
    ///
    /// A reload keeps counting with its previous success until it settles.
    pub(crate) fn is_resolved_for(&self, root_path: &str) -> bool {
        match &self.state {
            ApiState::Pending {
                previous: Some(meta),
            } if self.data.is_some() => self.success_resolves(meta, root_path),
            ApiState::Pending { .. } => false,
            ApiState::Error { error, .. } => error.is_client_error(),
            ApiState::Success(meta) => self.success_resolves(meta, root_path),
        }
    }

    // Positions are route-scoped too but only components are re-checked here.
    fn success_resolves(&self, meta: &SuccessMeta, root_path: &str) -> bool {
        self.resource_type != Some(ResourceType::Component) || meta.path.as_deref() == Some(root_path)
    }
}

/// Kind of change announced for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEventKind {
    Pending,
    Saved,
    Failed,
    Deleted,
}

/// Per-resource change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEvent {
    pub iri: Iri,
    pub kind: ResourceEventKind,
}

impl ResourceEvent {
    pub(crate) fn new(iri: &str, kind: ResourceEventKind) -> Self {
        Self {
            iri: iri.to_string(),
            kind,
        }
    }
}

/// Per-state counts, used for reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub total: usize,
    pub pending: usize,
    pub success: usize,
    pub error: usize,
}
