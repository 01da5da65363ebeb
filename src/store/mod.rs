//! Resource Store
//!
//! Single source of truth for every known resource, its payload and its API state.
//! All mutation goes through the operations here so that cascade and staleness rules
//! are applied at one choke point. Mutations are announced on a per-resource broadcast
//! channel and on two `watch` channels (store revision and pending count) that waiters
//! use instead of polling.

pub mod boundary;
mod cascade;
pub mod record;

pub use boundary::{ErrorBoundary, LogErrorBoundary, MountedResources, RecordingErrorBoundary};
pub use record::{ApiState, ResourceEvent, ResourceEventKind, ResourceRecord, StoreSummary, SuccessMeta};

use crate::error::{ResourceError, StoreError};
use crate::resource::Resource;
use crate::types::Iri;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, trace};

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) records: HashMap<Iri, ResourceRecord>,
    /// draft <-> published, stored in both directions
    pub(crate) publishable: HashMap<Iri, Iri>,
    /// Resources belonging to the currently displayed navigation
    pub(crate) current_ids: Vec<Iri>,
}

impl StoreState {
    fn pending_count(&self) -> usize {
        self.records
            .values()
            .filter(|record| record.state.is_pending())
            .count()
    }

    pub(crate) fn unmap_publishable(&mut self, iri: &str) {
        if let Some(other) = self.publishable.remove(iri) {
            if self.publishable.get(&other).map(String::as_str) == Some(iri) {
                self.publishable.remove(&other);
            }
        }
    }

    fn map_publishable(&mut self, draft: &str, published: &str) {
        self.publishable.insert(draft.to_string(), published.to_string());
        self.publishable.insert(published.to_string(), draft.to_string());
    }

    fn record_publishable_links(&mut self, iri: &str, data: &Value) {
        if let Some(published) = data.get("publishedResource").and_then(Value::as_str) {
            self.map_publishable(iri, published);
        }
        if let Some(draft) = data.get("draftResource").and_then(Value::as_str) {
            self.map_publishable(draft, iri);
        }
    }
}

/// In-memory resource store
pub struct ResourceStore {
    state: RwLock<StoreState>,
    revision: watch::Sender<u64>,
    pending: watch::Sender<usize>,
    events: broadcast::Sender<ResourceEvent>,
    boundary: Arc<dyn ErrorBoundary>,
}

impl ResourceStore {
    pub fn new(boundary: Arc<dyn ErrorBoundary>) -> Self {
        let (revision, _) = watch::channel(0);
        let (pending, _) = watch::channel(0);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(StoreState::default()),
            revision,
            pending,
            events,
            boundary,
        }
    }

    pub fn shared(boundary: Arc<dyn ErrorBoundary>) -> Arc<Self> {
        Arc::new(Self::new(boundary))
    }

    /// Store a successful payload. Identical payload and meta is a no-op.
    ///
    /// Returns true if anything changed.
    pub fn upsert(&self, resource: Resource, meta: SuccessMeta) -> bool {
        let mut state = self.state.write();
        let iri = resource.iri.clone();
        if let Some(existing) = state.records.get(&iri) {
            let same_data = existing.data.as_ref() == Some(&resource.data);
            if same_data && existing.state == ApiState::Success(meta.clone()) {
                trace!(iri = %iri, "Upsert skipped, payload unchanged");
                return false;
            }
        }

        state.record_publishable_links(&iri, &resource.data);
        let record = state
            .records
            .entry(iri.clone())
            .or_insert_with(|| ResourceRecord::pending(&iri));
        if record.data.as_ref() != Some(&resource.data) {
            record.data = Some(resource.data);
        }
        record.resource_type = resource.resource_type;
        record.state = ApiState::Success(meta);
        record.pending_claims = 0;

        let pending = state.pending_count();
        drop(state);
        debug!(iri = %iri, "Resource saved");
        self.publish(vec![ResourceEvent::new(&iri, ResourceEventKind::Saved)], pending);
        true
    }

    /// Enter the pending state, keeping any prior success meta.
    pub fn mark_pending(&self, iri: &str) {
        let mut state = self.state.write();
        let record = state
            .records
            .entry(iri.to_string())
            .or_insert_with(|| ResourceRecord::pending(iri));
        if !record.state.is_pending() {
            let previous = record.state.success_meta().cloned();
            record.state = ApiState::Pending { previous };
        }
        record.pending_claims += 1;
        let pending = state.pending_count();
        drop(state);
        trace!(iri = %iri, "Resource pending");
        self.publish(vec![ResourceEvent::new(iri, ResourceEventKind::Pending)], pending);
    }

    /// Record a failed fetch. Only the primary root error is surfaced to the boundary.
    pub fn mark_error(&self, iri: &str, error: ResourceError, is_primary_root: bool) {
        let mut state = self.state.write();
        let record = state
            .records
            .entry(iri.to_string())
            .or_insert_with(|| ResourceRecord::pending(iri));
        let previous = record.state.success_meta().cloned();
        record.state = ApiState::Error {
            error: error.clone(),
            previous,
        };
        record.pending_claims = 0;
        let pending = state.pending_count();
        drop(state);

        debug!(iri = %iri, status = ?error.status, is_primary_root, "Resource failed");
        if is_primary_root {
            self.boundary.show_fatal(iri, &error);
        }
        self.publish(vec![ResourceEvent::new(iri, ResourceEventKind::Failed)], pending);
    }

    /// Drop one pending claim whose result was discarded.
    ///
    /// When no claim is left the record returns to its last successful state, or is
    /// forgotten if it never had a payload. Returns true if the record left pending.
    pub fn release_pending(&self, iri: &str) -> bool {
        let mut state = self.state.write();
        let Some(record) = state.records.get_mut(iri) else {
            return false;
        };
        let ApiState::Pending { previous } = &record.state else {
            return false;
        };
        record.pending_claims = record.pending_claims.saturating_sub(1);
        if record.pending_claims > 0 {
            return false;
        }
        let kind = match (previous.clone(), record.data.is_some()) {
            (Some(meta), true) => {
                record.state = ApiState::Success(meta);
                ResourceEventKind::Saved
            }
            _ => {
                state.records.remove(iri);
                ResourceEventKind::Deleted
            }
        };
        let pending = state.pending_count();
        drop(state);
        trace!(iri = %iri, "Pending claim released");
        self.publish(vec![ResourceEvent::new(iri, kind)], pending);
        true
    }

    /// Remove a resource and apply the delete cascade.
    ///
    /// Returns every IRI that changed (deleted or rewritten).
    pub fn delete(&self, iri: &str) -> Vec<Iri> {
        let mut state = self.state.write();
        let mut events = Vec::new();
        if !cascade::remove(&mut state, iri, &mut events) {
            trace!(iri = %iri, "Delete of unknown resource ignored");
            return Vec::new();
        }
        let pending = state.pending_count();
        drop(state);

        let changed = events.iter().map(|event| event.iri.clone()).collect();
        debug!(iri = %iri, cascade = events.len() - 1, "Resource deleted");
        self.publish(events, pending);
        changed
    }

    /// True iff any listed resource is pending.
    pub fn is_any_pending(&self, iris: &[Iri]) -> Result<bool, StoreError> {
        let state = self.state.read();
        let mut any = false;
        for iri in iris {
            let record = state
                .records
                .get(iri)
                .ok_or_else(|| StoreError::UnknownResource(iri.clone()))?;
            any |= record.state.is_pending();
        }
        Ok(any)
    }

    /// Whether every member of a chain rooted at `root_path` has settled.
    ///
    /// The root must not be in error; members must be successful (components only when
    /// fetched for this root path) or failed with a 4xx status.
    pub fn is_graph_resolved(&self, root_path: &str, members: &[Iri]) -> bool {
        let state = self.state.read();
        if state
            .records
            .get(root_path)
            .map_or(false, |root| root.state.is_error())
        {
            return false;
        }
        members.iter().all(|iri| {
            state
                .records
                .get(iri)
                .map_or(false, |record| record.is_resolved_for(root_path))
        })
    }

    pub fn get(&self, iri: &str) -> Option<ResourceRecord> {
        self.state.read().records.get(iri).cloned()
    }

    /// Resource payload if one has been stored
    pub fn get_resource(&self, iri: &str) -> Option<Resource> {
        self.state
            .read()
            .records
            .get(iri)
            .and_then(ResourceRecord::resource)
    }

    pub fn contains(&self, iri: &str) -> bool {
        self.state.read().records.contains_key(iri)
    }

    pub fn is_pending(&self, iri: &str) -> bool {
        self.state
            .read()
            .records
            .get(iri)
            .map_or(false, |record| record.state.is_pending())
    }

    pub fn records(&self) -> Vec<ResourceRecord> {
        let mut records: Vec<ResourceRecord> =
            self.state.read().records.values().cloned().collect();
        records.sort_by(|a, b| a.iri.cmp(&b.iri));
        records
    }

    pub fn pending_count(&self) -> usize {
        *self.pending.borrow()
    }

    pub fn summary(&self) -> StoreSummary {
        let state = self.state.read();
        let mut summary = StoreSummary {
            total: state.records.len(),
            ..StoreSummary::default()
        };
        for record in state.records.values() {
            match record.state {
                ApiState::Pending { .. } => summary.pending += 1,
                ApiState::Success(_) => summary.success += 1,
                ApiState::Error { .. } => summary.error += 1,
            }
        }
        summary
    }

    /// Register a draft <-> published pair explicitly.
    pub fn register_publishable(&self, draft: &str, published: &str) {
        self.state.write().map_publishable(draft, published);
    }

    /// The draft or published counterpart of `iri`
    pub fn counterpart(&self, iri: &str) -> Option<Iri> {
        self.state.read().publishable.get(iri).cloned()
    }

    pub fn set_current_ids(&self, ids: Vec<Iri>) {
        self.state.write().current_ids = ids;
    }

    pub fn current_ids(&self) -> Vec<Iri> {
        self.state.read().current_ids.clone()
    }

    /// Forget everything, for a new navigation session.
    pub fn reset(&self) {
        let mut state = self.state.write();
        let events: Vec<ResourceEvent> = state
            .records
            .keys()
            .map(|iri| ResourceEvent::new(iri, ResourceEventKind::Deleted))
            .collect();
        *state = StoreState::default();
        drop(state);
        debug!(removed = events.len(), "Store reset");
        self.publish(events, 0);
    }

    /// Per-resource change feed
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }

    /// Revision counter, bumped on every mutation
    pub fn watch_revision(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Number of pending resources
    pub fn watch_pending(&self) -> watch::Receiver<usize> {
        self.pending.subscribe()
    }

    fn publish(&self, events: Vec<ResourceEvent>, pending: usize) {
        self.pending.send_if_modified(|count| {
            if *count == pending {
                false
            } else {
                *count = pending;
                true
            }
        });
        self.revision.send_modify(|revision| *revision += 1);
        for event in events {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

impl MountedResources for ResourceStore {
    fn mounted_ids(&self) -> Vec<Iri> {
        self.current_ids()
    }
}
