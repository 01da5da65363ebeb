//! Push Reconciler
//!
//! Applies server push messages to the store. Messages for resources that are not
//! displayed are dropped. While any displayed resource is loading, messages are held in a
//! queue (one entry per resource id) and replayed once loading finishes.

pub mod message;

pub use message::PushMessage;

use crate::config::PushConfig;
use crate::error::PushError;
use crate::fetcher::{FetchBatchEvent, Fetcher};
use crate::resource::Resource;
use crate::store::{MountedResources, ResourceStore, SuccessMeta};
use crate::types::Iri;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// What happened to an incoming message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushDisposition {
    /// Push handling is disabled, or the resource is not displayed
    Discarded,
    /// Held until displayed resources finish loading
    Queued,
    /// The queue was drained immediately
    Applied(DrainReport),
}

/// Store changes made by one drain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub deleted: Vec<Iri>,
    pub upserted: Vec<Iri>,
    pub refetched: Vec<Iri>,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.upserted.is_empty() && self.refetched.is_empty()
    }
}

/// Push message queue and replay
#[derive(Clone)]
pub struct PushReconciler {
    store: Arc<ResourceStore>,
    fetcher: Fetcher,
    mounted: Arc<dyn MountedResources>,
    queue: Arc<Mutex<Vec<PushMessage>>>,
    drain_scheduled: Arc<AtomicBool>,
    config: PushConfig,
}

impl PushReconciler {
    pub fn new(fetcher: Fetcher, mounted: Arc<dyn MountedResources>, config: PushConfig) -> Self {
        Self {
            store: fetcher.store().clone(),
            fetcher,
            mounted,
            queue: Arc::new(Mutex::new(Vec::new())),
            drain_scheduled: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Decode and handle a raw push document.
    pub async fn on_raw(&self, value: &Value) -> Result<PushDisposition, PushError> {
        let message = PushMessage::from_json(value)?;
        Ok(self.on_message(message).await)
    }

    pub async fn on_message(&self, message: PushMessage) -> PushDisposition {
        if !self.config.enabled {
            trace!(iri = %message.resource_id, "Push handling disabled");
            return PushDisposition::Discarded;
        }
        if !self.is_mounted(&message.resource_id) {
            trace!(iri = %message.resource_id, "Push for resource not displayed");
            return PushDisposition::Discarded;
        }

        self.enqueue(message);
        if self.is_mounted_loading() {
            self.schedule_drain();
            PushDisposition::Queued
        } else {
            PushDisposition::Applied(self.drain().await)
        }
    }

    /// Apply every queued message.
    ///
    /// Tombstones delete, component positions are re-fetched in one shallow batch, and
    /// everything else is upserted from the pushed payload.
    pub async fn drain(&self) -> DrainReport {
        let messages = std::mem::take(&mut *self.queue.lock());
        let mut report = DrainReport::default();
        if messages.is_empty() {
            return report;
        }

        let meta = SuccessMeta::for_path(self.fetcher.ledger().primary_path());
        let mut refetch = Vec::new();
        let mut upserts = Vec::new();
        for message in messages {
            if message.is_tombstone() {
                let changed = self.store.delete(&message.resource_id);
                if !changed.is_empty() {
                    report.deleted.push(message.resource_id);
                }
            } else if message.is_component_position() {
                refetch.push(message.resource_id);
            } else if let Some(payload) = message.payload {
                match Resource::from_document(&message.resource_id, payload) {
                    Ok(resource) => upserts.push(resource),
                    Err(err) => warn!(iri = %message.resource_id, error = %err, "Push payload rejected"),
                }
            }
        }

        if !refetch.is_empty() {
            let fetched = self
                .fetcher
                .fetch_batch(FetchBatchEvent {
                    paths: refetch.clone(),
                    token: None,
                    no_save: true,
                    shallow: true,
                })
                .await;
            report.refetched = refetch;
            upserts.extend(fetched.into_iter().flatten());
        }

        for resource in upserts {
            let iri = resource.iri.clone();
            if self.store.upsert(resource, meta.clone()) {
                report.upserted.push(iri);
            }
        }

        info!(
            deleted = report.deleted.len(),
            upserted = report.upserted.len(),
            refetched = report.refetched.len(),
            "Push queue drained"
        );
        report
    }

    /// Snapshot of queued messages, in queue order
    pub fn queued(&self) -> Vec<PushMessage> {
        self.queue.lock().clone()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    fn enqueue(&self, message: PushMessage) {
        let mut queue = self.queue.lock();
        match queue
            .iter_mut()
            .find(|queued| queued.resource_id == message.resource_id)
        {
            Some(queued) => *queued = message,
            None => queue.push(message),
        }
    }

    fn is_mounted(&self, iri: &str) -> bool {
        let counterpart = self.store.counterpart(iri);
        self.mounted
            .mounted_ids()
            .iter()
            .any(|id| id == iri || Some(id) == counterpart.as_ref())
    }

    fn is_mounted_loading(&self) -> bool {
        self.mounted
            .mounted_ids()
            .iter()
            .any(|id| self.store.is_pending(id))
    }

    /// Start the single deferred drain task unless one is already waiting.
    fn schedule_drain(&self) {
        if self.drain_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(queued = self.queue_len(), "Push drain deferred until loading finishes");
        let reconciler = self.clone();
        tokio::spawn(async move {
            let mut pending = reconciler.store.watch_pending();
            while reconciler.is_mounted_loading() {
                if pending.changed().await.is_err() {
                    break;
                }
            }
            reconciler.drain_scheduled.store(false, Ordering::Release);
            reconciler.drain().await;
        });
    }
}
