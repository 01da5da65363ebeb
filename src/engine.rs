//! Engine facade
//!
//! Wires the store, ledger, fetcher and push reconciler together and exposes the surface
//! a UI layer consumes.

use crate::chain::ChainLedger;
use crate::config::EngineConfig;
use crate::error::{EngineError, PushError};
use crate::fetcher::{FetchOutcome, FetchResourceEvent, Fetcher, RouteState};
use crate::push::{PushDisposition, PushMessage, PushReconciler};
use crate::resource::Resource;
use crate::store::{ErrorBoundary, ResourceEvent, ResourceStore};
use crate::transport::{HttpTransport, Transport};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

pub struct Engine {
    config: EngineConfig,
    store: Arc<ResourceStore>,
    ledger: Arc<ChainLedger>,
    fetcher: Fetcher,
    reconciler: PushReconciler,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        boundary: Arc<dyn ErrorBoundary>,
    ) -> Self {
        let store = ResourceStore::shared(boundary);
        let ledger = Arc::new(ChainLedger::with_stale_after(
            store.clone(),
            config.fetch.stale_chain_after(),
        ));
        let fetcher = Fetcher::new(transport, ledger.clone(), config.fetch.clone());
        let reconciler = PushReconciler::new(fetcher.clone(), store.clone(), config.push.clone());
        Self {
            config,
            store,
            ledger,
            fetcher,
            reconciler,
        }
    }

    /// Build an engine talking HTTP to `config.api.base_url`.
    pub fn from_config(
        config: EngineConfig,
        boundary: Arc<dyn ErrorBoundary>,
    ) -> Result<Self, EngineError> {
        let transport = HttpTransport::new(&config.api)?;
        Ok(Self::new(config, Arc::new(transport), boundary))
    }

    pub fn get_resource(&self, iri: &str) -> Option<Resource> {
        self.store.get_resource(iri)
    }

    /// Per-resource change feed
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.store.subscribe()
    }

    /// True while any resource is pending
    pub fn is_loading(&self) -> bool {
        self.store.pending_count() > 0
    }

    /// Pending resource count; loading while non-zero
    pub fn watch_loading(&self) -> watch::Receiver<usize> {
        self.store.watch_pending()
    }

    /// Non-primary fetch of one resource and its nested graph
    pub async fn fetch_resource(&self, path: &str) -> Option<Resource> {
        self.fetcher
            .fetch_resource(FetchResourceEvent::new(path))
            .await
            .into_resource()
    }

    /// Primary fetch for a navigation
    pub async fn fetch_route(&self, route: &RouteState) -> FetchOutcome {
        self.fetcher.fetch_route(route).await
    }

    pub async fn on_push(&self, message: PushMessage) -> PushDisposition {
        self.reconciler.on_message(message).await
    }

    pub async fn on_push_raw(&self, value: &Value) -> Result<PushDisposition, PushError> {
        self.reconciler.on_raw(value).await
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<ChainLedger> {
        &self.ledger
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn reconciler(&self) -> &PushReconciler {
        &self.reconciler
    }
}
