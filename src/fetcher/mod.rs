//! Fetcher
//!
//! Recursive, deduplicated fetching of a resource graph. A top-level fetch opens a chain
//! in the ledger, fetches the root with preload hints, walks nested relations under the
//! same chain token, runs the route manifest concurrently, waits for the chain to settle
//! and finishes it. Fetches run as spawned tasks: a caller that drops its future only
//! stops waiting, and the chain still settles and finishes. Every store write goes through [`ChainLedger::commit`] so results
//! of a chain that is no longer current are dropped.

mod manifest;
pub mod preload;
pub mod route;

pub use route::{RouteState, RouteTarget};

use crate::chain::{ChainLedger, ChainStart, FinishOutcome, StartChain};
use crate::config::FetchConfig;
use crate::error::{ChainError, FetchError};
use crate::resource::Resource;
use crate::store::{ResourceStore, SuccessMeta};
use crate::transport::{ApiRequest, Transport, PATH_HEADER, PRELOAD_HEADER};
use crate::types::{ChainToken, Iri};
use futures::future::{join_all, BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// One resource fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResourceEvent {
    pub path: Iri,
    /// Continue this chain instead of opening one
    pub token: Option<ChainToken>,
    pub manifest_path: Option<String>,
    /// Overrides the preload hints derived from the resource type
    pub preload: Option<Vec<String>>,
    /// Do not follow nested relations
    pub shallow: bool,
    /// Fetch without writing to the store
    pub no_save: bool,
    pub is_primary: bool,
}

impl FetchResourceEvent {
    pub fn new(path: impl Into<Iri>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn primary(path: impl Into<Iri>) -> Self {
        Self {
            is_primary: true,
            ..Self::new(path)
        }
    }

    pub fn with_token(mut self, token: ChainToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_manifest(mut self, manifest_path: impl Into<String>) -> Self {
        self.manifest_path = Some(manifest_path.into());
        self
    }

    pub fn shallow(mut self) -> Self {
        self.shallow = true;
        self
    }

    pub fn no_save(mut self) -> Self {
        self.no_save = true;
        self
    }
}

/// Several resources fetched concurrently
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchBatchEvent {
    pub paths: Vec<Iri>,
    pub token: Option<ChainToken>,
    pub no_save: bool,
    pub shallow: bool,
}

/// Result of a resource fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Resource(Resource),
    /// The primary route asked the client to navigate elsewhere
    Redirect { from: Iri, to: String },
    /// Failed, discarded, or not stored
    Missing,
}

impl FetchOutcome {
    pub fn into_resource(self) -> Option<Resource> {
        match self {
            FetchOutcome::Resource(resource) => Some(resource),
            FetchOutcome::Redirect { .. } | FetchOutcome::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FetchOutcome::Missing)
    }
}

/// Resource graph fetcher
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    ledger: Arc<ChainLedger>,
    store: Arc<ResourceStore>,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, ledger: Arc<ChainLedger>, config: FetchConfig) -> Self {
        let store = ledger.store().clone();
        Self {
            transport,
            ledger,
            store,
            config,
        }
    }

    pub fn ledger(&self) -> &Arc<ChainLedger> {
        &self.ledger
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    /// Fetch a resource and, unless shallow, everything it references.
    ///
    /// Never fails: errors are recorded on the resource in the store and reported as
    /// [`FetchOutcome::Missing`].
    pub async fn fetch_resource(&self, event: FetchResourceEvent) -> FetchOutcome {
        self.fetch_boxed(event).await
    }

    /// Fetch several resources concurrently. Failed items come back as `None`.
    pub async fn fetch_batch(&self, event: FetchBatchEvent) -> Vec<Option<Resource>> {
        let FetchBatchEvent {
            paths,
            token,
            no_save,
            shallow,
        } = event;
        let fetches = paths.into_iter().map(|path| {
            self.fetch_boxed(FetchResourceEvent {
                path,
                token,
                no_save,
                shallow,
                ..FetchResourceEvent::default()
            })
        });
        join_all(fetches)
            .await
            .into_iter()
            .map(FetchOutcome::into_resource)
            .collect()
    }

    /// Fetch the primary resource for a route.
    pub async fn fetch_route(&self, route: &RouteState) -> FetchOutcome {
        let target = route::resolve(route);
        info!(route = %route.path, iri = %target.iri, "Fetching route");
        let mut event = FetchResourceEvent::primary(target.iri);
        event.manifest_path = target.manifest_path;
        self.fetch_resource(event).await
    }

    /// Runs the fetch as its own task, so it completes even if the caller stops waiting.
    fn fetch_boxed(&self, event: FetchResourceEvent) -> BoxFuture<'static, FetchOutcome> {
        let fetcher = self.clone();
        let path = event.path.clone();
        let task = tokio::spawn(async move { fetcher.run_fetch(event).await });
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(iri = %path, error = %err, "Fetch task failed");
                    FetchOutcome::Missing
                }
            }
        }
        .boxed()
    }

    async fn run_fetch(&self, event: FetchResourceEvent) -> FetchOutcome {
        let FetchResourceEvent {
            path,
            token,
            manifest_path,
            preload,
            shallow,
            no_save,
            is_primary,
        } = event;
        let owns_chain = token.is_none();
        // Nothing is stored, so the fetch cannot become the displayed navigation.
        let is_primary = is_primary && !no_save;

        let start = match self.ledger.start(StartChain {
            path: path.clone(),
            token,
            is_primary,
            manifest_path: manifest_path.clone(),
        }) {
            Ok(start) => start,
            Err(err) => {
                trace!(iri = %path, error = %err, "Fetch skipped");
                return self.current_outcome(&path);
            }
        };
        let token = start.token();

        match &start {
            ChainStart::Resolved { .. } => return self.await_ready(&path).await,
            ChainStart::Continue { abort: true, .. } => return self.current_outcome(&path),
            ChainStart::Created { .. } => {
                if let Some(manifest_path) = manifest_path {
                    self.spawn_manifest(manifest_path, token);
                }
            }
            ChainStart::Continue { .. } => {}
        }

        if !self.ledger.add_resource(token, &path) {
            let outcome = self.current_outcome(&path);
            if owns_chain {
                self.complete_chain(token, no_save).await;
            }
            return outcome;
        }

        let claimed =
            !no_save && self.ledger.commit(token, |store| store.mark_pending(&path)).is_some();
        let outcome = self
            .fetch_one(token, &path, preload.as_deref(), shallow, no_save, claimed)
            .await;

        if owns_chain {
            self.complete_chain(token, no_save).await;
        }
        outcome
    }

    async fn fetch_one(
        &self,
        token: ChainToken,
        path: &str,
        preload: Option<&[String]>,
        shallow: bool,
        no_save: bool,
        claimed: bool,
    ) -> FetchOutcome {
        let chain = self.ledger.chain(token);
        let chain_path = chain.as_ref().map(|chain| chain.path.clone());
        let is_chain_root = chain_path.as_deref() == Some(path);
        let is_primary_root = is_chain_root && chain.as_ref().map_or(false, |chain| chain.is_primary);
        let primary_path = self.ledger.primary_path().or(chain_path);

        let mut request = ApiRequest::new(path);
        if let Some(primary_path) = &primary_path {
            request = request.with_header(PATH_HEADER, primary_path.clone());
        }
        if let Some(hints) = preload::header_for(path, preload) {
            request = request.with_header(PRELOAD_HEADER, hints);
        }

        let result = self
            .transport
            .fetch(request)
            .await
            .map_err(FetchError::from)
            .and_then(|document| Resource::from_document(path, document));

        let resource = match result {
            Ok(resource) => resource,
            Err(error) => {
                if error.is_tolerated() {
                    debug!(iri = %path, error = %error, "Resource fetch failed");
                } else {
                    warn!(iri = %path, error = %error, "Resource fetch failed");
                }
                if claimed {
                    let resource_error = error.to_resource_error();
                    let written = self.ledger.commit(token, |store| {
                        store.mark_error(path, resource_error, is_primary_root)
                    });
                    if written.is_none() {
                        self.discard(token, path);
                    }
                }
                return FetchOutcome::Missing;
            }
        };

        if claimed {
            let meta = SuccessMeta::for_path(primary_path);
            let written = self
                .ledger
                .commit(token, |store| store.upsert(resource.clone(), meta));
            if written.is_none() {
                self.discard(token, path);
                return self.current_outcome(path);
            }
        }

        if is_primary_root {
            if let Some(to) = resource.redirect_path() {
                info!(from = %path, to = %to, "Route redirects");
                let to = to.to_string();
                self.ledger.abort(token);
                return FetchOutcome::Redirect {
                    from: path.to_string(),
                    to,
                };
            }
        }

        if !shallow {
            let nested = resource.nested_iris();
            if !nested.is_empty() {
                self.fetch_batch(FetchBatchEvent {
                    paths: nested,
                    token: Some(token),
                    no_save,
                    shallow,
                })
                .await;
            }
        }
        FetchOutcome::Resource(resource)
    }

    /// Wait for the chain to settle, then finish it.
    async fn complete_chain(&self, token: ChainToken, no_save: bool) {
        if !no_save {
            match self.ledger.wait_for_quiescence(token).await {
                Ok(quiescence) => trace!(token = %token, outcome = ?quiescence, "Chain settled"),
                Err(ChainError::EmptyChain(_)) => {}
                Err(err) => warn!(token = %token, error = %err, "Chain wait failed"),
            }
        }
        if let FinishOutcome::Promoted { members } = self.ledger.finish(token) {
            debug!(token = %token, members = members.len(), "Navigation committed");
            self.store.set_current_ids(members);
        }
    }

    /// Hand back a resource another chain is already loading, once it settles.
    async fn await_ready(&self, path: &str) -> FetchOutcome {
        let mut changes = self.store.watch_revision();
        let wait = async {
            while self.store.is_pending(path) {
                if changes.changed().await.is_err() {
                    break;
                }
            }
        };
        if tokio::time::timeout(self.config.ready_timeout(), wait)
            .await
            .is_err()
        {
            debug!(iri = %path, "Timed out waiting for in-flight resource");
        }
        self.current_outcome(path)
    }

    fn current_outcome(&self, path: &str) -> FetchOutcome {
        self.store
            .get_resource(path)
            .map_or(FetchOutcome::Missing, FetchOutcome::Resource)
    }

    fn discard(&self, token: ChainToken, path: &str) {
        let error = FetchError::StaleChain(token);
        trace!(iri = %path, error = %error, "Result discarded");
        self.store.release_pending(path);
    }
}
