//! Fetch-Chain Ledger
//!
//! Owns every in-flight fetch chain. Decides whether a request continues an existing
//! chain, short-circuits on the last successful primary chain, or starts a new one.
//! Holds the single current-primary slot (`fetching_token`) and the remembered
//! last-successful primary chain (`success_token`).
//!
//! Cancellation is cooperative: a chain that is aborted, or a primary chain that lost the
//! current slot, is no longer current and every write path re-checks currency through
//! [`ChainLedger::commit`] before touching the store.

pub mod quiescence;
pub mod record;

pub use quiescence::Quiescence;
pub use record::{ChainSnapshot, FetchChain, ManifestRecord};

use crate::error::ChainError;
use crate::store::ResourceStore;
use crate::types::{ChainToken, Iri};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Default age after which unrelated chains are aborted on a cache hit
pub const DEFAULT_STALE_CHAIN_AFTER: Duration = Duration::from_secs(1);

/// Request to open or continue a chain
#[derive(Debug, Clone, Default)]
pub struct StartChain {
    pub path: String,
    pub token: Option<ChainToken>,
    pub is_primary: bool,
    pub manifest_path: Option<String>,
}

/// Result of [`ChainLedger::start`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStart {
    /// A new chain was opened
    Created { token: ChainToken },
    /// The caller continues an existing chain
    Continue {
        token: ChainToken,
        resources: Vec<Iri>,
        abort: bool,
    },
    /// The last successful primary chain already covers this path; nothing to fetch
    Resolved { token: ChainToken },
}

impl ChainStart {
    pub fn token(&self) -> ChainToken {
        match self {
            ChainStart::Created { token }
            | ChainStart::Continue { token, .. }
            | ChainStart::Resolved { token } => *token,
        }
    }

    /// Whether the caller should go on to issue network calls
    pub fn should_continue(&self) -> bool {
        match self {
            ChainStart::Created { .. } => true,
            ChainStart::Continue { abort, .. } => !abort,
            ChainStart::Resolved { .. } => false,
        }
    }
}

/// Result of [`ChainLedger::finish`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    /// Non-primary chain removed
    Discarded,
    /// Current primary chain became the remembered successful chain
    Promoted { members: Vec<Iri> },
    /// Primary chain that lost the current slot, removed without promotion
    Superseded,
    /// Aborted chain removed without promotion
    Aborted,
    /// Already the remembered successful chain; kept
    Retained,
    /// Token was not known (already reaped)
    Unknown,
}

#[derive(Debug, Default)]
struct LedgerState {
    chains: HashMap<ChainToken, FetchChain>,
    fetching_token: Option<ChainToken>,
    success_token: Option<ChainToken>,
    /// Last token handed out by this ledger
    last_token: u64,
}

impl LedgerState {
    fn allocate_token(&mut self) -> ChainToken {
        self.last_token += 1;
        ChainToken::new(self.last_token)
    }

    fn is_current(&self, token: ChainToken) -> bool {
        match self.chains.get(&token) {
            None => false,
            Some(chain) if chain.abort => false,
            Some(chain) if !chain.is_primary => true,
            Some(_) => self.fetching_token == Some(token),
        }
    }
}

/// Ledger of fetch chains
pub struct ChainLedger {
    state: Mutex<LedgerState>,
    store: Arc<ResourceStore>,
    changes: watch::Sender<u64>,
    stale_after: Duration,
}

impl ChainLedger {
    pub fn new(store: Arc<ResourceStore>) -> Self {
        Self::with_stale_after(store, DEFAULT_STALE_CHAIN_AFTER)
    }

    pub fn with_stale_after(store: Arc<ResourceStore>, stale_after: Duration) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: Mutex::new(LedgerState::default()),
            store,
            changes,
            stale_after,
        }
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    /// Open a chain, continue one, or short-circuit on a resolved primary chain.
    pub fn start(&self, request: StartChain) -> Result<ChainStart, ChainError> {
        let mut state = self.state.lock();

        if let Some(token) = request.token {
            let chain = state
                .chains
                .get(&token)
                .ok_or(ChainError::UnknownToken(token))?;
            return Ok(ChainStart::Continue {
                token,
                resources: chain.resources.clone(),
                abort: chain.abort,
            });
        }

        if request.is_primary {
            if let Some(success_token) = state.success_token {
                let cached = state.chains.get(&success_token).map_or(false, |chain| {
                    chain.path == request.path
                        && !chain.abort
                        && self.store.is_graph_resolved(&chain.path, &chain.resources)
                });
                if cached {
                    let stale_after = self.stale_after;
                    let mut aborted = 0usize;
                    for chain in state.chains.values_mut() {
                        if chain.token != success_token
                            && !chain.abort
                            && chain.created_at.elapsed() > stale_after
                        {
                            chain.abort = true;
                            aborted += 1;
                        }
                    }
                    drop(state);
                    debug!(
                        token = %success_token,
                        path = %request.path,
                        aborted,
                        "Primary fetch resolved from last successful chain"
                    );
                    self.notify();
                    return Ok(ChainStart::Resolved {
                        token: success_token,
                    });
                }
            }
        }

        let token = state.allocate_token();
        let chain = FetchChain::new(token, &request.path, request.is_primary, request.manifest_path);
        state.chains.insert(token, chain);
        let superseded = if request.is_primary {
            state.fetching_token.replace(token)
        } else {
            None
        };
        drop(state);

        debug!(
            token = %token,
            path = %request.path,
            is_primary = request.is_primary,
            superseded = ?superseded,
            "Fetch chain started"
        );
        self.notify();
        Ok(ChainStart::Created { token })
    }

    /// Register `iri` on the chain. False means the caller must not fetch it.
    pub fn add_resource(&self, token: ChainToken, iri: &str) -> bool {
        let mut state = self.state.lock();
        let fetching_token = state.fetching_token;
        let Some(chain) = state.chains.get_mut(&token) else {
            trace!(token = %token, iri = %iri, "Resource not added, chain unknown");
            return false;
        };
        if chain.abort || chain.has_resource(iri) {
            return false;
        }
        if chain.is_primary && fetching_token != Some(token) {
            trace!(token = %token, iri = %iri, "Resource not added, primary chain superseded");
            return false;
        }
        chain.resources.push(iri.to_string());
        drop(state);
        self.notify();
        true
    }

    /// Complete a chain and reap it unless it becomes the remembered successful chain.
    pub fn finish(&self, token: ChainToken) -> FinishOutcome {
        let mut state = self.state.lock();
        let Some(chain) = state.chains.get(&token) else {
            return FinishOutcome::Unknown;
        };
        let is_primary = chain.is_primary;
        let aborted = chain.abort;

        let outcome = if !is_primary {
            state.chains.remove(&token);
            FinishOutcome::Discarded
        } else if aborted {
            if state.fetching_token == Some(token) {
                state.fetching_token = None;
            }
            if state.success_token == Some(token) {
                FinishOutcome::Retained
            } else {
                state.chains.remove(&token);
                FinishOutcome::Aborted
            }
        } else if state.fetching_token == Some(token) {
            state.fetching_token = None;
            if let Some(previous) = state.success_token.replace(token) {
                if previous != token {
                    state.chains.remove(&previous);
                }
            }
            let members = match state.chains.get_mut(&token) {
                Some(chain) => {
                    chain.finishing = false;
                    chain.resources.clone()
                }
                None => Vec::new(),
            };
            FinishOutcome::Promoted { members }
        } else if state.success_token == Some(token) {
            FinishOutcome::Retained
        } else {
            state.chains.remove(&token);
            FinishOutcome::Superseded
        };
        drop(state);

        debug!(token = %token, outcome = ?outcome, "Fetch chain finished");
        self.notify();
        outcome
    }

    /// Whether results fetched under `token` may still be written.
    pub fn is_current(&self, token: ChainToken) -> bool {
        self.state.lock().is_current(token)
    }

    /// Run `write` against the store only if `token` is current.
    ///
    /// The currency check and the write happen under the ledger lock, so a chain that is
    /// superseded concurrently can never land a write afterwards.
    pub fn commit<R>(&self, token: ChainToken, write: impl FnOnce(&ResourceStore) -> R) -> Option<R> {
        let state = self.state.lock();
        if !state.is_current(token) {
            trace!(token = %token, "Write discarded, chain is no longer current");
            return None;
        }
        let result = write(&self.store);
        drop(state);
        Some(result)
    }

    /// Mark a chain aborted; its pending writes are discarded from now on.
    pub fn abort(&self, token: ChainToken) -> bool {
        let mut state = self.state.lock();
        let Some(chain) = state.chains.get_mut(&token) else {
            return false;
        };
        chain.abort = true;
        drop(state);
        debug!(token = %token, "Fetch chain aborted");
        self.notify();
        true
    }

    pub fn set_manifest_resources(
        &self,
        token: ChainToken,
        resources: Vec<Iri>,
    ) -> Result<(), ChainError> {
        self.update_manifest(token, |manifest| manifest.resources = Some(resources))
    }

    pub fn set_manifest_error(&self, token: ChainToken, error: String) -> Result<(), ChainError> {
        self.update_manifest(token, |manifest| manifest.error = Some(error))
    }

    fn update_manifest(
        &self,
        token: ChainToken,
        update: impl FnOnce(&mut ManifestRecord),
    ) -> Result<(), ChainError> {
        let mut state = self.state.lock();
        let chain = state
            .chains
            .get_mut(&token)
            .ok_or(ChainError::UnknownToken(token))?;
        let manifest = chain
            .manifest
            .get_or_insert_with(|| ManifestRecord::new(String::new()));
        update(manifest);
        drop(state);
        self.notify();
        Ok(())
    }

    /// Root path of the current primary chain, else of the last successful one
    pub fn primary_path(&self) -> Option<String> {
        let state = self.state.lock();
        state
            .fetching_token
            .or(state.success_token)
            .and_then(|token| state.chains.get(&token))
            .map(|chain| chain.path.clone())
    }

    pub fn chain(&self, token: ChainToken) -> Option<ChainSnapshot> {
        self.state.lock().chains.get(&token).map(FetchChain::snapshot)
    }

    pub fn contains(&self, token: ChainToken) -> bool {
        self.state.lock().chains.contains_key(&token)
    }

    pub fn tokens(&self) -> Vec<ChainToken> {
        let mut tokens: Vec<ChainToken> = self.state.lock().chains.keys().copied().collect();
        tokens.sort();
        tokens
    }

    pub fn fetching_token(&self) -> Option<ChainToken> {
        self.state.lock().fetching_token
    }

    pub fn success_token(&self) -> Option<ChainToken> {
        self.state.lock().success_token
    }

    /// Ledger change feed, bumped on every chain mutation
    pub(crate) fn watch_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn notify(&self) {
        self.changes.send_modify(|revision| *revision += 1);
    }
}
