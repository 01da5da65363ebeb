//! Chain quiescence wait.
//!
//! A chain is quiescent when it is not aborted, none of its members is pending in the
//! store, and its manifest (if any) has either a resource list or an error. The predicate
//! is re-evaluated whenever the store revision or the ledger changes.

use super::ChainLedger;
use crate::error::{ChainError, StoreError};
use crate::types::ChainToken;
use tracing::{debug, error};

/// How a quiescence wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quiescence {
    /// Every member settled
    Settled,
    /// The chain was aborted while waiting
    Aborted,
    /// The primary chain lost the current slot while waiting
    Superseded,
    /// The chain was reaped while waiting
    Gone,
}

impl ChainLedger {
    /// Wait until the chain settles. Only one wait may be outstanding per token.
    pub async fn wait_for_quiescence(&self, token: ChainToken) -> Result<Quiescence, ChainError> {
        {
            let mut state = self.state.lock();
            let chain = state
                .chains
                .get_mut(&token)
                .ok_or(ChainError::UnknownToken(token))?;
            if chain.finishing {
                return Err(ChainError::AlreadyFinishing(token));
            }
            if chain.resources.is_empty() && !chain.abort {
                return Err(ChainError::EmptyChain(token));
            }
            chain.finishing = true;
        }
        let _finishing = FinishingGuard {
            ledger: self,
            token,
        };

        // Subscribe before the first check so no change is missed in between.
        let mut store_changes = self.store.watch_revision();
        let mut ledger_changes = self.watch_changes();

        let outcome = loop {
            if let Some(outcome) = self.check_quiescence(token) {
                break outcome;
            }
            let closed = tokio::select! {
                changed = store_changes.changed() => changed.is_err(),
                changed = ledger_changes.changed() => changed.is_err(),
            };
            if closed {
                break Quiescence::Gone;
            }
        };

        debug!(token = %token, outcome = ?outcome, "Fetch chain quiescent");
        Ok(outcome)
    }

    /// Evaluate the quiescence predicate once. `None` means keep waiting.
    pub fn check_quiescence(&self, token: ChainToken) -> Option<Quiescence> {
        let state = self.state.lock();
        let Some(chain) = state.chains.get(&token) else {
            return Some(Quiescence::Gone);
        };
        if chain.abort {
            return Some(Quiescence::Aborted);
        }
        if chain.is_primary
            && state.fetching_token != Some(token)
            && state.success_token != Some(token)
        {
            return Some(Quiescence::Superseded);
        }
        if !chain.manifest.as_ref().map_or(true, |manifest| manifest.is_settled()) {
            return None;
        }
        match self.store.is_any_pending(&chain.resources) {
            Ok(true) => None,
            Ok(false) => Some(Quiescence::Settled),
            Err(StoreError::UnknownResource(iri)) => {
                // Members are registered with the store before any await; an unknown
                // member would otherwise block this chain forever.
                error!(token = %token, iri = %iri, "Chain member missing from store");
                Some(Quiescence::Settled)
            }
        }
    }
}

/// Clears the chain's finishing flag when a wait completes or is dropped.
struct FinishingGuard<'a> {
    ledger: &'a ChainLedger,
    token: ChainToken,
}

impl Drop for FinishingGuard<'_> {
    fn drop(&mut self) {
        if let Some(chain) = self.ledger.state.lock().chains.get_mut(&self.token) {
            chain.finishing = false;
        }
    }
}
