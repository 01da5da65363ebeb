//! Shared identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable string identifier of an API resource (path-like).
pub type Iri = String;

/// Opaque identifier of one fetch chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainToken(u64);

impl ChainToken {
    /// Tokens are allocated by the ledger that owns the chain
    pub const fn new(value: u64) -> Self {
        ChainToken(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChainToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain-{}", self.0)
    }
}
