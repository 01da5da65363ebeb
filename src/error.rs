//! Error types for the trellis fetch engine.

use crate::types::{ChainToken, Iri};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store-related errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A caller queried a resource it never registered.
    #[error("Resource not known to the store: {0}")]
    UnknownResource(Iri),
}

/// Fetch-chain ledger errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Fetch chain not found: {0}")]
    UnknownToken(ChainToken),

    #[error("Fetch chain {0} has no resources to wait for")]
    EmptyChain(ChainToken),

    #[error("Fetch chain {0} already has a pending finish")]
    AlreadyFinishing(ChainToken),
}

/// Errors raised by the network primitive
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Per-resource fetch errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The chain lost its current status; the result was discarded.
    #[error("Fetch chain {0} is no longer current")]
    StaleChain(ChainToken),

    #[error("Resource not found ({status}): {message}")]
    NotFound { status: u16, message: String },

    #[error("Server error ({status:?}): {message}")]
    Server { status: Option<u16>, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Status { status, message } if (400..500).contains(&status) => {
                FetchError::NotFound { status, message }
            }
            TransportError::Status { status, message } => FetchError::Server {
                status: Some(status),
                message,
            },
            TransportError::Network(message) => FetchError::Server {
                status: None,
                message,
            },
            TransportError::Decode(message) => FetchError::Malformed(message),
        }
    }
}

impl FetchError {
    /// 4xx outcomes are terminal but do not block graph settlement for non-root members.
    pub fn is_tolerated(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }

    /// Status code reported by the server, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::NotFound { status, .. } => Some(*status),
            FetchError::Server { status, .. } => *status,
            _ => None,
        }
    }

    /// Detail recorded on the resource's error state.
    pub fn to_resource_error(&self) -> ResourceError {
        ResourceError {
            status: self.status(),
            message: self.to_string(),
        }
    }
}

/// Push message errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("Invalid push message: {0}")]
    InvalidMessage(String),
}

/// Error detail stored on a resource in the `Error` API state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceError {
    pub status: Option<u16>,
    pub message: String,
}

impl ResourceError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Client-class errors (4xx) are terminal, non-blocking outcomes.
    pub fn is_client_error(&self) -> bool {
        matches!(self.status, Some(status) if (400..500).contains(&status))
    }
}

impl std::fmt::Display for ResourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Top-level engine errors (construction, configuration, logging)
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Push error: {0}")]
    Push(#[from] PushError),

    #[error("Failed to load {iri}: {error}")]
    RootFailed { iri: Iri, error: ResourceError },

    #[error("Output error: {0}")]
    Output(String),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::ConfigError(err.to_string())
    }
}
