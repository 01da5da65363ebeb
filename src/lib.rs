//! Trellis: Resource Fetch Orchestration
//!
//! Fetches hypermedia page/component resource graphs from a content API, keeps them in a
//! single store with per-resource API state, discards results of superseded navigations,
//! and folds server push updates in once the displayed graph has settled.

pub mod chain;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod push;
pub mod resource;
pub mod store;
pub mod transport;
pub mod types;

pub use engine::Engine;
