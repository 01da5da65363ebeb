//! CLI route: single route table and run context. Dispatches to the engine and presentation.

use crate::cli::parse::Commands;
use crate::cli::presentation::{format_fetch_json, format_fetch_text, format_resource_json};
use crate::config::{ConfigLoader, EngineConfig};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::fetcher::{FetchOutcome, FetchResourceEvent, RouteState};
use crate::store::{ApiState, LogErrorBoundary};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;

const MAX_REDIRECTS: usize = 5;

/// Runtime context for CLI execution: loaded config, engine, and the async runtime.
pub struct RunContext {
    engine: Engine,
    runtime: Runtime,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, EngineError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::with_config(config)
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        let runtime = Runtime::new()
            .map_err(|e| EngineError::ConfigError(format!("Failed to create runtime: {}", e)))?;
        let engine = Engine::from_config(config, Arc::new(LogErrorBoundary))?;
        Ok(Self { engine, runtime })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn execute(&self, command: &Commands) -> Result<String, EngineError> {
        match command {
            Commands::Fetch { path, format } => self.handle_fetch(path, format, 0),
            Commands::Resource { iri, shallow } => self.handle_resource(iri, *shallow),
            Commands::Config => self.engine.config().to_toml(),
        }
    }

    fn handle_fetch(&self, path: &str, format: &str, redirects: usize) -> Result<String, EngineError> {
        let route = RouteState::new(path);
        let outcome = self.runtime.block_on(self.engine.fetch_route(&route));
        let root = crate::fetcher::route::resolve(&route).iri;

        if let FetchOutcome::Redirect { to, .. } = &outcome {
            if redirects >= MAX_REDIRECTS {
                return Err(EngineError::Output(format!("Too many redirects at {}", root)));
            }
            info!(from = %root, to = %to, "Following redirect");
            return self.handle_fetch(to, format, redirects + 1);
        }

        let store = self.engine.store();
        if let Some(record) = store.get(&root) {
            if let ApiState::Error { error, .. } = record.state {
                return Err(EngineError::RootFailed { iri: root, error });
            }
        }

        let summary = store.summary();
        let records = store.records();
        match format {
            "json" => format_fetch_json(&root, &summary, &records),
            _ => Ok(format_fetch_text(&root, &summary, &records)),
        }
    }

    fn handle_resource(&self, iri: &str, shallow: bool) -> Result<String, EngineError> {
        let mut event = FetchResourceEvent::new(iri);
        event.shallow = shallow;
        let outcome = self
            .runtime
            .block_on(self.engine.fetcher().fetch_resource(event));
        if outcome.is_missing() {
            if let Some(record) = self.engine.store().get(iri) {
                if let ApiState::Error { error, .. } = record.state {
                    return Err(EngineError::RootFailed {
                        iri: iri.to_string(),
                        error,
                    });
                }
            }
        }
        format_resource_json(outcome.into_resource().as_ref())
    }
}
