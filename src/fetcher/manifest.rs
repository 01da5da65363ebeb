//! Route manifest fetch.
//!
//! The manifest lists every resource a route needs. It is fetched alongside the route
//! itself; its resources join the same chain, and the chain does not settle until the
//! manifest has either a resource list or an error.

use super::{FetchBatchEvent, Fetcher};
use crate::error::{ChainError, FetchError};
use crate::transport::{ApiRequest, PATH_HEADER};
use crate::types::{ChainToken, Iri};
use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    resource_iris: Vec<Iri>,
}

fn parse_manifest(path: &str, document: Value) -> Result<Vec<Iri>, FetchError> {
    serde_json::from_value::<ManifestDocument>(document)
        .map(|manifest| manifest.resource_iris)
        .map_err(|e| FetchError::Malformed(format!("{path}: {e}")))
}

impl Fetcher {
    pub(super) fn spawn_manifest(&self, manifest_path: String, token: ChainToken) -> JoinHandle<()> {
        let fetcher = self.clone();
        tokio::spawn(async move {
            // Failures are already recorded on the chain.
            let _ = fetcher.fetch_manifest(&manifest_path, token).await;
        })
    }

    /// Fetch a route manifest and load its resources into the chain.
    pub async fn fetch_manifest(
        &self,
        manifest_path: &str,
        token: ChainToken,
    ) -> Result<Vec<Iri>, FetchError> {
        let mut request = ApiRequest::new(manifest_path);
        if let Some(chain) = self.ledger.chain(token) {
            request = request.with_header(PATH_HEADER, chain.path);
        }

        let result = self
            .transport
            .fetch(request)
            .await
            .map_err(FetchError::from)
            .and_then(|document| parse_manifest(manifest_path, document));

        match result {
            Ok(resources) => {
                debug!(manifest = %manifest_path, count = resources.len(), "Manifest fetched");
                if !resources.is_empty() && self.ledger.is_current(token) {
                    self.fetch_batch(FetchBatchEvent {
                        paths: resources.clone(),
                        token: Some(token),
                        ..FetchBatchEvent::default()
                    })
                    .await;
                }
                self.record_manifest(
                    token,
                    self.ledger.set_manifest_resources(token, resources.clone()),
                );
                Ok(resources)
            }
            Err(error) => {
                warn!(manifest = %manifest_path, error = %error, "Manifest fetch failed");
                self.record_manifest(
                    token,
                    self.ledger.set_manifest_error(token, error.to_string()),
                );
                Err(error)
            }
        }
    }

    fn record_manifest(&self, token: ChainToken, result: Result<(), ChainError>) {
        if let Err(err) = result {
            trace!(token = %token, error = %err, "Manifest result dropped");
        }
    }
}
