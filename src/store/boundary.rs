//! UI-facing collaborators injected into the store.

use crate::error::ResourceError;
use crate::types::Iri;
use parking_lot::Mutex;
use tracing::error;

/// The "show fatal error" boundary. Only primary root failures reach it.
pub trait ErrorBoundary: Send + Sync {
    fn show_fatal(&self, iri: &str, error: &ResourceError);
}

/// Boundary that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorBoundary;

impl ErrorBoundary for LogErrorBoundary {
    fn show_fatal(&self, iri: &str, error: &ResourceError) {
        error!(iri = %iri, status = ?error.status, message = %error.message, "Primary resource failed");
    }
}

/// Boundary that keeps every surfaced error, for callers that render them later
#[derive(Debug, Default)]
pub struct RecordingErrorBoundary {
    errors: Mutex<Vec<(Iri, ResourceError)>>,
}

impl RecordingErrorBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<(Iri, ResourceError)> {
        self.errors.lock().clone()
    }

    pub fn last(&self) -> Option<(Iri, ResourceError)> {
        self.errors.lock().last().cloned()
    }
}

impl ErrorBoundary for RecordingErrorBoundary {
    fn show_fatal(&self, iri: &str, error: &ResourceError) {
        self.errors.lock().push((iri.to_string(), error.clone()));
    }
}

/// Answers which resources the UI currently displays
pub trait MountedResources: Send + Sync {
    fn mounted_ids(&self) -> Vec<Iri>;
}
