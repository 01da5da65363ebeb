//! CLI output: error mapping from engine errors to the CLI surface.

use crate::error::EngineError;

/// Map engine errors to a string for CLI output.
pub fn map_error(e: &EngineError) -> String {
    match e {
        EngineError::RootFailed { iri, error } => match error.status {
            Some(status) => format!("Failed to load {} (HTTP {}): {}", iri, status, error.message),
            None => format!("Failed to load {}: {}", iri, error.message),
        },
        other => other.to_string(),
    }
}
