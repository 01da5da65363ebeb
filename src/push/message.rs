//! Push message decoding.

use crate::error::PushError;
use crate::resource::ResourceType;
use crate::types::Iri;
use serde::Serialize;
use serde_json::Value;

/// A decoded server push. `payload == None` is a tombstone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub resource_id: Iri,
    pub resource_type: Option<String>,
    pub payload: Option<Value>,
}

impl PushMessage {
    pub fn update(resource_id: impl Into<Iri>, payload: Value) -> Self {
        let resource_type = payload
            .get("@type")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            resource_id: resource_id.into(),
            resource_type,
            payload: Some(payload),
        }
    }

    pub fn tombstone(resource_id: impl Into<Iri>) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_type: None,
            payload: None,
        }
    }

    /// Decode `{ "@id": ..., "@type"?: ..., ... }`. An object holding only `@id` is a tombstone.
    pub fn from_json(value: &Value) -> Result<Self, PushError> {
        let object = value
            .as_object()
            .ok_or_else(|| PushError::InvalidMessage("message is not an object".to_string()))?;
        let resource_id = object
            .get("@id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PushError::InvalidMessage("message has no @id".to_string()))?;
        if object.len() == 1 {
            return Ok(Self::tombstone(resource_id));
        }
        Ok(Self::update(resource_id, value.clone()))
    }

    pub fn is_tombstone(&self) -> bool {
        self.payload.is_none()
    }

    /// Whether this is a component position update, which must be re-fetched
    pub fn is_component_position(&self) -> bool {
        if self.is_tombstone() {
            return false;
        }
        match self.resource_type.as_deref() {
            Some(name) => name == ResourceType::ComponentPosition.api_name(),
            None => ResourceType::from_iri(&self.resource_id) == Some(ResourceType::ComponentPosition),
        }
    }
}
