//! Resource Model
//!
//! Resource types, IRI prefix classification, nested relation lookup and the decoded
//! resource document.

use crate::error::FetchError;
use crate::types::Iri;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Resource type, always derivable from the IRI prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Route,
    Page,
    Layout,
    ComponentGroup,
    ComponentPosition,
    Component,
    PageData,
}

impl ResourceType {
    pub const ALL: [ResourceType; 7] = [
        ResourceType::Route,
        ResourceType::Page,
        ResourceType::Layout,
        ResourceType::ComponentGroup,
        ResourceType::ComponentPosition,
        ResourceType::Component,
        ResourceType::PageData,
    ];

    /// IRI prefix owned by this type
    pub fn iri_prefix(self) -> &'static str {
        match self {
            ResourceType::Route => "/_/routes/",
            ResourceType::Page => "/_/pages/",
            ResourceType::Layout => "/_/layouts/",
            ResourceType::ComponentGroup => "/_/component_groups/",
            ResourceType::ComponentPosition => "/_/component_positions/",
            ResourceType::Component => "/component/",
            ResourceType::PageData => "/page_data/",
        }
    }

    /// Classify an IRI by prefix. Unknown prefixes are never fetched recursively.
    pub fn from_iri(iri: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|resource_type| iri.starts_with(resource_type.iri_prefix()))
    }

    /// Relation properties that reference nested resources
    pub fn nested_properties(self) -> &'static [&'static str] {
        match self {
            ResourceType::Route => &["pageData", "page"],
            ResourceType::Page => &["layout", "componentGroups"],
            ResourceType::PageData => &["page"],
            ResourceType::Layout => &["componentGroups"],
            ResourceType::ComponentGroup => &["componentPositions"],
            ResourceType::ComponentPosition => &["component"],
            ResourceType::Component => &["componentGroups"],
        }
    }

    /// Name used in `@type` by the API
    pub fn api_name(self) -> &'static str {
        match self {
            ResourceType::Route => "Route",
            ResourceType::Page => "Page",
            ResourceType::Layout => "Layout",
            ResourceType::ComponentGroup => "ComponentGroup",
            ResourceType::ComponentPosition => "ComponentPosition",
            ResourceType::Component => "Component",
            ResourceType::PageData => "PageData",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// A decoded API resource document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub iri: Iri,
    pub resource_type: Option<ResourceType>,
    pub data: Value,
}

impl Resource {
    /// Build a resource stored under `iri` from a decoded document.
    ///
    /// The document must be a JSON object carrying a string `@id`.
    pub fn from_document(iri: &str, data: Value) -> Result<Self, FetchError> {
        let id = data
            .as_object()
            .ok_or_else(|| FetchError::Malformed(format!("{iri}: document is not an object")))?
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::Malformed(format!("{iri}: document has no @id")))?;
        if id != iri {
            tracing::debug!(iri = %iri, document_id = %id, "Document @id differs from request IRI");
        }
        Ok(Self {
            iri: iri.to_string(),
            resource_type: ResourceType::from_iri(iri),
            data,
        })
    }

    /// IRIs of nested resources, in relation property order
    pub fn nested_iris(&self) -> Vec<Iri> {
        let Some(resource_type) = self.resource_type else {
            return Vec::new();
        };
        let mut out: Vec<Iri> = Vec::new();
        for property in resource_type.nested_properties() {
            match self.data.get(*property) {
                Some(Value::String(iri)) => out.push(iri.clone()),
                Some(Value::Array(items)) => {
                    out.extend(items.iter().filter_map(Value::as_str).map(str::to_string))
                }
                _ => {}
            }
        }
        out.dedup();
        out
    }

    /// Value of a string property, treating empty strings as absent
    pub fn str_property(&self, name: &str) -> Option<&str> {
        self.data
            .get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Redirect target carried by a route
    pub fn redirect_path(&self) -> Option<&str> {
        if self.resource_type != Some(ResourceType::Route) {
            return None;
        }
        self.str_property("redirectPath")
    }
}
