//! Route resolution: which resource a navigation fetches, and its manifest.

use crate::resource::ResourceType;
use crate::types::Iri;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Route parameter holding an explicit resource IRI
pub const IRI_PARAM: &str = "iri";

const MANIFEST_PREFIX: &str = "/_/routes_manifest/";

/// Current navigation target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteState {
    pub path: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl RouteState {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

/// Resource and manifest to fetch for a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub iri: Iri,
    pub manifest_path: Option<String>,
}

/// Resolve a route to the primary resource fetch.
///
/// An explicit `iri` parameter naming a known resource type is fetched directly and has no
/// manifest; otherwise the route is looked up by path.
pub fn resolve(route: &RouteState) -> RouteTarget {
    if let Some(iri) = route
        .params
        .get(IRI_PARAM)
        .filter(|iri| ResourceType::from_iri(iri).is_some())
    {
        return RouteTarget {
            iri: iri.clone(),
            manifest_path: None,
        };
    }
    RouteTarget {
        iri: format!("{}{}", ResourceType::Route.iri_prefix(), route.path),
        manifest_path: Some(format!("{}{}", MANIFEST_PREFIX, route.path)),
    }
}
