//! Preload hints sent to the API.
//!
//! Each hint is a relation path, `*` standing for every item of a list relation. The server
//! inlines the resources along these paths so the client needs fewer round trips. This
//! table is a wire contract with the server.

use crate::resource::ResourceType;

const POSITIONS_TO_COMPONENT: &str = "/componentPositions/*/component";

const ROUTE_HINTS: &[&str] = &[
    "/page/layout/componentGroups/*/componentPositions/*/component",
    "/page/componentGroups/*/componentPositions/*/component",
    "/pageData/page/layout/componentGroups/*/componentPositions/*/component",
    "/pageData/page/componentGroups/*/componentPositions/*/component",
    "/page/layout/componentGroups/*/componentPositions/*/component/componentGroups/*/componentPositions/*/component",
    "/page/componentGroups/*/componentPositions/*/component/componentGroups/*/componentPositions/*/component",
    "/pageData/page/layout/componentGroups/*/componentPositions/*/component/componentGroups/*/componentPositions/*/component",
    "/pageData/page/componentGroups/*/componentPositions/*/component/componentGroups/*/componentPositions/*/component",
];

const PAGE_HINTS: &[&str] = &[
    "/layout/componentGroups/*/componentPositions/*/component",
    "/componentGroups/*/componentPositions/*/component",
];

const PAGE_DATA_HINTS: &[&str] = &[
    "/page/layout/componentGroups/*/componentPositions/*/component",
    "/page/componentGroups/*/componentPositions/*/component",
];

const LAYOUT_HINTS: &[&str] = &["/componentGroups/*/componentPositions/*/component"];

const COMPONENT_GROUP_HINTS: &[&str] = &[POSITIONS_TO_COMPONENT];

const COMPONENT_POSITION_HINTS: &[&str] = &["/component"];

const COMPONENT_HINTS: &[&str] = &["/componentGroups/*/componentPositions/*/component"];

/// Static hint table by resource type
pub fn hints_for(resource_type: ResourceType) -> &'static [&'static str] {
    match resource_type {
        ResourceType::Route => ROUTE_HINTS,
        ResourceType::Page => PAGE_HINTS,
        ResourceType::PageData => PAGE_DATA_HINTS,
        ResourceType::Layout => LAYOUT_HINTS,
        ResourceType::ComponentGroup => COMPONENT_GROUP_HINTS,
        ResourceType::ComponentPosition => COMPONENT_POSITION_HINTS,
        ResourceType::Component => COMPONENT_HINTS,
    }
}

/// Value of the `preload` header for `iri`, or `None` when there is nothing to preload
pub fn header_for(iri: &str, overrides: Option<&[String]>) -> Option<String> {
    let hints: Vec<&str> = match overrides {
        Some(overrides) => overrides.iter().map(String::as_str).collect(),
        None => ResourceType::from_iri(iri)
            .map(hints_for)
            .unwrap_or_default()
            .to_vec(),
    };
    if hints.is_empty() {
        None
    } else {
        Some(hints.join(","))
    }
}
