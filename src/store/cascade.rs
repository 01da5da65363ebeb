//! Delete cascade rules.
//!
//! - Deleting a Component removes every ComponentPosition that references it, unless the
//!   position is data-driven (`pageDataProperty` set), in which case only the position's
//!   `component` reference is cleared.
//! - Deleting a ComponentPosition removes it from every ComponentGroup's position list.

use super::record::{ResourceEvent, ResourceEventKind};
use super::StoreState;
use crate::resource::ResourceType;
use serde_json::Value;

/// Remove `iri` and apply cascades. Returns false if the resource was unknown.
pub(super) fn remove(state: &mut StoreState, iri: &str, events: &mut Vec<ResourceEvent>) -> bool {
    let Some(record) = state.records.remove(iri) else {
        return false;
    };
    events.push(ResourceEvent::new(iri, ResourceEventKind::Deleted));
    state.current_ids.retain(|id| id != iri);
    state.unmap_publishable(iri);

    match record.resource_type {
        Some(ResourceType::Component) => detach_component(state, iri, events),
        Some(ResourceType::ComponentPosition) => detach_position(state, iri, events),
        _ => {}
    }
    true
}

fn detach_component(state: &mut StoreState, component_iri: &str, events: &mut Vec<ResourceEvent>) {
    let referencing: Vec<String> = state
        .records
        .values()
        .filter(|record| record.resource_type == Some(ResourceType::ComponentPosition))
        .filter(|record| {
            record
                .data
                .as_ref()
                .and_then(|data| data.get("component"))
                .and_then(Value::as_str)
                == Some(component_iri)
        })
        .map(|record| record.iri.clone())
        .collect();

    for position_iri in referencing {
        let data_driven = state
            .records
            .get(&position_iri)
            .and_then(|record| record.data.as_ref())
            .and_then(|data| data.get("pageDataProperty"))
            .map_or(false, |value| !value.is_null());

        if data_driven {
            if let Some(data) = state
                .records
                .get_mut(&position_iri)
                .and_then(|record| record.data.as_mut())
                .and_then(Value::as_object_mut)
            {
                data.insert("component".to_string(), Value::Null);
                events.push(ResourceEvent::new(&position_iri, ResourceEventKind::Saved));
            }
        } else {
            remove(state, &position_iri, events);
        }
    }
}

fn detach_position(state: &mut StoreState, position_iri: &str, events: &mut Vec<ResourceEvent>) {
    for record in state.records.values_mut() {
        if record.resource_type != Some(ResourceType::ComponentGroup) {
            continue;
        }
        let Some(Value::Array(positions)) = record
            .data
            .as_mut()
            .and_then(|data| data.get_mut("componentPositions"))
        else {
            continue;
        };
        let before = positions.len();
        positions.retain(|value| value.as_str() != Some(position_iri));
        if positions.len() != before {
            events.push(ResourceEvent::new(&record.iri, ResourceEventKind::Saved));
        }
    }
}
