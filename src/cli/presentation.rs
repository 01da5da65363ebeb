//! Presentation: text and json formatters for fetch results.

use crate::error::EngineError;
use crate::resource::Resource;
use crate::store::{ApiState, ResourceRecord, StoreSummary};
use comfy_table::Table;
use serde_json::json;

fn to_pretty_json(value: &serde_json::Value) -> Result<String, EngineError> {
    serde_json::to_string_pretty(value).map_err(|e| EngineError::Output(e.to_string()))
}

fn status_cell(state: &ApiState) -> String {
    match state {
        ApiState::Error { error, .. } => match error.status {
            Some(status) => status.to_string(),
            None => "-".to_string(),
        },
        _ => String::new(),
    }
}

/// Table of every stored resource, followed by the per-state totals.
pub fn format_fetch_text(root: &str, summary: &StoreSummary, records: &[ResourceRecord]) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["IRI", "Type", "State", "Status"]);
    for record in records {
        let type_str = record
            .resource_type
            .map(|t| t.api_name().to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            record.iri.clone(),
            type_str,
            record.state.label().to_string(),
            status_cell(&record.state),
        ]);
    }
    format!(
        "Route: {}\n{}\n\nTotal: {} resource(s), {} success, {} error, {} pending",
        root, table, summary.total, summary.success, summary.error, summary.pending
    )
}

pub fn format_fetch_json(
    root: &str,
    summary: &StoreSummary,
    records: &[ResourceRecord],
) -> Result<String, EngineError> {
    let resources: Vec<_> = records
        .iter()
        .map(|record| {
            json!({
                "iri": record.iri,
                "type": record.resource_type,
                "state": record.state.label(),
                "data": record.data,
            })
        })
        .collect();
    to_pretty_json(&json!({
        "root": root,
        "summary": summary,
        "resources": resources,
    }))
}

pub fn format_resource_json(resource: Option<&Resource>) -> Result<String, EngineError> {
    match resource {
        Some(resource) => to_pretty_json(&resource.data),
        None => Ok("null".to_string()),
    }
}
