//! Offline dry run of the mapping graph against stored example responses.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::codegen::ensure_generatable;
use crate::error::IntegratorResult;
use crate::graph::MappingGraph;
use crate::registry::SourceRegistry;
use crate::schema::{get_nested_value, set_nested_value};

pub const NO_UPDATE_ENDPOINT: &str = "No update endpoint configured";

/// What one bucket would send.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedUpdate {
    pub source_name: String,
    pub target_name: String,
    pub method: String,
    pub url: String,
    pub payload: Value,
    pub message: String,
}

/// Build the update payload each bucket would send, using each source's
/// response example as the fetched data.
///
/// Buckets whose source or target no longer exists are skipped. A missing or
/// malformed example reads as `{}`, so its mappings copy nothing.
pub fn simulate(registry: &SourceRegistry, graph: &MappingGraph) -> IntegratorResult<Vec<SimulatedUpdate>> {
    ensure_generatable(registry, graph)?;

    let mut results = Vec::new();
    for (key, mappings) in graph.list_all() {
        let (Some(source), Some(target)) = (registry.get(key.source), registry.get(key.target)) else {
            tracing::debug!("Skipping bucket {key}: source missing");
            continue;
        };

        let sample = source.response_sample();
        let mut payload = Map::new();
        for mapping in mappings {
            if let Some(value) = get_nested_value(&sample, &mapping.source_field) {
                set_nested_value(&mut payload, &mapping.target_field, value.clone());
            }
        }

        results.push(SimulatedUpdate {
            source_name: source.name.clone(),
            target_name: target.name.clone(),
            method: target.update_method.as_str().to_string(),
            url: target
                .update_url()
                .map(str::to_string)
                .unwrap_or_else(|| NO_UPDATE_ENDPOINT.to_string()),
            payload: Value::Object(payload),
            message: format!("Mapped {} field(s)", mappings.len()),
        });
    }
    Ok(results)
}
