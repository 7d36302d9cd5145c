//! Language-neutral integration plan built from the registry and graph.
//!
//! The plan is everything a dialect needs: one configuration block per
//! configured source, the fetch steps (each source at most once, all before
//! any transfer), and one transfer step per mapping bucket that can run.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::graph::MappingGraph;
use crate::registry::SourceRegistry;
use crate::types::{Source, SourceId};

/// Everything the generated program does, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegrationPlan {
    pub configs: Vec<SourceConfig>,
    pub fetches: Vec<FetchStep>,
    pub transfers: Vec<TransferStep>,
}

/// Connection settings for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub source_id: SourceId,
    pub name: String,
    pub ident: String,
    pub receive: Option<EndpointConfig>,
    pub update: Option<EndpointConfig>,
}

/// URL, method, headers and optional JSON body of one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    pub url: String,
    pub method: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// Pull a source's data once.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchStep {
    pub name: String,
    pub ident: String,
    pub has_body: bool,
}

/// Transform one bucket's worth of fields and push them to the target.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferStep {
    pub source_name: String,
    pub source_ident: String,
    pub target_name: String,
    pub target_ident: String,
    pub assignments: Vec<Assignment>,
    /// False when the target has no update endpoint; the step then reports
    /// a failure for this pair instead of sending.
    pub target_has_update: bool,
}

/// `record[target_field] = get_nested_value(data, source_field)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub target_field: String,
    pub source_field: String,
}

impl IntegrationPlan {
    /// Build the plan for the current state.
    pub fn build(registry: &SourceRegistry, graph: &MappingGraph) -> Self {
        let idents = assign_identifiers(registry.list());
        let ident = |id: SourceId| idents.get(&id).cloned().unwrap_or_default();

        let configs = registry
            .list()
            .iter()
            .filter(|s| !s.is_inert())
            .map(|s| SourceConfig {
                source_id: s.id,
                name: s.name.clone(),
                ident: ident(s.id),
                receive: s.receive_url().map(|url| EndpointConfig {
                    url: url.to_string(),
                    method: s.receive_method.as_str(),
                    headers: s.receive_header_pairs(),
                    body: s.receive_body(),
                }),
                update: s.update_url().map(|url| EndpointConfig {
                    url: url.to_string(),
                    method: s.update_method.as_str(),
                    headers: s.update_header_pairs(),
                    body: None,
                }),
            })
            .collect();

        let mut seen = HashSet::new();
        let fetches = graph
            .list_all()
            .keys()
            .filter_map(|key| registry.get(key.source))
            .filter(|s| s.receive_url().is_some())
            .filter(|s| seen.insert(s.id))
            .map(|s| FetchStep {
                name: s.name.clone(),
                ident: ident(s.id),
                has_body: s.receive_body().is_some(),
            })
            .collect();

        let transfers = graph
            .list_all()
            .iter()
            .filter_map(|(key, mappings)| {
                let source = registry.get(key.source)?;
                let target = registry.get(key.target)?;
                source.receive_url()?;
                Some(TransferStep {
                    source_name: source.name.clone(),
                    source_ident: ident(source.id),
                    target_name: target.name.clone(),
                    target_ident: ident(target.id),
                    assignments: mappings
                        .iter()
                        .map(|m| Assignment {
                            target_field: m.target_field.clone(),
                            source_field: m.source_field.clone(),
                        })
                        .collect(),
                    target_has_update: target.update_url().is_some(),
                })
            })
            .collect();

        Self {
            configs,
            fetches,
            transfers,
        }
    }
}

/// Normalize a source name into an identifier stem.
///
/// Lower-cased, whitespace runs become `_`, other characters that cannot
/// appear in an identifier become `_`, and a leading digit gets an `s_`
/// prefix.
pub fn normalize_identifier(name: &str) -> String {
    let joined = name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_");
    let mut ident: String = joined
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() {
        ident.push_str("source");
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert_str(0, "s_");
    }
    ident
}

/// Suffixes the dialects join to a source identifier with `_` to name that
/// source's variables. Dialect-local names never end in one of these.
pub const VARIABLE_SUFFIXES: [&str; 8] = [
    "url",
    "method",
    "headers",
    "body",
    "data",
    "update_url",
    "update_method",
    "update_headers",
];

/// Every variable name a source with identifier `ident` may emit.
pub fn variable_names(ident: &str) -> impl Iterator<Item = String> + '_ {
    VARIABLE_SUFFIXES.iter().map(move |suffix| format!("{ident}_{suffix}"))
}

/// Give every source a unique identifier.
///
/// Two sources clash when any of their variable names coincide: `crm` and
/// `crm` share all of them, `crm` and `crm_update` share `crm_update_url`.
/// Every clashing source gets its id appended (`crm_3`, `crm_8`), repeated
/// until no variable name is emitted twice.
pub fn assign_identifiers(sources: &[Source]) -> HashMap<SourceId, String> {
    let mut idents: Vec<(SourceId, String)> = sources
        .iter()
        .map(|s| (s.id, normalize_identifier(&s.name)))
        .collect();

    loop {
        let mut owners: HashMap<String, HashSet<SourceId>> = HashMap::new();
        for (id, ident) in &idents {
            for name in variable_names(ident) {
                owners.entry(name).or_default().insert(*id);
            }
        }
        let clashing: HashSet<SourceId> = owners
            .into_values()
            .filter(|ids| ids.len() > 1)
            .flatten()
            .collect();
        if clashing.is_empty() {
            break;
        }
        for (id, ident) in idents.iter_mut() {
            if clashing.contains(id) {
                tracing::debug!("Identifier {ident} is shared; using {ident}_{id}");
                *ident = format!("{ident}_{id}");
            }
        }
    }

    idents.into_iter().collect()
}
