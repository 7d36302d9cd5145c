//! Display order of individual connections.
//!
//! The order is presentation state only: code generation and simulation use
//! the mapping graph's own bucket order.

use serde::{Deserialize, Serialize};

use crate::graph::MappingGraph;
use crate::types::MappingKey;

/// One row of the connection list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEntry {
    pub connection_id: String,
    pub key: MappingKey,
    pub source_field: String,
    pub target_field: String,
}

/// Persisted list of connection ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionOrder {
    ids: Vec<String>,
}

impl ConnectionOrder {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Align the stored order with the graph and return the ordered rows.
    ///
    /// Known ids keep their position, new mappings are appended in graph
    /// order, and ids without a live mapping are pruned. Returns the rows and
    /// whether the stored order changed.
    pub fn reconcile(&mut self, graph: &MappingGraph) -> (Vec<ConnectionEntry>, bool) {
        let mut live: Vec<ConnectionEntry> = graph
            .list_all()
            .iter()
            .flat_map(|(key, mappings)| {
                mappings.iter().map(move |m| ConnectionEntry {
                    connection_id: m.connection_id(),
                    key: *key,
                    source_field: m.source_field.clone(),
                    target_field: m.target_field.clone(),
                })
            })
            .collect();

        let mut ordered = Vec::with_capacity(live.len());
        for id in &self.ids {
            if let Some(pos) = live.iter().position(|e| &e.connection_id == id) {
                ordered.push(live.remove(pos));
            }
        }
        ordered.extend(live);

        let ids: Vec<String> = ordered.iter().map(|e| e.connection_id.clone()).collect();
        let changed = ids != self.ids;
        self.ids = ids;
        (ordered, changed)
    }

    /// Move a connection to `index` (clamped to the end). Returns false for unknown ids.
    pub fn move_to(&mut self, connection_id: &str, index: usize) -> bool {
        let Some(pos) = self.ids.iter().position(|id| id == connection_id) else {
            return false;
        };
        let id = self.ids.remove(pos);
        let index = index.min(self.ids.len());
        self.ids.insert(index, id);
        true
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
