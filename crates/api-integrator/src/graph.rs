//! The mapping graph: field-level connections grouped into buckets.
//!
//! Buckets are keyed by `(source id, target id)` and kept in insertion order;
//! mappings inside a bucket keep creation order. Both orders feed code
//! generation and simulation, so removals never reshuffle what remains.

use indexmap::IndexMap;

use crate::types::{connection_id, FieldRef, Mapping, MappingKey, SourceId};

/// Ordered buckets of mappings.
pub type Buckets = IndexMap<MappingKey, Vec<Mapping>>;

/// Owns every [`Mapping`]. Source ids are held by value only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingGraph {
    buckets: Buckets,
}

impl MappingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from a persisted snapshot, dropping entries that break
    /// the graph's invariants (self-mappings, duplicates, misfiled mappings).
    pub fn from_buckets(buckets: Buckets) -> Self {
        let mut graph = Self::new();
        for (key, mappings) in buckets {
            for mapping in mappings {
                if mapping.key() != key {
                    tracing::warn!(
                        "Dropping mapping {} filed under bucket {key}",
                        mapping.connection_id()
                    );
                    continue;
                }
                graph.insert(mapping);
            }
        }
        graph
    }

    /// Connect a response field of one source to an update field of another.
    ///
    /// Returns `true` if a new mapping was stored. Self-mappings and exact
    /// duplicates are rejected without mutation.
    pub fn create_mapping(&mut self, source: &FieldRef, target: &FieldRef) -> bool {
        self.insert(Mapping {
            source_id: source.id,
            source_field: source.field.clone(),
            source_type: source.field_type,
            target_id: target.id,
            target_field: target.field.clone(),
            target_type: target.field_type,
        })
    }

    fn insert(&mut self, mapping: Mapping) -> bool {
        if mapping.source_id == mapping.target_id {
            tracing::debug!(
                "Rejected self-mapping on source {}: {} -> {}",
                mapping.source_id,
                mapping.source_field,
                mapping.target_field
            );
            return false;
        }

        let bucket = self.buckets.entry(mapping.key()).or_default();
        let exists = bucket.iter().any(|m| {
            m.source_field == mapping.source_field && m.target_field == mapping.target_field
        });
        if exists {
            tracing::debug!("Mapping already exists: {}", mapping.connection_id());
            return false;
        }

        tracing::debug!("Created mapping {}", mapping.connection_id());
        bucket.push(mapping);
        true
    }

    /// Remove one mapping. Empty buckets are dropped. Returns whether anything changed.
    pub fn remove_mapping(&mut self, key: &MappingKey, source_field: &str, target_field: &str) -> bool {
        let Some(bucket) = self.buckets.get_mut(key) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|m| !(m.source_field == source_field && m.target_field == target_field));
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            self.buckets.shift_remove(key);
        }
        removed
    }

    /// All buckets in insertion order.
    pub fn list_all(&self) -> &Buckets {
        &self.buckets
    }

    /// One bucket, if present.
    pub fn bucket(&self, key: &MappingKey) -> Option<&[Mapping]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    /// Drop every bucket whose source or target is `id`. Returns the number removed.
    pub fn remove_for_source(&mut self, id: SourceId) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|key, _| !key.involves(id));
        before - self.buckets.len()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn mapping_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Iterate every mapping, bucket by bucket.
    pub fn mappings(&self) -> impl Iterator<Item = &Mapping> {
        self.buckets.values().flatten()
    }

    /// Connection ids of every mapping, in graph order.
    pub fn connection_ids(&self) -> Vec<String> {
        self.buckets
            .iter()
            .flat_map(|(key, mappings)| {
                mappings
                    .iter()
                    .map(move |m| connection_id(key, &m.source_field, &m.target_field))
            })
            .collect()
    }
}
