//! In-memory registry of sources, kept in registration order.

use crate::error::{IntegratorError, IntegratorResult};
use crate::types::{Source, SourceId, SourcePatch};

/// Owns every [`Source`] and assigns their ids.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<Source>,
    next_id: SourceId,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            next_id: 1,
        }
    }

    /// Rebuild a registry from a persisted snapshot.
    ///
    /// Later duplicates of an id are dropped so the uniqueness invariant holds
    /// even for hand-edited state.
    pub fn from_sources(sources: Vec<Source>) -> Self {
        let mut registry = Self::new();
        for source in sources {
            if registry.get(source.id).is_some() {
                tracing::warn!("Dropping duplicate source id {} from snapshot", source.id);
                continue;
            }
            registry.next_id = registry.next_id.max(source.id.saturating_add(1));
            registry.sources.push(source);
        }
        registry
    }

    /// Register a new source and return its id.
    ///
    /// Requires a non-blank name and a type. An explicit `id` must not be in
    /// use; without one the next free id is assigned.
    pub fn add(&mut self, id: Option<SourceId>, patch: SourcePatch) -> IntegratorResult<SourceId> {
        let id = match id {
            Some(id) if self.get(id).is_some() => {
                return Err(IntegratorError::Validation(format!(
                    "source id {id} is already in use"
                )));
            }
            Some(id) => id,
            None => self.next_id,
        };

        let source = Source::from_patch(id, patch)?;
        self.next_id = self.next_id.max(id.saturating_add(1));
        self.sources.push(source);
        Ok(id)
    }

    /// Look up a source by id.
    pub fn get(&self, id: SourceId) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// All sources in registration order.
    pub fn list(&self) -> &[Source] {
        &self.sources
    }

    /// Merge `patch` into the source with `id`. Returns false if absent.
    pub fn update(&mut self, id: SourceId, patch: SourcePatch) -> bool {
        match self.sources.iter_mut().find(|s| s.id == id) {
            Some(source) => {
                source.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Remove the source with `id`. Returns false if absent.
    ///
    /// Mappings referencing the id are not touched here; the caller must
    /// cascade into the mapping graph.
    pub fn remove(&mut self, id: SourceId) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.id != id);
        self.sources.len() != before
    }

    /// Remove every source. Ids are not reused afterwards.
    pub fn clear(&mut self) {
        self.sources.clear();
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
