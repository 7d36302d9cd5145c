//! The owning service: registry, graph and display order behind one handle.
//!
//! Every state-changing call persists the collections it touched through the
//! [`StateRepository`] and announces the change on the [`EventBus`].

use std::path::Path;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::codegen::{self, GeneratedFile, Language};
use crate::error::{IntegratorError, IntegratorResult};
use crate::events::{EventBus, WorkspaceEvent};
use crate::graph::MappingGraph;
use crate::order::{ConnectionEntry, ConnectionOrder};
use crate::registry::SourceRegistry;
use crate::schema::extract_fields;
use crate::simulate::{self, SimulatedUpdate};
use crate::storage::{KeyValueStore, StateRepository};
use crate::types::{Field, FieldRef, MappingKey, Source, SourceId, SourcePatch};

/// Connectable fields of one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFields {
    /// Fields of the receive response example (mapping sources).
    pub response: Vec<Field>,
    /// Fields of the update payload example (mapping targets).
    pub update: Vec<Field>,
}

pub struct Workspace {
    registry: SourceRegistry,
    graph: MappingGraph,
    order: ConnectionOrder,
    repo: StateRepository,
    events: EventBus,
}

impl Workspace {
    /// Load state from `store`. Missing or unreadable values start empty.
    pub fn open(store: impl KeyValueStore + 'static) -> IntegratorResult<Self> {
        let repo = StateRepository::new(store);
        let registry = SourceRegistry::from_sources(repo.load_sources()?);
        let graph = MappingGraph::from_buckets(repo.load_mappings()?);
        let order = repo.load_order()?;
        tracing::info!(
            "Workspace loaded: {} sources, {} mappings in {} buckets",
            registry.len(),
            graph.mapping_count(),
            graph.bucket_count()
        );
        Ok(Self {
            registry,
            graph,
            order,
            repo,
            events: EventBus::default(),
        })
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &MappingGraph {
        &self.graph
    }

    pub fn sources(&self) -> &[Source] {
        self.registry.list()
    }

    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.registry.get(id)
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.events.subscribe()
    }

    pub fn add_source(&mut self, id: Option<SourceId>, patch: SourcePatch) -> IntegratorResult<SourceId> {
        let id = self.registry.add(id, patch)?;
        tracing::info!("Added source {id}");
        self.sources_changed()?;
        Ok(id)
    }

    /// Merge `patch` into an existing source.
    ///
    /// A patch may leave the name alone but never blank it.
    pub fn update_source(&mut self, id: SourceId, patch: SourcePatch) -> IntegratorResult<()> {
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            tracing::debug!("Rejected blank name for source {id}");
            return Err(IntegratorError::Validation(
                "source name is required".to_string(),
            ));
        }
        if !self.registry.update(id, patch) {
            return Err(IntegratorError::SourceNotFound(id));
        }
        tracing::info!("Updated source {id}");
        self.sources_changed()
    }

    /// Delete a source and every bucket that references it.
    ///
    /// Returns the number of buckets removed.
    pub fn remove_source(&mut self, id: SourceId) -> IntegratorResult<usize> {
        if !self.registry.remove(id) {
            return Err(IntegratorError::SourceNotFound(id));
        }
        let removed = self.graph.remove_for_source(id);
        tracing::info!("Removed source {id} and {removed} mapping bucket(s)");
        self.sources_changed()?;
        self.events.emit(WorkspaceEvent::SourceRemoved {
            source_id: id,
            buckets_removed: removed,
        });
        if removed > 0 {
            self.mappings_changed()?;
        }
        Ok(removed)
    }

    /// Delete every source, and with them every mapping.
    pub fn clear_sources(&mut self) -> IntegratorResult<()> {
        self.registry.clear();
        self.graph.clear();
        tracing::info!("Cleared all sources");
        self.sources_changed()?;
        self.mappings_changed()
    }

    /// Connect two fields. `Ok(false)` for self-mappings and duplicates.
    pub fn create_mapping(&mut self, source: &FieldRef, target: &FieldRef) -> IntegratorResult<bool> {
        for id in [source.id, target.id] {
            if !self.registry.contains(id) {
                return Err(IntegratorError::SourceNotFound(id));
            }
        }
        if !self.graph.create_mapping(source, target) {
            return Ok(false);
        }
        self.mappings_changed()?;
        Ok(true)
    }

    pub fn remove_mapping(
        &mut self,
        key: &MappingKey,
        source_field: &str,
        target_field: &str,
    ) -> IntegratorResult<bool> {
        if !self.graph.remove_mapping(key, source_field, target_field) {
            return Ok(false);
        }
        self.mappings_changed()?;
        Ok(true)
    }

    pub fn clear_mappings(&mut self) -> IntegratorResult<()> {
        self.graph.clear();
        tracing::info!("Cleared all mappings");
        self.mappings_changed()
    }

    /// Fields re-extracted from the source's current examples.
    pub fn source_fields(&self, id: SourceId) -> IntegratorResult<SourceFields> {
        let source = self
            .registry
            .get(id)
            .ok_or(IntegratorError::SourceNotFound(id))?;
        Ok(SourceFields {
            response: extract_fields(source.receive_response_example.as_deref().unwrap_or_default()),
            update: extract_fields(source.update_payload.as_deref().unwrap_or_default()),
        })
    }

    /// Connections in display order. Persists the order if it had to change.
    pub fn connections(&mut self) -> IntegratorResult<Vec<ConnectionEntry>> {
        let (entries, changed) = self.order.reconcile(&self.graph);
        if changed {
            self.repo.save_order(&self.order)?;
        }
        Ok(entries)
    }

    /// Move one connection in the display order. `Ok(false)` for unknown ids.
    pub fn move_connection(&mut self, connection_id: &str, index: usize) -> IntegratorResult<bool> {
        self.order.reconcile(&self.graph);
        if !self.order.move_to(connection_id, index) {
            return Ok(false);
        }
        self.repo.save_order(&self.order)?;
        self.events.emit(WorkspaceEvent::OrderChanged);
        Ok(true)
    }

    pub fn generate(&self, language: Language) -> IntegratorResult<String> {
        codegen::generate(&self.registry, &self.graph, language)
    }

    pub fn generate_all(&self) -> IntegratorResult<Vec<GeneratedFile>> {
        codegen::generate_all_in_memory(&self.registry, &self.graph)
    }

    pub fn write_all(&self, output_dir: &Path) -> IntegratorResult<Vec<GeneratedFile>> {
        codegen::write_all(&self.registry, &self.graph, output_dir)
    }

    pub fn simulate(&self) -> IntegratorResult<Vec<SimulatedUpdate>> {
        simulate::simulate(&self.registry, &self.graph)
    }

    fn sources_changed(&mut self) -> IntegratorResult<()> {
        self.repo.save_sources(self.registry.list())?;
        self.events.emit(WorkspaceEvent::SourcesChanged {
            source_count: self.registry.len(),
        });
        Ok(())
    }

    fn mappings_changed(&mut self) -> IntegratorResult<()> {
        self.repo.save_mappings(self.graph.list_all())?;
        self.events.emit(WorkspaceEvent::MappingsChanged {
            bucket_count: self.graph.bucket_count(),
            mapping_count: self.graph.mapping_count(),
        });
        let (_, changed) = self.order.reconcile(&self.graph);
        if changed {
            self.repo.save_order(&self.order)?;
            self.events.emit(WorkspaceEvent::OrderChanged);
        }
        Ok(())
    }
}
