//! Change notifications for workspace collaborators.
//!
//! A `tokio::sync::broadcast` channel carrying [`WorkspaceEvent`] values.
//! Renderers, code previews and persistence watchers subscribe independently;
//! with no subscribers events are dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::SourceId;

/// Every change a workspace announces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkspaceEvent {
    /// The source list changed (add, edit, delete, clear).
    SourcesChanged { source_count: usize },
    /// A source was deleted and its mappings cascaded away.
    SourceRemoved {
        source_id: SourceId,
        buckets_removed: usize,
    },
    /// The mapping graph changed.
    MappingsChanged {
        bucket_count: usize,
        mapping_count: usize,
    },
    /// The connection display order changed.
    OrderChanged,
}

/// Broadcast channel for [`WorkspaceEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<WorkspaceEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: WorkspaceEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
