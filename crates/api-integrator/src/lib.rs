//! API Integrator: sources, field-level mappings, and integration code generation.

pub mod codegen;
pub mod error;
pub mod events;
pub mod graph;
pub mod order;
pub mod registry;
pub mod schema;
pub mod simulate;
pub mod storage;
pub mod types;
pub mod workspace;

pub use codegen::{generate, generate_all_in_memory, write_all, GeneratedFile, Language};
pub use error::{IntegratorError, IntegratorResult};
pub use events::{EventBus, WorkspaceEvent};
pub use graph::MappingGraph;
pub use order::{ConnectionEntry, ConnectionOrder};
pub use registry::SourceRegistry;
pub use schema::{extract_fields, get_nested_value, parse_lenient, set_nested_value};
pub use simulate::{simulate, SimulatedUpdate};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StateRepository};
pub use types::*;
pub use workspace::{SourceFields, Workspace};
