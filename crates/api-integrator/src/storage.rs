//! Durable state: a key-value store interface and the repository on top of it.
//!
//! Three independently persisted values:
//!
//! | key | value |
//! |---|---|
//! | `api_integrator_sources` | JSON array of sources |
//! | `api_integrator_mappings` | JSON object `"id->id"` → array of mappings |
//! | `api_integrator_connections_order` | JSON array of connection ids |

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{IntegratorError, IntegratorResult};
use crate::graph::Buckets;
use crate::order::ConnectionOrder;
use crate::types::Source;

pub const SOURCES_KEY: &str = "api_integrator_sources";
pub const MAPPINGS_KEY: &str = "api_integrator_mappings";
pub const ORDER_KEY: &str = "api_integrator_connections_order";

/// Minimal string key-value persistence.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> IntegratorResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> IntegratorResult<()>;
}

/// Volatile store. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> IntegratorResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| IntegratorError::Storage("memory store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> IntegratorResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| IntegratorError::Storage("memory store lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Directory-backed store: one `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a state directory.
    pub fn open(dir: impl Into<PathBuf>) -> IntegratorResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            IntegratorError::Storage(format!(
                "Failed to create state directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> IntegratorResult<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(IntegratorError::Storage(format!("Invalid store key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> IntegratorResult<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> IntegratorResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        tracing::debug!("Saved {}", path.display());
        Ok(())
    }
}

/// Typed access to the persisted collections.
///
/// Stored values that fail to parse are logged and read as empty, matching
/// how every other malformed JSON input is treated.
pub struct StateRepository {
    store: Box<dyn KeyValueStore>,
}

impl StateRepository {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub fn load_sources(&self) -> IntegratorResult<Vec<Source>> {
        self.load_or_default(SOURCES_KEY)
    }

    pub fn save_sources(&mut self, sources: &[Source]) -> IntegratorResult<()> {
        self.save(SOURCES_KEY, sources)
    }

    pub fn load_mappings(&self) -> IntegratorResult<Buckets> {
        self.load_or_default(MAPPINGS_KEY)
    }

    pub fn save_mappings(&mut self, buckets: &Buckets) -> IntegratorResult<()> {
        self.save(MAPPINGS_KEY, buckets)
    }

    pub fn load_order(&self) -> IntegratorResult<ConnectionOrder> {
        self.load_or_default(ORDER_KEY)
    }

    pub fn save_order(&mut self, order: &ConnectionOrder) -> IntegratorResult<()> {
        self.save(ORDER_KEY, order)
    }

    fn load_or_default<T>(&self, key: &str) -> IntegratorResult<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        let Some(text) = self.store.get(key)? else {
            return Ok(T::default());
        };
        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!("Error parsing stored {key}, starting empty: {e}");
                Ok(T::default())
            }
        }
    }

    fn save<T: serde::Serialize + ?Sized>(&mut self, key: &str, value: &T) -> IntegratorResult<()> {
        let text = serde_json::to_string(value)?;
        self.store.set(key, &text)
    }
}
