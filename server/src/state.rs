//! Shared application state.

use std::sync::Arc;

use crate::config::Config;
use crate::store::{MemoryStore, Store, StoreResult};

/// State handed to every service function.
#[derive(Clone)]
pub struct AppState {
    /// Repository for all entities
    pub store: Arc<dyn Store>,
    /// Backend configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// State over an empty in-memory store with no backing file.
    #[must_use]
    pub fn in_memory(config: Config) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    /// State over the store described by `config`.
    ///
    /// Opens the snapshot at `snapshot_path` when set.
    pub fn from_config(config: Config) -> StoreResult<Self> {
        let store = match &config.snapshot_path {
            Some(path) => MemoryStore::open(path)?,
            None => MemoryStore::new(),
        };
        Ok(Self::new(Arc::new(store), config))
    }

    /// Flush the store to its backing file, if any.
    ///
    /// Services call this after a mutation has been applied in memory. An
    /// error means the change is live but not yet on disk; the next
    /// successful flush writes it.
    pub fn persist(&self) -> StoreResult<()> {
        self.store
            .flush()
            .inspect_err(|e| tracing::warn!(error = %e, "Snapshot flush failed"))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
