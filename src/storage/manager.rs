//! Named storage registry.
//!
//! A [`StorageManager`] owns the configuration blocks read at startup and
//! resolves a logical name to its backend instance. The first resolution of
//! a name constructs the instance (without connecting it); every later one
//! returns the cached `Arc`. Instances are never evicted.
//!
//! Each name has its own cell, so constructing one store never holds up
//! resolving another, and a factory may itself resolve other names.


use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::{StorageConfig, StoreBlock};
use crate::error::{StorageError, StorageResult};
use crate::storage::factory::{BackendFactory, builtin_factories};
use crate::storage::traits::Store;

/// Per-name cell; `None` until a construction succeeds.
type Slot = Arc<Mutex<Option<Arc<dyn Store>>>>;

/// Registry of named storage backends.
pub struct StorageManager {
    /// Default name and configuration blocks.
    config: StorageConfig,
    /// Backend constructors by lower-cased type name.
    factories: HashMap<String, BackendFactory>,
    /// Constructed instances by logical name.
    instances: DashMap<String, Slot>,
}

impl StorageManager {
    /// Create a manager with the built-in backends.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self::builder(config).build()
    }

    /// Start building a manager, to register extra backends.
    #[must_use]
    pub fn builder(config: StorageConfig) -> StorageManagerBuilder {
        StorageManagerBuilder {
            config,
            factories: builtin_factories(),
        }
    }

    /// Resolve a logical name, or the default name when `name` is `None`.
    ///
    /// The name's cell stays locked while the backend is constructed, so
    /// concurrent first resolutions of one name produce a single instance.
    /// Construction never opens a connection.
    ///
    /// A factory that resolves its own name through the manager deadlocks.
    ///
    /// # Errors
    ///
    /// - `Config` if no block exists for the name
    /// - `UnknownBackend` if the block's type has no registered factory
    /// - whatever the factory returns (`InvalidConfig`, `MissingDependency`)
    pub fn get(&self, name: Option<&str>) -> StorageResult<Arc<dyn Store>> {
        let name = name.unwrap_or(self.config.default.as_str());
        let block = self
            .block(name)
            .ok_or_else(|| StorageError::Config(name.to_string()))?;

        let slot = self.slot(name);
        let mut cell = slot.lock();
        if let Some(store) = cell.as_ref() {
            debug!(name, "Storage instance cache hit");
            return Ok(Arc::clone(store));
        }

        let factory = self
            .factories
            .get(&block.kind.to_ascii_lowercase())
            .ok_or_else(|| StorageError::UnknownBackend {
                name: name.to_string(),
                kind: block.kind.clone(),
            })?;

        let store = factory(block)?;
        counter!("storage_instances_constructed_total", "backend" => store.backend_name())
            .increment(1);
        info!(name, backend = store.backend_name(), "Storage instance constructed");

        *cell = Some(Arc::clone(&store));
        Ok(store)
    }

    fn slot(&self, name: &str) -> Slot {
        let existing = self.instances.get(name).map(|slot| Arc::clone(slot.value()));
        existing.unwrap_or_else(|| {
            Arc::clone(self.instances.entry(name.to_string()).or_default().value())
        })
    }

    /// Resolve the default name.
    ///
    /// # Errors
    ///
    /// Same as [`StorageManager::get`].
    pub fn default_store(&self) -> StorageResult<Arc<dyn Store>> {
        self.get(None)
    }

    /// The designated default name.
    #[must_use]
    pub fn default_name(&self) -> &str {
        &self.config.default
    }

    /// The configuration block for `name`.
    #[must_use]
    pub fn block(&self, name: &str) -> Option<&StoreBlock> {
        self.config.stores.get(name)
    }

    /// Configured logical names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.config.stores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether `name` has already been resolved.
    #[must_use]
    pub fn is_resolved(&self, name: &str) -> bool {
        self.instances
            .get(name)
            .map(|slot| Arc::clone(slot.value()))
            .is_some_and(|slot| slot.lock().is_some())
    }
}

/// Builder for [`StorageManager`].
pub struct StorageManagerBuilder {
    config: StorageConfig,
    factories: HashMap<String, BackendFactory>,
}

impl StorageManagerBuilder {
    /// Register a factory for a backend type, replacing any existing one.
    ///
    /// Type names are matched case-insensitively.
    #[must_use]
    pub fn register_backend<F>(mut self, kind: &str, factory: F) -> Self
    where
        F: Fn(&StoreBlock) -> StorageResult<Arc<dyn Store>> + Send + Sync + 'static,
    {
        self.factories
            .insert(kind.to_ascii_lowercase(), Arc::new(factory));
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> StorageManager {
        StorageManager {
            config: self.config,
            factories: self.factories,
            instances: DashMap::new(),
        }
    }
}
