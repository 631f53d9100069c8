//! Storage layer module.
//!
//! This module provides trait-based storage abstraction allowing different backends
//! to be used without changing business logic, and the process-wide registry
//! that hands out one backend instance per logical name.

pub mod factory;
pub mod manager;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod traits;

use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::error::{StorageError, StorageResult};

pub use factory::{BackendFactory, builtin_factories};
pub use manager::{StorageManager, StorageManagerBuilder};
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;
pub use traits::{DynStore, HashOps, Lifecycle, ListOps, Store, StringOps};

static MANAGER: OnceLock<StorageManager> = OnceLock::new();

/// Install the process-wide manager. Can succeed only once per process.
///
/// # Errors
///
/// Returns `AlreadyInstalled` if a manager was installed before.
pub fn install(manager: StorageManager) -> StorageResult<&'static StorageManager> {
    MANAGER
        .set(manager)
        .map_err(|_| StorageError::AlreadyInstalled)?;
    info!("Storage manager installed");
    self::manager()
}

/// The process-wide manager.
///
/// # Errors
///
/// Returns `Uninitialized` if no manager has been installed.
pub fn manager() -> StorageResult<&'static StorageManager> {
    MANAGER.get().ok_or(StorageError::Uninitialized)
}

/// Resolve a store through the process-wide manager.
///
/// # Errors
///
/// Returns `Uninitialized` before [`install`], otherwise the errors of
/// [`StorageManager::get`].
pub fn store(name: Option<&str>) -> StorageResult<Arc<dyn Store>> {
    manager()?.get(name)
}
