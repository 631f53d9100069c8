//! Storage backend factories.
//!
//! Creates the appropriate storage backend from a configuration block. The
//! manager keeps a table of these keyed by the block's `type`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{MemoryStoreConfig, StoreBlock};
use crate::error::StorageResult;
use crate::storage::memory::MemoryStore;
use crate::storage::traits::Store;

/// Constructor for one backend type.
pub type BackendFactory = Arc<dyn Fn(&StoreBlock) -> StorageResult<Arc<dyn Store>> + Send + Sync>;

/// Type name of the Redis backend.
pub const REDIS: &str = "redis";

/// Type name of the in-process memory backend.
pub const MEMORY: &str = "memory";

/// The factories every manager starts with.
#[must_use]
pub fn builtin_factories() -> HashMap<String, BackendFactory> {
    let mut factories: HashMap<String, BackendFactory> = HashMap::new();
    factories.insert(REDIS.to_string(), Arc::new(create_redis));
    factories.insert(MEMORY.to_string(), Arc::new(create_memory));
    factories
}

/// Create a Redis store.
///
/// # Errors
///
/// Returns `InvalidConfig` if the block's options are malformed.
#[cfg(feature = "redis")]
pub fn create_redis(block: &StoreBlock) -> StorageResult<Arc<dyn Store>> {
    use crate::config::RedisStoreConfig;
    use crate::storage::redis::RedisStore;

    let config = RedisStoreConfig::from_block(block)?;
    Ok(Arc::new(RedisStore::new(config)?))
}

/// Create a Redis store.
///
/// # Errors
///
/// Always returns `MissingDependency`: this build has no Redis client.
#[cfg(not(feature = "redis"))]
pub fn create_redis(_block: &StoreBlock) -> StorageResult<Arc<dyn Store>> {
    Err(crate::error::StorageError::MissingDependency {
        backend: REDIS,
        requirement: "the `redis` cargo feature",
    })
}

/// Create an in-process memory store.
///
/// # Errors
///
/// Returns `InvalidConfig` if the block's options are malformed.
pub fn create_memory(block: &StoreBlock) -> StorageResult<Arc<dyn Store>> {
    let config = MemoryStoreConfig::from_block(block)?;
    Ok(Arc::new(MemoryStore::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn test_create_memory_storage() {
        let store = create_memory(&StoreBlock::new(MEMORY)).unwrap();
        assert_eq!(store.backend_name(), "memory");
        assert!(!store.is_connected());
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_create_redis_storage_does_not_connect() {
        let block = StoreBlock::new(REDIS).with_option("port", 1);
        let store = create_redis(&block).unwrap();
        assert_eq!(store.backend_name(), "redis");
        assert!(!store.is_connected());
    }

    #[cfg(not(feature = "redis"))]
    #[test]
    fn test_create_redis_storage_missing_dependency() {
        let result = create_redis(&StoreBlock::new(REDIS));
        assert!(matches!(
            result,
            Err(StorageError::MissingDependency { backend: "redis", .. })
        ));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let block = StoreBlock::new(MEMORY).with_option("databases", "many");
        assert!(matches!(
            create_memory(&block),
            Err(StorageError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_builtin_factories() {
        let factories = builtin_factories();
        assert!(factories.contains_key("redis"));
        assert!(factories.contains_key("memory"));
    }
}
