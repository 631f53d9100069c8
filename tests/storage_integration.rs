//! Integration tests for the storage manager.
//!
//! These tests load configuration from a real TOML file, resolve stores through
//! the manager and drive them through the capability traits only.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;

use storage_manager::config::{AppConfig, StorageConfig, StoreBlock};
use storage_manager::domain::{Arg, Expression, Reply, wrap};
use storage_manager::error::{ErrorCategory, StorageError};
use storage_manager::storage::{StorageManager, factory};

// ============================================================================
// Test Harness
// ============================================================================

const CONFIG: &str = r#"
[storage]
default = "scratch"

[storage.stores.scratch]
type = "memory"
prefix = "app:"

[storage.stores.locked]
type = "memory"
requirepass = "s3cret"
password = "nope"

[storage.stores.far]
type = "memory"
databases = 2
database = 7

[storage.stores.cache]
type = "redis"
port = 1
timeout = 0.5

[storage.stores.weird]
type = "bogus"
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write config");
    file
}

fn manager() -> StorageManager {
    let file = write_config(CONFIG);
    let config = AppConfig::from_file(file.path()).expect("Failed to load config");
    StorageManager::new(config.storage)
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_default_store_from_file() {
    let manager = manager();
    let store = manager.get(None).unwrap();
    assert_eq!(store.backend_name(), "memory");
    assert!(!store.is_connected());
    assert!(Arc::ptr_eq(&store, &manager.get(Some("scratch")).unwrap()));
}

#[test]
fn test_resolution_errors() {
    let manager = manager();

    let Err(err) = manager.get(Some("weird")) else {
        panic!("expected UnknownBackend for a bogus type");
    };
    assert!(matches!(err, StorageError::UnknownBackend { ref kind, .. } if kind == "bogus"));
    assert_eq!(err.error_code().category(), ErrorCategory::Configuration);

    let Err(err) = manager.get(Some("absent")) else {
        panic!("expected Config for an unconfigured name");
    };
    assert!(matches!(err, StorageError::Config(ref name) if name == "absent"));
}

#[cfg(feature = "redis")]
#[test]
fn test_resolving_many_names_keeps_them_apart() {
    let manager = manager();
    let scratch = manager.get(Some("scratch")).unwrap();
    let cache = manager.get(Some("cache")).unwrap();
    assert!(!Arc::ptr_eq(&scratch, &cache));
    assert_eq!(manager.names(), vec!["cache", "far", "locked", "scratch", "weird"]);
}

// ============================================================================
// Connection lifecycle
// ============================================================================

#[cfg(feature = "redis")]
#[test]
fn test_lifecycle_errors_leave_store_disconnected() {
    let manager = manager();

    let locked = manager.get(Some("locked")).unwrap();
    assert!(matches!(locked.connect(), Err(StorageError::Auth(_))));
    assert!(!locked.is_connected());

    let far = manager.get(Some("far")).unwrap();
    let err = far.get("k").unwrap_err();
    assert!(matches!(err, StorageError::Select { database: 7, .. }));
    assert!(!far.is_connected());

    let cache = manager.get(Some("cache")).unwrap();
    let err = cache.connect().unwrap_err();
    assert!(matches!(err, StorageError::Connect { .. }));
    assert!(!cache.is_connected());

    // an implicit connect reports the same failure
    let err = cache.lpush("jobs", "a").unwrap_err();
    assert!(err.is_connection_error());
    assert!(!cache.is_connected());
}

#[test]
fn test_disconnect_then_reuse() {
    let manager = manager();
    let store = manager.get(None).unwrap();

    store.disconnect();
    store.set("visits", "1").unwrap();
    assert!(store.is_connected());

    store.disconnect();
    assert!(!store.is_connected());
    assert_eq!(store.incr_by("visits", 2).unwrap(), 3);
    assert!(store.is_connected());
}

// ============================================================================
// Forwarded operations
// ============================================================================

#[test]
fn test_string_list_and_hash_operations() {
    let manager = manager();
    let store = manager.get(None).unwrap();

    store.set_ex("token", "abc", Duration::from_secs(30)).unwrap();
    assert!(store.ttl("token").unwrap().is_some());
    assert!(store.expire("token", Duration::from_secs(60)).unwrap());
    assert!(store.exists("token").unwrap());

    store.rpush("queue", "one").unwrap();
    store.rpush("queue", "two").unwrap();
    assert_eq!(store.lrange("queue", 0, -1).unwrap(), vec!["one", "two"]);
    assert_eq!(store.lpop("queue").unwrap().as_deref(), Some("one"));
    assert_eq!(store.rpop("queue").unwrap().as_deref(), Some("two"));
    assert_eq!(store.llen("queue").unwrap(), 0);

    assert!(store.hset("profile", "lang", "rust").unwrap());
    assert_eq!(store.hget("profile", "lang").unwrap().as_deref(), Some("rust"));
    assert!(store.hdel("profile", "lang").unwrap());
    assert!(store.hgetall("profile").unwrap().is_empty());

    // native errors pass through unchanged
    assert!(matches!(
        store.lpush("token", "x"),
        Err(StorageError::WrongType)
    ));
}

#[test]
fn test_execute_with_expression_arguments() {
    let manager = manager();
    let store = manager.get(None).unwrap();

    let raw: Expression = wrap("app:counter");
    assert!(Expression::ptr_eq(&raw, &wrap(&raw)));

    let reply = store
        .execute("INCRBY", &[Arg::from(&raw), Arg::from(5)])
        .unwrap();
    assert_eq!(reply, Reply::Int(5));
    assert_eq!(store.get("counter").unwrap().as_deref(), Some("5"));

    assert!(matches!(
        store.execute("CLUSTER", &[Arg::from("INFO")]),
        Err(StorageError::UnsupportedCommand(_))
    ));
}

// ============================================================================
// Custom backends
// ============================================================================

#[test]
fn test_registered_backend_replaces_builtin() {
    let mut config = StorageConfig::default();
    config
        .stores
        .insert("default".to_string(), StoreBlock::new("REDIS"));

    // route the redis type to memory, e.g. for tests without a server
    let manager = StorageManager::builder(config)
        .register_backend("redis", factory::create_memory)
        .build();

    let store = manager.get(None).unwrap();
    assert_eq!(store.backend_name(), "memory");
    store.ping().unwrap();
}
