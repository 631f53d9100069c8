//! In-process memory storage backend.
//!
//! Behaves like a small Redis server living inside the process: a fixed set
//! of numbered databases, optional password, and the same connection state
//! machine as the network backends. The data belongs to the store, so it
//! survives `disconnect()`/`connect()` cycles.
//!
//! Suitable for development and tests.

mod keyspace;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::MemoryStoreConfig;
use crate::domain::{Arg, Reply};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{HashOps, Lifecycle, ListOps, Store, StringOps};

pub use keyspace::Keyspace;

const BACKEND: &str = "memory";

/// Selected database plus the prefix it was configured with.
struct MemoryConnection {
    keyspace: Arc<Keyspace>,
    prefix: Option<String>,
}

impl MemoryConnection {
    fn key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => key.to_string(),
        }
    }
}

/// Memory-backed store.
pub struct MemoryStore {
    /// Merged configuration block.
    config: MemoryStoreConfig,
    /// Databases, indexed by number.
    databases: Vec<Arc<Keyspace>>,
    /// Present iff connected.
    handle: Mutex<Option<MemoryConnection>>,
    /// Number of transports opened so far.
    opened: AtomicUsize,
}

impl MemoryStore {
    /// Create a new, disconnected memory store.
    #[must_use]
    pub fn new(config: MemoryStoreConfig) -> Self {
        let databases = (0..config.databases.max(1))
            .map(|_| Arc::new(Keyspace::new()))
            .collect();

        Self {
            config,
            databases,
            handle: Mutex::new(None),
            opened: AtomicUsize::new(0),
        }
    }

    /// The merged configuration block.
    #[must_use]
    pub const fn config(&self) -> &MemoryStoreConfig {
        &self.config
    }

    /// How many times a transport has been opened.
    pub fn connections_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn open(&self) -> StorageResult<MemoryConnection> {
        let config = &self.config;
        self.opened.fetch_add(1, Ordering::SeqCst);

        match (&config.requirepass, &config.password) {
            (Some(required), Some(given)) if required == given => {}
            (None, None) => {}
            (Some(_), _) => {
                return Err(failure("auth", StorageError::Auth("invalid password".to_string())));
            }
            (None, Some(_)) => {
                return Err(failure(
                    "auth",
                    StorageError::Auth("AUTH called without any password configured".to_string()),
                ));
            }
        }

        let index = config.database.unwrap_or(0);
        let keyspace = usize::try_from(index)
            .ok()
            .and_then(|i| self.databases.get(i))
            .ok_or_else(|| {
                failure(
                    "select",
                    StorageError::Select {
                        database: index,
                        reason: "DB index is out of range".to_string(),
                    },
                )
            })?;

        counter!("storage_connects_total", "backend" => BACKEND).increment(1);
        info!(database = index, "Memory store connected");

        Ok(MemoryConnection {
            keyspace: Arc::clone(keyspace),
            prefix: config.prefix.clone(),
        })
    }

    /// Forward an operation to the selected database, connecting first if needed.
    fn with_connection<T>(
        &self,
        op: impl FnOnce(&MemoryConnection) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut handle = self.handle.lock();
        let conn = match handle.take() {
            Some(conn) => handle.insert(conn),
            None => handle.insert(self.open()?),
        };
        op(conn)
    }
}

fn failure(step: &'static str, error: StorageError) -> StorageError {
    counter!("storage_connect_failures_total", "backend" => BACKEND, "step" => step).increment(1);
    warn!(step, error = %error, "Memory store connection step failed");
    error
}

impl Lifecycle for MemoryStore {
    fn connect(&self) -> StorageResult<()> {
        let mut handle = self.handle.lock();
        if handle.is_none() {
            *handle = Some(self.open()?);
        }
        Ok(())
    }

    fn disconnect(&self) {
        if self.handle.lock().take().is_some() {
            debug!("Memory store disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl StringOps for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_connection(|conn| conn.keyspace.get(&conn.key(key)))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.with_connection(|conn| conn.keyspace.set(&conn.key(key), value, None))
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        self.with_connection(|conn| conn.keyspace.set(&conn.key(key), value, Some(ttl)))
    }

    fn del(&self, key: &str) -> StorageResult<bool> {
        self.with_connection(|conn| Ok(conn.keyspace.del(&conn.key(key))))
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        self.with_connection(|conn| Ok(conn.keyspace.exists(&conn.key(key))))
    }

    fn incr_by(&self, key: &str, delta: i64) -> StorageResult<i64> {
        self.with_connection(|conn| conn.keyspace.incr_by(&conn.key(key), delta))
    }

    fn expire(&self, key: &str, ttl: Duration) -> StorageResult<bool> {
        self.with_connection(|conn| conn.keyspace.expire(&conn.key(key), ttl))
    }

    fn ttl(&self, key: &str) -> StorageResult<Option<Duration>> {
        self.with_connection(|conn| Ok(conn.keyspace.ttl(&conn.key(key))))
    }
}

impl ListOps for MemoryStore {
    fn lpush(&self, key: &str, value: &str) -> StorageResult<usize> {
        self.with_connection(|conn| conn.keyspace.push(&conn.key(key), value, true))
    }

    fn rpush(&self, key: &str, value: &str) -> StorageResult<usize> {
        self.with_connection(|conn| conn.keyspace.push(&conn.key(key), value, false))
    }

    fn lpop(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_connection(|conn| conn.keyspace.pop(&conn.key(key), true))
    }

    fn rpop(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_connection(|conn| conn.keyspace.pop(&conn.key(key), false))
    }

    fn lrange(&self, key: &str, start: isize, stop: isize) -> StorageResult<Vec<String>> {
        self.with_connection(|conn| conn.keyspace.lrange(&conn.key(key), start, stop))
    }

    fn llen(&self, key: &str) -> StorageResult<usize> {
        self.with_connection(|conn| conn.keyspace.llen(&conn.key(key)))
    }
}

impl HashOps for MemoryStore {
    fn hget(&self, key: &str, field: &str) -> StorageResult<Option<String>> {
        self.with_connection(|conn| conn.keyspace.hget(&conn.key(key), field))
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> StorageResult<bool> {
        self.with_connection(|conn| conn.keyspace.hset(&conn.key(key), field, value))
    }

    fn hdel(&self, key: &str, field: &str) -> StorageResult<bool> {
        self.with_connection(|conn| conn.keyspace.hdel(&conn.key(key), field))
    }

    fn hgetall(&self, key: &str) -> StorageResult<HashMap<String, String>> {
        self.with_connection(|conn| conn.keyspace.hgetall(&conn.key(key)))
    }
}

impl Store for MemoryStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn ping(&self) -> StorageResult<()> {
        self.with_connection(|_| Ok(()))
    }

    fn execute(&self, command: &str, args: &[Arg]) -> StorageResult<Reply> {
        let args: Vec<_> = args.iter().map(Arg::as_str).collect();
        self.with_connection(|conn| conn.keyspace.execute(command, &args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(config: MemoryStoreConfig) -> MemoryStore {
        MemoryStore::new(config)
    }

    #[test]
    fn test_lazy_connect_on_first_operation() {
        let store = store(MemoryStoreConfig::default());
        assert!(!store.is_connected());
        assert_eq!(store.connections_opened(), 0);

        store.set("k", "v").unwrap();
        assert!(store.is_connected());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(store.connections_opened(), 1);
    }

    #[test]
    fn test_connect_twice_opens_one_transport() {
        let store = store(MemoryStoreConfig::default());
        store.connect().unwrap();
        store.connect().unwrap();
        assert!(store.is_connected());
        assert_eq!(store.connections_opened(), 1);
    }

    #[test]
    fn test_disconnect_is_idempotent_and_reconnects_on_use() {
        let store = store(MemoryStoreConfig::default());
        store.disconnect();
        assert!(!store.is_connected());

        store.rpush("jobs", "a").unwrap();
        store.disconnect();
        store.disconnect();
        assert!(!store.is_connected());

        assert_eq!(store.llen("jobs").unwrap(), 1);
        assert_eq!(store.connections_opened(), 2);
    }

    #[test]
    fn test_auth_failures_leave_store_disconnected() {
        let store = store(MemoryStoreConfig {
            requirepass: Some("secret".to_string()),
            password: Some("guess".to_string()),
            ..Default::default()
        });
        assert!(matches!(store.connect(), Err(StorageError::Auth(_))));
        assert!(!store.is_connected());

        let store = self::store(MemoryStoreConfig {
            requirepass: Some("secret".to_string()),
            ..Default::default()
        });
        assert!(matches!(store.get("k"), Err(StorageError::Auth(_))));
        assert!(!store.is_connected());

        let store = self::store(MemoryStoreConfig {
            password: Some("secret".to_string()),
            ..Default::default()
        });
        assert!(matches!(store.ping(), Err(StorageError::Auth(_))));

        let store = self::store(MemoryStoreConfig {
            requirepass: Some("secret".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        });
        assert!(store.ping().is_ok());
    }

    #[test]
    fn test_select_out_of_range() {
        let store = store(MemoryStoreConfig {
            databases: 2,
            database: Some(2),
            ..Default::default()
        });
        let err = store.set("k", "v").unwrap_err();
        assert!(matches!(err, StorageError::Select { database: 2, .. }));
        assert!(!store.is_connected());
    }

    #[test]
    fn test_databases_are_isolated_and_prefix_applies() {
        let store = store(MemoryStoreConfig {
            database: Some(3),
            prefix: Some("app:".to_string()),
            ..Default::default()
        });
        store.hset("user:1", "name", "ldl").unwrap();

        assert!(store.databases[0].is_empty());
        assert_eq!(
            store.databases[3].hget("app:user:1", "name").unwrap().as_deref(),
            Some("ldl")
        );
        assert_eq!(store.hgetall("user:1").unwrap().len(), 1);
    }

    #[test]
    fn test_execute_skips_prefix() {
        let store = store(MemoryStoreConfig {
            prefix: Some("app:".to_string()),
            ..Default::default()
        });
        store.set("color", "red").unwrap();

        let raw = store
            .execute("GET", &[Arg::from("app:color")])
            .unwrap();
        assert_eq!(raw.as_str(), Some("red"));
        assert!(store.execute("GET", &[Arg::from("color")]).unwrap().is_nil());
    }

    #[test]
    fn test_huge_ttl_is_an_error_not_a_panic() {
        let store = store(MemoryStoreConfig::default());
        assert!(matches!(
            store.set_ex("k", "v", Duration::MAX),
            Err(StorageError::InvalidValue(_))
        ));

        store.set("k", "v").unwrap();
        assert!(matches!(
            store.expire("k", Duration::from_secs(u64::MAX)),
            Err(StorageError::InvalidValue(_))
        ));
        assert_eq!(store.ttl("k").unwrap(), None);
        assert!(store.is_connected());
    }
}
