//! Redis storage backend.
//!
//! Wraps exactly one synchronous `redis::Connection`. The connection is
//! opened on first use (or an explicit [`Lifecycle::connect`]) and then runs
//! the optional `AUTH` and `SELECT` steps before it is recorded. The key
//! prefix is applied client-side to every enumerated operation.

use std::collections::HashMap;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use redis::{Client, Connection, RedisError, RedisResult};
use tracing::{debug, info, warn};

use crate::config::RedisStoreConfig;
use crate::domain::{Arg, Reply};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{HashOps, Lifecycle, ListOps, Store, StringOps};

const BACKEND: &str = "redis";

/// Live handle plus the prefix it was configured with.
struct LiveConnection {
    con: Connection,
    prefix: Option<String>,
}

impl LiveConnection {
    fn key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => key.to_string(),
        }
    }
}

/// Redis-backed store.
pub struct RedisStore {
    /// Merged configuration block.
    config: RedisStoreConfig,
    /// Client used to open the connection; holds no socket.
    client: Client,
    /// Present iff connected.
    handle: Mutex<Option<LiveConnection>>,
}

impl RedisStore {
    /// Create a new, disconnected Redis store.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if host and port do not form a valid address.
    pub fn new(config: RedisStoreConfig) -> StorageResult<Self> {
        let url = config.url();
        let client = Client::open(url.as_str())
            .map_err(|e| StorageError::InvalidConfig(format!("redis address {url}: {e}")))?;

        Ok(Self {
            config,
            client,
            handle: Mutex::new(None),
        })
    }

    /// The merged configuration block.
    #[must_use]
    pub const fn config(&self) -> &RedisStoreConfig {
        &self.config
    }

    /// Open the transport and run the configured handshake steps.
    fn open(&self) -> StorageResult<LiveConnection> {
        let config = &self.config;

        let opened = match config.connect_timeout() {
            Some(timeout) => self.client.get_connection_with_timeout(timeout),
            None => self.client.get_connection(),
        };
        let mut con = opened.map_err(|e| {
            record_failure("connect", &e);
            StorageError::Connect {
                backend: BACKEND,
                reason: e.to_string(),
            }
        })?;

        if let Some(password) = &config.password {
            redis::cmd("AUTH")
                .arg(password)
                .query::<()>(&mut con)
                .map_err(|e| {
                    record_failure("auth", &e);
                    StorageError::Auth(e.to_string())
                })?;
        }

        if let Some(database) = config.database {
            redis::cmd("SELECT")
                .arg(database)
                .query::<()>(&mut con)
                .map_err(|e| {
                    record_failure("select", &e);
                    StorageError::Select {
                        database,
                        reason: e.to_string(),
                    }
                })?;
        }

        counter!("storage_connects_total", "backend" => BACKEND).increment(1);
        info!(
            host = %config.host,
            port = config.port,
            database = ?config.database,
            "Redis connection established"
        );

        Ok(LiveConnection {
            con,
            prefix: config.prefix.clone(),
        })
    }

    /// Forward an operation to the live connection, connecting first if needed.
    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut LiveConnection) -> RedisResult<T>,
    ) -> StorageResult<T> {
        let mut handle = self.handle.lock();
        let live = match handle.take() {
            Some(live) => handle.insert(live),
            None => handle.insert(self.open()?),
        };
        Ok(op(live)?)
    }
}

fn record_failure(step: &'static str, error: &RedisError) {
    counter!("storage_connect_failures_total", "backend" => BACKEND, "step" => step).increment(1);
    warn!(step, error = %error, "Redis connection step failed");
}

/// Whole milliseconds, rounded up so a sub-millisecond TTL stays positive.
fn millis(ttl: Duration) -> u64 {
    let whole = ttl.as_millis() + u128::from(ttl.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(whole).unwrap_or(u64::MAX)
}

impl Lifecycle for RedisStore {
    fn connect(&self) -> StorageResult<()> {
        let mut handle = self.handle.lock();
        if handle.is_none() {
            *handle = Some(self.open()?);
        }
        Ok(())
    }

    fn disconnect(&self) {
        if self.handle.lock().take().is_some() {
            debug!(host = %self.config.host, port = self.config.port, "Redis connection dropped");
        }
    }

    fn is_connected(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl StringOps for RedisStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_connection(|live| redis::cmd("GET").arg(live.key(key)).query(&mut live.con))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.with_connection(|live| {
            redis::cmd("SET")
                .arg(live.key(key))
                .arg(value)
                .query(&mut live.con)
        })
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()> {
        self.with_connection(|live| {
            redis::cmd("SET")
                .arg(live.key(key))
                .arg(value)
                .arg("PX")
                .arg(millis(ttl))
                .query(&mut live.con)
        })
    }

    fn del(&self, key: &str) -> StorageResult<bool> {
        self.with_connection(|live| redis::cmd("DEL").arg(live.key(key)).query(&mut live.con))
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        self.with_connection(|live| redis::cmd("EXISTS").arg(live.key(key)).query(&mut live.con))
    }

    fn incr_by(&self, key: &str, delta: i64) -> StorageResult<i64> {
        self.with_connection(|live| {
            redis::cmd("INCRBY")
                .arg(live.key(key))
                .arg(delta)
                .query(&mut live.con)
        })
    }

    fn expire(&self, key: &str, ttl: Duration) -> StorageResult<bool> {
        self.with_connection(|live| {
            redis::cmd("PEXPIRE")
                .arg(live.key(key))
                .arg(millis(ttl))
                .query(&mut live.con)
        })
    }

    fn ttl(&self, key: &str) -> StorageResult<Option<Duration>> {
        let remaining: i64 =
            self.with_connection(|live| redis::cmd("PTTL").arg(live.key(key)).query(&mut live.con))?;
        // -2: no such key, -1: no expiry
        Ok(u64::try_from(remaining).ok().map(Duration::from_millis))
    }
}

impl ListOps for RedisStore {
    fn lpush(&self, key: &str, value: &str) -> StorageResult<usize> {
        self.with_connection(|live| {
            redis::cmd("LPUSH")
                .arg(live.key(key))
                .arg(value)
                .query(&mut live.con)
        })
    }

    fn rpush(&self, key: &str, value: &str) -> StorageResult<usize> {
        self.with_connection(|live| {
            redis::cmd("RPUSH")
                .arg(live.key(key))
                .arg(value)
                .query(&mut live.con)
        })
    }

    fn lpop(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_connection(|live| redis::cmd("LPOP").arg(live.key(key)).query(&mut live.con))
    }

    fn rpop(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_connection(|live| redis::cmd("RPOP").arg(live.key(key)).query(&mut live.con))
    }

    fn lrange(&self, key: &str, start: isize, stop: isize) -> StorageResult<Vec<String>> {
        self.with_connection(|live| {
            redis::cmd("LRANGE")
                .arg(live.key(key))
                .arg(start)
                .arg(stop)
                .query(&mut live.con)
        })
    }

    fn llen(&self, key: &str) -> StorageResult<usize> {
        self.with_connection(|live| redis::cmd("LLEN").arg(live.key(key)).query(&mut live.con))
    }
}

impl HashOps for RedisStore {
    fn hget(&self, key: &str, field: &str) -> StorageResult<Option<String>> {
        self.with_connection(|live| {
            redis::cmd("HGET")
                .arg(live.key(key))
                .arg(field)
                .query(&mut live.con)
        })
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> StorageResult<bool> {
        self.with_connection(|live| {
            redis::cmd("HSET")
                .arg(live.key(key))
                .arg(field)
                .arg(value)
                .query(&mut live.con)
        })
    }

    fn hdel(&self, key: &str, field: &str) -> StorageResult<bool> {
        self.with_connection(|live| {
            redis::cmd("HDEL")
                .arg(live.key(key))
                .arg(field)
                .query(&mut live.con)
        })
    }

    fn hgetall(&self, key: &str) -> StorageResult<HashMap<String, String>> {
        self.with_connection(|live| redis::cmd("HGETALL").arg(live.key(key)).query(&mut live.con))
    }
}

impl Store for RedisStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn ping(&self) -> StorageResult<()> {
        self.with_connection(|live| redis::cmd("PING").query(&mut live.con))
    }

    fn execute(&self, command: &str, args: &[Arg]) -> StorageResult<Reply> {
        let mut cmd = redis::cmd(command);
        for arg in args {
            cmd.arg(&*arg.as_str());
        }
        self.with_connection(|live| cmd.query::<redis::Value>(&mut live.con))
            .map(Reply::from)
    }
}
