//! Storage capability definitions.
//!
//! Application code talks to a named store only through [`Store`], so a
//! backend can be swapped by editing configuration alone.
//!
//! Every data operation is forwarded: the backend connects first when it is
//! disconnected, then delegates the call to its live handle with the same
//! arguments and returns the result or error untouched. A failed implicit
//! connect is returned as-is and the operation does not run.

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::{Arg, Reply};
use crate::error::StorageResult;

/// Connection lifecycle shared by all backends.
pub trait Lifecycle: Send + Sync {
    /// Open the connection; a no-op when already connected.
    ///
    /// On failure the backend stays disconnected and holds no handle.
    fn connect(&self) -> StorageResult<()>;

    /// Drop the connection handle. Idempotent, never fails.
    fn disconnect(&self);

    /// Whether a live handle is held.
    fn is_connected(&self) -> bool;
}

/// String (plain value) operations.
pub trait StringOps: Send + Sync {
    /// Get the value of `key`.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Set `key` to `value`.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Set `key` to `value`, expiring after `ttl`.
    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StorageResult<()>;

    /// Delete `key`. Returns whether it existed.
    fn del(&self, key: &str) -> StorageResult<bool>;

    /// Whether `key` exists.
    fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Add `delta` to the integer stored at `key`, returning the new value.
    fn incr_by(&self, key: &str, delta: i64) -> StorageResult<i64>;

    /// Set a time-to-live on `key`. Returns whether the key exists.
    fn expire(&self, key: &str, ttl: Duration) -> StorageResult<bool>;

    /// Remaining time-to-live of `key`; `None` if missing or persistent.
    fn ttl(&self, key: &str) -> StorageResult<Option<Duration>>;
}

/// List operations.
pub trait ListOps: Send + Sync {
    /// Prepend `value`, returning the new length.
    fn lpush(&self, key: &str, value: &str) -> StorageResult<usize>;

    /// Append `value`, returning the new length.
    fn rpush(&self, key: &str, value: &str) -> StorageResult<usize>;

    /// Remove and return the first element.
    fn lpop(&self, key: &str) -> StorageResult<Option<String>>;

    /// Remove and return the last element.
    fn rpop(&self, key: &str) -> StorageResult<Option<String>>;

    /// Elements between `start` and `stop` inclusive; negative indexes count from the end.
    fn lrange(&self, key: &str, start: isize, stop: isize) -> StorageResult<Vec<String>>;

    /// Length of the list.
    fn llen(&self, key: &str) -> StorageResult<usize>;
}

/// Hash operations.
pub trait HashOps: Send + Sync {
    /// Get `field` of the hash at `key`.
    fn hget(&self, key: &str, field: &str) -> StorageResult<Option<String>>;

    /// Set `field`. Returns whether the field is new.
    fn hset(&self, key: &str, field: &str, value: &str) -> StorageResult<bool>;

    /// Delete `field`. Returns whether it existed.
    fn hdel(&self, key: &str, field: &str) -> StorageResult<bool>;

    /// All fields and values of the hash.
    fn hgetall(&self, key: &str) -> StorageResult<HashMap<String, String>>;
}

/// Combined storage capability.
///
/// This trait combines the lifecycle and the native operation families into
/// a single interface, plus an escape hatch for commands not enumerated.
pub trait Store: Lifecycle + StringOps + ListOps + HashOps {
    /// Get the storage backend name.
    fn backend_name(&self) -> &'static str;

    /// Round-trip to the backend, connecting first if needed.
    fn ping(&self) -> StorageResult<()>;

    /// Run an arbitrary command.
    ///
    /// Arguments are sent verbatim. Unlike the enumerated operations, the
    /// configured key prefix is not applied, so key arguments must already
    /// carry it.
    fn execute(&self, command: &str, args: &[Arg]) -> StorageResult<Reply>;
}

/// Trait object alias for Store.
pub type DynStore = dyn Store;
