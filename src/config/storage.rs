//! Storage configuration.
//!
//! A [`StoreBlock`] keeps the declared backend `type` and its options
//! untyped until the manager resolves the name; only then are the options
//! read into the backend's typed block. Field defaults on the typed blocks
//! make that read a shallow merge where supplied keys win.

use std::collections::HashMap;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{StorageError, StorageResult};

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Logical name resolved when no name is given.
    #[serde(default = "default_store_name")]
    pub default: String,

    /// Configuration blocks by logical name.
    #[serde(default)]
    pub stores: HashMap<String, StoreBlock>,
}

fn default_store_name() -> String {
    "default".to_string()
}

impl StorageConfig {
    /// Validate the storage configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the default name is empty or a block has no type.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default.is_empty() {
            return Err(ConfigError::Message(
                "storage.default cannot be empty".to_string(),
            ));
        }

        for (name, block) in &self.stores {
            if block.kind.trim().is_empty() {
                return Err(ConfigError::Message(format!(
                    "storage.stores.{name}.type cannot be empty"
                )));
            }
        }

        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default: default_store_name(),
            stores: HashMap::new(),
        }
    }
}

/// Configuration block for one logical name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreBlock {
    /// Declared backend type.
    #[serde(rename = "type")]
    pub kind: String,

    /// Backend-specific options.
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl StoreBlock {
    /// Create a block of the given type with no options.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            options: Map::new(),
        }
    }

    /// Set an option, replacing any previous value.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Read the options into a typed block.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if an option is unknown or has the wrong shape.
    pub fn options_as<T: DeserializeOwned>(&self) -> StorageResult<T> {
        serde_json::from_value(Value::Object(self.options.clone()))
            .map_err(|e| StorageError::InvalidConfig(format!("{} options: {e}", self.kind)))
    }
}

/// Redis backend options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedisStoreConfig {
    /// Server host name or address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Connect timeout in seconds; `0` waits indefinitely.
    pub timeout: f64,

    /// Prefix applied to every key.
    pub prefix: Option<String>,

    /// Password sent with `AUTH` after connecting.
    pub password: Option<String>,

    /// Database index sent with `SELECT` after connecting.
    pub database: Option<i64>,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            timeout: 0.0,
            prefix: None,
            password: None,
            database: None,
        }
    }
}

impl RedisStoreConfig {
    /// Merge a block's options over the defaults and validate the result.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the options do not describe a usable server.
    pub fn from_block(block: &StoreBlock) -> StorageResult<Self> {
        let config: Self = block.options_as()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> StorageResult<()> {
        if self.host.is_empty() {
            return Err(StorageError::InvalidConfig(
                "redis host cannot be empty".to_string(),
            ));
        }
        if !self.timeout.is_finite() || self.timeout < 0.0 {
            return Err(StorageError::InvalidConfig(format!(
                "redis timeout must be a non-negative number of seconds, got {}",
                self.timeout
            )));
        }
        if let Some(database) = self.database {
            if database < 0 {
                return Err(StorageError::InvalidConfig(format!(
                    "redis database index cannot be negative, got {database}"
                )));
            }
        }
        Ok(())
    }

    /// Connect timeout, `None` when connecting should wait indefinitely.
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.timeout > 0.0).then(|| Duration::from_secs_f64(self.timeout))
    }

    /// Connection URL for the configured server, without credentials.
    #[must_use]
    pub fn url(&self) -> String {
        if self.host.contains(':') {
            format!("redis://[{}]:{}/", self.host, self.port)
        } else {
            format!("redis://{}:{}/", self.host, self.port)
        }
    }
}

/// In-process memory backend options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryStoreConfig {
    /// Prefix applied to every key.
    pub prefix: Option<String>,

    /// Number of selectable databases.
    pub databases: u32,

    /// Database index selected after connecting.
    pub database: Option<i64>,

    /// Password the store demands, if any.
    pub requirepass: Option<String>,

    /// Password presented when connecting.
    pub password: Option<String>,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            databases: 16,
            database: None,
            requirepass: None,
            password: None,
        }
    }
}

impl MemoryStoreConfig {
    /// Merge a block's options over the defaults and validate the result.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the options are malformed.
    pub fn from_block(block: &StoreBlock) -> StorageResult<Self> {
        let config: Self = block.options_as()?;
        if config.databases == 0 {
            return Err(StorageError::InvalidConfig(
                "memory databases must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}
