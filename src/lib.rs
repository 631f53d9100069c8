//! # Storage Manager
//!
//! Named, lazily-connected storage backends behind one capability trait.
//!
//! - **Registry**: a logical name resolves to exactly one backend instance per process
//! - **Lazy connect**: instances connect on their first operation, never at construction
//! - **Backends**: Redis (`redis` feature, default) and an in-process memory store
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Storage Manager                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────┐ │
//! │  │   Config    │  │  Registry   │  │  Backends   │  │  Domain  │ │
//! │  │  (blocks)   │→ │ (by name)   │→ │ (lazy conn) │  │  Types   │ │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └──────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```no_run
//! use storage_manager::config::{StorageConfig, StoreBlock};
//! use storage_manager::storage::{self, StorageManager};
//!
//! let mut config = StorageConfig::default();
//! config
//!     .stores
//!     .insert("default".to_string(), StoreBlock::new("redis").with_option("port", 6380));
//!
//! storage::install(StorageManager::new(config))?;
//! let cache = storage::store(None)?;
//! cache.set("greeting", "hello")?;
//! # Ok::<(), storage_manager::error::StorageError>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod error;
pub mod storage;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::StorageResult;
use crate::storage::StorageManager;

pub use crate::domain::{Expression, wrap};
pub use crate::error::StorageError;
pub use crate::storage::Store;

/// Run the storage probe.
///
/// This function:
/// 1. Loads configuration from files and environment
/// 2. Initializes logging and, if enabled, the Prometheus recorder
/// 3. Installs the process-wide storage manager
/// 4. Pings every configured store on a blocking task
/// 5. Prints the metrics exposition
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded
/// - The metrics recorder cannot be installed
/// - Any configured store fails its probe
pub async fn run() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting storage probe"
    );

    let metrics = if config.observability.metrics_enabled {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    let manager = storage::install(StorageManager::new(config.storage))?;
    let names: Vec<String> = manager.names().into_iter().map(str::to_string).collect();
    if names.is_empty() {
        warn!("No stores configured");
    }

    // Connecting blocks, so every probe runs off the async workers
    let probes: Vec<_> = names
        .into_iter()
        .map(|name| {
            tokio::task::spawn_blocking(move || {
                let result = probe(manager, &name);
                (name, result)
            })
        })
        .collect();

    let mut failed = 0_usize;
    for task in probes {
        let (name, result) = task.await?;
        match result {
            Ok(backend) => info!(store = %name, backend, "Store reachable"),
            Err(e) => {
                failed += 1;
                error!(
                    store = %name,
                    error_code = e.error_code().as_i32(),
                    category = %e.error_code().category(),
                    error = %e,
                    "Store probe failed"
                );
            }
        }
    }

    if let Some(handle) = metrics {
        print!("{}", handle.render());
    }

    if failed > 0 {
        anyhow::bail!("{failed} store(s) failed the probe");
    }

    info!("All stores reachable");
    Ok(())
}

/// Resolve `name`, round-trip once, and release the connection.
fn probe(manager: &StorageManager, name: &str) -> StorageResult<&'static str> {
    let store = manager.get(Some(name))?;
    store.ping()?;
    store.disconnect();
    Ok(store.backend_name())
}

/// Initialize logging based on configuration.
fn init_logging(config: &AppConfig) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.observability.log_format == "json" {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer()).init();
    }
}
