//! Storage probe entry point.
//!
//! Loads the storage configuration, then resolves and pings every configured store.

use storage_manager::run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    run().await
}
