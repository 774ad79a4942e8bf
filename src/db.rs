//! Database helpers for the statistics service.
//!
//! The service only reads from the WordPress database; it owns no schema
//! and runs no migrations.

use std::time::Duration;

use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;

use crate::config::Config;

/// Type alias for the WordPress database pool.
pub type AppDb = MySqlPool;

/// Connect a pool sized and bounded by `config`.
///
/// Acquiring a connection never waits longer than the per-call deadline.
pub async fn connect(config: &Config) -> Result<AppDb, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.query_timeout)
        .idle_timeout(Duration::from_secs(300))
        .connect(&config.database_url)
        .await
}
