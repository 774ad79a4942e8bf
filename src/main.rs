//! # WooCommerce Statistics Service
//!
//! Serves sales statistics (daily, monthly and yearly sums, recent customers
//! and date-range queries) per order status, read straight from a
//! WooCommerce database.
//!
//! ## Architecture
//!
//! - Axum handles HTTP routing and request/response lifecycle
//! - SQLx reads the WooCommerce order stats and customer lookup tables
//! - `StatsAggregator` runs every requested metric concurrently per call

use std::sync::Arc;

use tracing::info;

use wc_statistic::aggregator::StatsAggregator;
use wc_statistic::config::{AccessPolicy, Config};
use wc_statistic::store::MySqlFactsStore;
use wc_statistic::{create_app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wc_statistic=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting WooCommerce statistics service");

    let config = Config::from_env()?;

    let pool = db::connect(&config).await?;
    info!("Connected to WordPress database");

    let store = Arc::new(MySqlFactsStore::new(pool, config.table_prefix.clone()));
    let aggregator = StatsAggregator::from_config(store, &config);

    let routes: Vec<&str> = config.routes.iter().map(|status| status.slug()).collect();
    info!(
        routes = ?routes,
        timezone = %config.timezone,
        token_required = config.access != AccessPolicy::Public,
        "Statistics routes configured"
    );

    let app = create_app(aggregator, &config);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
