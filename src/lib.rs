//! # WooCommerce Statistics Service Library
//!
//! Exposes the Axum router and modules so integration tests can create
//! an in-process server without requiring `cargo run` in another terminal.

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;
pub mod window;

use std::sync::Arc;

use axum::{middleware, Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::aggregator::StatsAggregator;
use crate::config::Config;
use crate::routes::access::enforce_access;
use crate::routes::stats::StatsEndpoint;

/// Build the Axum router with the statistics routes and middleware.
///
/// Only statuses listed in `config.routes` get an endpoint; the access
/// policy applies to all of them. This function does NOT start a server.
pub fn create_app(aggregator: StatsAggregator, config: &Config) -> Router {
    let endpoint = StatsEndpoint {
        aggregator: Arc::new(aggregator),
        max_customers: config.max_customers,
    };

    Router::new()
        .merge(routes::stats::router(&config.routes))
        .layer(middleware::from_fn_with_state(
            Arc::new(config.access.clone()),
            enforce_access,
        ))
        .layer(Extension(endpoint))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
