//! Error types for the statistics service.
//!
//! `StoreError` comes out of an [`OrderFactsStore`](crate::store::OrderFactsStore);
//! `StatsError` is what a call to the aggregator or an endpoint can fail with.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

/// Failure reading from the order facts store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store could not be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced to callers of the statistics endpoints.
#[derive(Error, Debug)]
pub enum StatsError {
    /// `range` was requested without two parseable dates.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// One or more store reads failed. Sibling reads still ran to completion.
    #[error("order store unavailable for {}: {source}", .metrics.join(", "))]
    StoreUnavailable {
        metrics: Vec<String>,
        #[source]
        source: StoreError,
    },

    /// A POST body could not be read as JSON or form parameters.
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("statistics query exceeded {timeout_ms}ms deadline")]
    Timeout { timeout_ms: u64 },

    #[error("missing or invalid access token")]
    Unauthorized,
}

impl StatsError {
    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::InvalidRange(message.into())
    }

    pub fn invalid_body(message: impl Into<String>) -> Self {
        Self::InvalidBody(message.into())
    }

    pub fn store_unavailable(metrics: Vec<String>, source: StoreError) -> Self {
        Self::StoreUnavailable { metrics, source }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRange(_) | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRange(_) => "invalid_range",
            Self::InvalidBody(_) => "invalid_body",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Unauthorized => "unauthorized",
        }
    }
}

impl IntoResponse for StatsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Store details stay in the logs.
        let message = match &self {
            Self::StoreUnavailable { metrics, source } => {
                error!(metrics = ?metrics, error = %source, "Statistics query failed");
                format!("Order store unavailable for: {}", metrics.join(", "))
            }
            other => other.to_string(),
        };

        (
            status,
            Json(serde_json::json!({
                "error": self.kind(),
                "message": message,
            })),
        )
            .into_response()
    }
}
