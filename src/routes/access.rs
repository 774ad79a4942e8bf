//! Access policy middleware for the statistics routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::config::AccessPolicy;
use crate::error::StatsError;

/// Reject requests that do not satisfy `policy`.
pub async fn enforce_access(
    State(policy): State<Arc<AccessPolicy>>,
    request: Request,
    next: Next,
) -> Result<Response, StatsError> {
    if let AccessPolicy::BearerToken(expected) = policy.as_ref() {
        let presented = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);

        if !presented.is_some_and(|token| token_matches(token, expected)) {
            warn!(
                path = %request.uri().path(),
                "Rejected statistics request without a valid token"
            );
            return Err(StatsError::Unauthorized);
        }
    }

    Ok(next.run(request).await)
}

/// Compare tokens in time independent of where they first differ.
fn token_matches(presented: &str, expected: &str) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}
