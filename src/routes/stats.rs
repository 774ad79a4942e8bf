//! Sales statistics routes.
//!
//! GET  /wc-statistic/v1/{status} - Statistics from query parameters
//! POST /wc-statistic/v1/{status} - Same, with an optional JSON or form body overriding the query
//!
//! Parameters: `customers_per_page`, `filter`, `between`. A parameter repeated
//! in the query string or a form body keeps its last value.

use std::sync::Arc;

use axum::extract::{FromRequest, Query, Request};
use axum::http::header::CONTENT_TYPE;
use axum::routing::get;
use axum::{Extension, Form, Json, Router};
use tracing::debug;

use crate::aggregator::StatsAggregator;
use crate::catalog::OrderStatus;
use crate::error::StatsError;
use crate::models::{StatsParams, StatsRequest, StatsResult};

/// Path prefix shared by every statistics endpoint.
pub const API_NAMESPACE: &str = "/wc-statistic/v1";

/// Shared handler state, installed as an `Extension`.
#[derive(Clone)]
pub struct StatsEndpoint {
    pub aggregator: Arc<StatsAggregator>,
    pub max_customers: u32,
}

/// Raw `key=value` pairs of a query string or form body, in order.
type Pairs = Vec<(String, String)>;

/// Optional POST body, read according to its `Content-Type`.
///
/// No content type means no body. JSON and form-encoded bodies are parsed;
/// anything else is rejected.
#[derive(Debug)]
pub struct BodyParams(pub Option<StatsParams>);

impl<S> FromRequest<S> for BodyParams
where
    S: Send + Sync,
{
    type Rejection = StatsError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);

        match content_type.as_deref() {
            None => Ok(Self(None)),
            Some(ct) if ct.starts_with("application/json") => {
                let Json(params) = Json::<StatsParams>::from_request(req, state)
                    .await
                    .map_err(|rejection| StatsError::invalid_body(rejection.body_text()))?;
                Ok(Self(Some(params)))
            }
            Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => {
                let Form(pairs) = Form::<Pairs>::from_request(req, state)
                    .await
                    .map_err(|rejection| StatsError::invalid_body(rejection.body_text()))?;
                Ok(Self(Some(StatsParams::from_pairs(pairs))))
            }
            Some(other) => Err(StatsError::invalid_body(format!(
                "unsupported content type {other:?}"
            ))),
        }
    }
}

/// Build the statistics router with one route per status in `statuses`.
pub fn router(statuses: &[OrderStatus]) -> Router {
    statuses.iter().fold(Router::new(), |router, &status| {
        router.route(
            &format!("{API_NAMESPACE}/{}", status.slug()),
            get(
                move |endpoint: Extension<StatsEndpoint>, query: Query<Pairs>| {
                    get_stats(status, endpoint, query)
                },
            )
            .post(
                move |endpoint: Extension<StatsEndpoint>,
                      query: Query<Pairs>,
                      body: BodyParams| {
                    post_stats(status, endpoint, query, body)
                },
            ),
        )
    })
}

async fn get_stats(
    status: OrderStatus,
    Extension(endpoint): Extension<StatsEndpoint>,
    Query(pairs): Query<Pairs>,
) -> Result<Json<StatsResult>, StatsError> {
    respond(status, &endpoint, StatsParams::from_pairs(pairs)).await
}

async fn post_stats(
    status: OrderStatus,
    Extension(endpoint): Extension<StatsEndpoint>,
    Query(pairs): Query<Pairs>,
    BodyParams(body): BodyParams,
) -> Result<Json<StatsResult>, StatsError> {
    let query = StatsParams::from_pairs(pairs);
    let params = match body {
        Some(body) => query.merged_with(body),
        None => query,
    };
    respond(status, &endpoint, params).await
}

async fn respond(
    status: OrderStatus,
    endpoint: &StatsEndpoint,
    params: StatsParams,
) -> Result<Json<StatsResult>, StatsError> {
    let request = StatsRequest::from_params(status, &params, endpoint.max_customers)?;
    debug!(
        status = %status,
        metrics = ?request.metrics,
        customer_limit = request.customer_limit,
        "Statistics requested"
    );

    let result = endpoint.aggregator.compute(&request).await?;
    Ok(Json(result))
}
