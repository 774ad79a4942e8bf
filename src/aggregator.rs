//! Statistics aggregation.
//!
//! One call resolves a store query per requested metric, dispatches them all
//! concurrently together with the currency lookup, waits for every one of
//! them, and assembles a [`StatsResult`]. A failing read never cancels its
//! siblings; the call reports every failed metric once all reads are done.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use tracing::{debug, error, warn};

use crate::catalog::Metric;
use crate::config::Config;
use crate::error::{StatsError, StoreError};
use crate::models::{
    BucketTotal, CustomerPurchase, MetricValue, PurchaseRecord, StatsRequest, StatsResult,
};
use crate::store::OrderFactsStore;
use crate::window::{self, MetricQuery};

/// Currency reported when neither configuration nor the store names one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Upper bound on a whole call unless configured otherwise.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// Raw outcome of one metric's store read.
enum MetricRead {
    Total(Option<f64>),
    Series(Vec<BucketTotal>),
    Purchases(Vec<PurchaseRecord>),
    /// No query was issued.
    Skipped,
}

impl MetricRead {
    /// Shape the read into its wire value and whether it counts as data.
    fn into_value(self, metric: Metric, currency: &str) -> (MetricValue, bool) {
        match self {
            MetricRead::Total(Some(total)) if total != 0.0 => (MetricValue::Total(total), true),
            MetricRead::Total(_) | MetricRead::Skipped => (MetricValue::empty(metric), false),
            MetricRead::Series(rows) => {
                let series: BTreeMap<String, f64> = rows
                    .into_iter()
                    .filter_map(|row| row.total.map(|total| (row.bucket, total)))
                    .collect();
                let found = !series.is_empty();
                (MetricValue::Series(series), found)
            }
            MetricRead::Purchases(records) => {
                let found = !records.is_empty();
                let purchases = records
                    .into_iter()
                    .map(|record| CustomerPurchase::from_record(record, currency))
                    .collect();
                (MetricValue::Customers(purchases), found)
            }
        }
    }
}

/// Computes sales statistics for one order status per call.
///
/// Holds no per-call state; share it behind an `Arc`.
pub struct StatsAggregator {
    store: Arc<dyn OrderFactsStore>,
    timezone: Tz,
    currency: Option<String>,
    deadline: Duration,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn OrderFactsStore>) -> Self {
        Self {
            store,
            timezone: Tz::UTC,
            currency: None,
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn from_config(store: Arc<dyn OrderFactsStore>, config: &Config) -> Self {
        Self::new(store)
            .with_timezone(config.timezone)
            .with_currency(config.currency.clone())
            .with_deadline(config.query_timeout)
    }

    /// Timezone of the store's local order timestamps.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Fixed currency code; `None` reads it from the store on every call.
    pub fn with_currency(mut self, currency: Option<String>) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Compute statistics as of the current time in the store's timezone.
    pub async fn compute(&self, request: &StatsRequest) -> Result<StatsResult, StatsError> {
        let now = Utc::now().with_timezone(&self.timezone).naive_local();
        self.compute_at(request, now).await
    }

    /// Compute statistics as of the store-local timestamp `now`.
    pub async fn compute_at(
        &self,
        request: &StatsRequest,
        now: NaiveDateTime,
    ) -> Result<StatsResult, StatsError> {
        if request.range.is_none() && request.metrics.is_explicit(Metric::Range) {
            return Err(StatsError::invalid_range(
                "`range` requires a start and an end date",
            ));
        }

        match tokio::time::timeout(self.deadline, self.collect(request, now.date())).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    status = %request.status,
                    deadline_ms = timeout_ms,
                    "Statistics call exceeded its deadline"
                );
                Err(StatsError::Timeout { timeout_ms })
            }
        }
    }

    async fn collect(
        &self,
        request: &StatsRequest,
        today: NaiveDate,
    ) -> Result<StatsResult, StatsError> {
        let metrics = request.metrics.metrics();
        let reads = metrics.iter().map(|&metric| async move {
            (metric, self.read_metric(metric, request, today).await)
        });

        let (outcomes, currency) = futures::join!(join_all(reads), self.resolve_currency());

        let mut failed = Vec::new();
        let mut first_error: Option<StoreError> = None;

        let currency = currency.unwrap_or_else(|e| {
            error!(status = %request.status, error = %e, "Currency lookup failed");
            failed.push("currency".to_string());
            first_error = Some(e);
            DEFAULT_CURRENCY.to_string()
        });

        let mut result = StatsResult::new(currency.as_str());
        for (metric, outcome) in outcomes {
            match outcome {
                Ok(read) => {
                    let (value, found) = read.into_value(metric, &currency);
                    result.insert(metric, value, found);
                }
                Err(e) => {
                    error!(
                        status = %request.status,
                        metric = %metric,
                        error = %e,
                        "Metric query failed"
                    );
                    failed.push(metric.key().to_string());
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(source) = first_error {
            return Err(StatsError::store_unavailable(failed, source));
        }

        debug!(
            status = %request.status,
            metrics = metrics.len(),
            has_data = result.has_data(),
            "Statistics computed"
        );
        Ok(result)
    }

    async fn read_metric(
        &self,
        metric: Metric,
        request: &StatsRequest,
        today: NaiveDate,
    ) -> Result<MetricRead, StoreError> {
        let Some(query) = window::plan(metric, today, request.range.as_ref()) else {
            return Ok(MetricRead::Skipped);
        };

        match query {
            MetricQuery::Total(window) => self
                .store
                .net_total(request.status, &window)
                .await
                .map(MetricRead::Total),
            MetricQuery::Series(window, bucket) => self
                .store
                .bucketed_net_totals(request.status, &window, bucket)
                .await
                .map(MetricRead::Series),
            MetricQuery::Customers if request.customer_limit == 0 => Ok(MetricRead::Skipped),
            MetricQuery::Customers => self
                .store
                .recent_purchases(request.status, request.customer_limit)
                .await
                .map(MetricRead::Purchases),
        }
    }

    async fn resolve_currency(&self) -> Result<String, StoreError> {
        if let Some(code) = &self.currency {
            return Ok(code.clone());
        }
        let code = self.store.currency().await?;
        Ok(code.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()))
    }
}
