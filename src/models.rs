//! Request, result and row models for the statistics service.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::catalog::{parse_filter, Metric, MetricSelection, OrderStatus};
use crate::error::StatsError;
use crate::window::DateRange;

/// Customers listed when `customers_per_page` is absent.
pub const DEFAULT_CUSTOMER_LIMIT: u32 = 5;

// ============================================================================
// Database Rows (sqlx::FromRow)
// ============================================================================

/// One bucket of a grouped sum.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct BucketTotal {
    pub bucket: String,
    pub total: Option<f64>,
}

/// An order joined with the identity of the customer who placed it.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PurchaseRecord {
    pub name: Option<String>,
    pub total: f64,
    pub date_created: NaiveDateTime,
}

// ============================================================================
// Request Models
// ============================================================================

/// Integer parameter that may arrive as a JSON number or as text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CountParam {
    Number(i64),
    Text(String),
}

impl CountParam {
    /// Absolute integer value; text that is not an integer counts as zero.
    pub fn absolute(&self) -> u64 {
        match self {
            CountParam::Number(n) => n.unsigned_abs(),
            CountParam::Text(s) => s.trim().parse::<i64>().map_or(0, i64::unsigned_abs),
        }
    }
}

/// Parameters accepted by every statistics endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatsParams {
    pub customers_per_page: Option<CountParam>,
    pub filter: Option<String>,
    pub between: Option<String>,
}

impl StatsParams {
    /// Fold decoded `key=value` pairs; a repeated key keeps its last value
    /// and unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> StatsParams
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = StatsParams::default();
        for (key, value) in pairs {
            match key.as_str() {
                "customers_per_page" => params.customers_per_page = Some(CountParam::Text(value)),
                "filter" => params.filter = Some(value),
                "between" => params.between = Some(value),
                _ => {}
            }
        }
        params
    }

    /// Fields set in `other` replace the ones in `self`.
    pub fn merged_with(self, other: StatsParams) -> StatsParams {
        StatsParams {
            customers_per_page: other.customers_per_page.or(self.customers_per_page),
            filter: other.filter.or(self.filter),
            between: other.between.or(self.between),
        }
    }
}

/// Validated input of one statistics call.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRequest {
    pub status: OrderStatus,
    pub metrics: MetricSelection,
    pub customer_limit: u32,
    pub range: Option<DateRange>,
}

impl StatsRequest {
    pub fn new(status: OrderStatus) -> Self {
        Self {
            status,
            metrics: MetricSelection::All,
            customer_limit: DEFAULT_CUSTOMER_LIMIT,
            range: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricSelection) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_customer_limit(mut self, limit: u32) -> Self {
        self.customer_limit = limit;
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Normalize wire parameters.
    ///
    /// `between` is only looked at when `range` is part of the selection.
    pub fn from_params(
        status: OrderStatus,
        params: &StatsParams,
        max_customers: u32,
    ) -> Result<Self, StatsError> {
        let metrics = parse_filter(params.filter.as_deref());

        let customer_limit = params
            .customers_per_page
            .as_ref()
            .map_or(u64::from(DEFAULT_CUSTOMER_LIMIT), CountParam::absolute)
            .min(u64::from(max_customers)) as u32;

        let range = match params.between.as_deref() {
            Some(raw) if metrics.contains(Metric::Range) => Some(parse_between(raw)?),
            _ => None,
        };

        if range.is_none() && metrics.is_explicit(Metric::Range) {
            return Err(StatsError::invalid_range(
                "`range` requires `between` with two dates",
            ));
        }

        Ok(Self {
            status,
            metrics,
            customer_limit,
            range,
        })
    }
}

/// Parse a comma-separated pair of dates. Bounds are kept in the given order.
pub fn parse_between(raw: &str) -> Result<DateRange, StatsError> {
    let bounds: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect();

    let [start, end, ..] = bounds.as_slice() else {
        return Err(StatsError::invalid_range(format!(
            "expected two comma-separated dates, got {raw:?}"
        )));
    };

    Ok(DateRange {
        start: parse_date(start)?,
        end: parse_date(end)?,
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, StatsError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .map_err(|_| StatsError::invalid_range(format!("{raw:?} is not a calendar date")))
}

// ============================================================================
// Result Models
// ============================================================================

/// A recent purchase as listed under `customers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerPurchase {
    pub name: String,
    pub date: String,
    pub amount: f64,
    pub currency: String,
}

impl CustomerPurchase {
    pub fn from_record(record: PurchaseRecord, currency: &str) -> Self {
        Self {
            name: record.name.unwrap_or_default().trim().to_string(),
            date: record.date_created.format("%Y-%m-%d %H:%M:%S").to_string(),
            amount: record.total,
            currency: currency.to_string(),
        }
    }
}

/// Value of one metric in a [`StatsResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Total(f64),
    /// Bucket key to summed net total, ascending by key.
    Series(BTreeMap<String, f64>),
    Customers(Vec<CustomerPurchase>),
}

impl MetricValue {
    /// Value reported when the metric's query yields nothing.
    pub fn empty(metric: Metric) -> Self {
        match metric {
            Metric::Customers => MetricValue::Customers(Vec::new()),
            m if m.is_total() => MetricValue::Total(0.0),
            _ => MetricValue::Series(BTreeMap::new()),
        }
    }
}

/// Assembled output of one statistics call.
///
/// Serializes as a flat object: one key per requested metric in catalog
/// order, then `currency`, then `return` (the has-data flag).
#[derive(Debug, Clone, PartialEq)]
pub struct StatsResult {
    values: BTreeMap<Metric, MetricValue>,
    currency: String,
    has_data: bool,
}

impl StatsResult {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            values: BTreeMap::new(),
            currency: currency.into(),
            has_data: false,
        }
    }

    /// Record a metric's value; `found` marks a non-empty query result.
    pub fn insert(&mut self, metric: Metric, value: MetricValue, found: bool) {
        self.values.insert(metric, value);
        self.has_data |= found;
    }

    pub fn get(&self, metric: Metric) -> Option<&MetricValue> {
        self.values.get(&metric)
    }

    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.values.keys().copied()
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn has_data(&self) -> bool {
        self.has_data
    }
}

impl Serialize for StatsResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 2))?;
        for (metric, value) in &self.values {
            map.serialize_entry(metric.key(), value)?;
        }
        map.serialize_entry("currency", &self.currency)?;
        map.serialize_entry("return", &self.has_data)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(filter: &str, between: Option<&str>) -> StatsParams {
        StatsParams {
            customers_per_page: None,
            filter: Some(filter.to_string()),
            between: between.map(str::to_string),
        }
    }

    #[test]
    fn test_customer_limit_uses_absolute_integer_semantics() {
        let limit = |value: CountParam| {
            let params = StatsParams {
                customers_per_page: Some(value),
                ..Default::default()
            };
            StatsRequest::from_params(OrderStatus::Completed, &params, 100)
                .unwrap()
                .customer_limit
        };

        assert_eq!(limit(CountParam::Text("7".into())), 7);
        assert_eq!(limit(CountParam::Number(-3)), 3);
        assert_eq!(limit(CountParam::Text("abc".into())), 0);
        assert_eq!(limit(CountParam::Number(5000)), 100);

        let defaults =
            StatsRequest::from_params(OrderStatus::Completed, &StatsParams::default(), 100)
                .unwrap();
        assert_eq!(defaults.customer_limit, DEFAULT_CUSTOMER_LIMIT);
        assert_eq!(defaults.metrics, MetricSelection::All);
    }

    #[test]
    fn test_explicit_range_requires_two_dates() {
        let missing = StatsRequest::from_params(OrderStatus::Completed, &params("range", None), 10);
        assert!(matches!(missing, Err(StatsError::InvalidRange(_))));

        let single = StatsRequest::from_params(
            OrderStatus::Completed,
            &params("range", Some("2024-01-01,")),
            10,
        );
        assert!(matches!(single, Err(StatsError::InvalidRange(_))));

        let garbage = StatsRequest::from_params(
            OrderStatus::Completed,
            &params("range", Some("2024-01-01,yesterday")),
            10,
        );
        assert!(matches!(garbage, Err(StatsError::InvalidRange(_))));

        let ok = StatsRequest::from_params(
            OrderStatus::Completed,
            &params("range", Some(" 2024-01-01 , 2024-01-31 ")),
            10,
        )
        .unwrap();
        assert_eq!(
            ok.range,
            Some(DateRange {
                start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            })
        );
    }

    #[test]
    fn test_between_is_ignored_unless_range_is_selected() {
        let request = StatsRequest::from_params(
            OrderStatus::Completed,
            &params("today", Some("not,dates")),
            10,
        )
        .unwrap();
        assert_eq!(request.range, None);

        let implied =
            StatsRequest::from_params(OrderStatus::Completed, &StatsParams::default(), 10);
        assert!(implied.is_ok());
    }

    #[test]
    fn test_body_params_override_query_params() {
        let query = StatsParams {
            customers_per_page: Some(CountParam::Number(2)),
            filter: Some("today".into()),
            between: None,
        };
        let body = StatsParams {
            filter: Some("all_time".into()),
            ..Default::default()
        };
        let merged = query.merged_with(body);
        assert_eq!(merged.filter.as_deref(), Some("all_time"));
        assert_eq!(merged.customers_per_page, Some(CountParam::Number(2)));
    }

    #[test]
    fn test_repeated_pairs_keep_last_value() {
        let pairs = [
            ("filter", "today"),
            ("customers_per_page", "3"),
            ("page", "2"),
            ("filter", "all_time"),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string()));

        let params = StatsParams::from_pairs(pairs);
        assert_eq!(params.filter.as_deref(), Some("all_time"));
        assert_eq!(params.customers_per_page, Some(CountParam::Text("3".into())));
        assert_eq!(params.between, None);
    }

    #[test]
    fn test_result_serializes_flat_in_catalog_order() {
        let mut result = StatsResult::new("EUR");
        result.insert(Metric::AllTime, MetricValue::Total(25.0), true);
        result.insert(Metric::Today, MetricValue::Total(10.0), true);
        result.insert(Metric::Last7Days, MetricValue::empty(Metric::Last7Days), false);

        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"today":10.0,"last_7_days":{},"all_time":25.0,"currency":"EUR","return":true}"#
        );
    }

    #[test]
    fn test_customer_purchase_from_record() {
        let record = PurchaseRecord {
            name: Some("Ada Lovelace ".into()),
            total: 12.5,
            date_created: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        };
        let purchase = CustomerPurchase::from_record(record, "USD");
        assert_eq!(purchase.name, "Ada Lovelace");
        assert_eq!(purchase.date, "2024-05-01 09:30:00");
        assert_eq!(purchase.currency, "USD");
    }
}
