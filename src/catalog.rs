//! Order statuses and the fixed metric catalog.
//!
//! Every status maps to one route slug and one stored status value. Every
//! metric maps to one wire key; the order of [`Metric::ALL`] is the order in
//! which metrics appear in a response.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Order Status
// ============================================================================

/// Order status a statistics endpoint is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderStatus {
    Completed,
    Refunded,
    Pending,
    Processing,
    OnHold,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Completed,
        OrderStatus::Refunded,
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::OnHold,
        OrderStatus::Cancelled,
    ];

    /// Path segment of the endpoint serving this status.
    pub fn slug(self) -> &'static str {
        match self {
            OrderStatus::Completed => "completed",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Value of the `status` column in the order stats table.
    pub fn stored_value(self) -> &'static str {
        match self {
            OrderStatus::Completed => "wc-completed",
            OrderStatus::Refunded => "wc-refunded",
            OrderStatus::Pending => "wc-pending",
            OrderStatus::Processing => "wc-processing",
            OrderStatus::OnHold => "wc-on-hold",
            OrderStatus::Cancelled => "wc-cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Returned when a route slug names no known status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.slug() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ============================================================================
// Metric Catalog
// ============================================================================

/// One entry of the fixed metric catalog.
///
/// The derived ordering follows declaration order, which is the response order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Today,
    ThisMonth,
    ThisYear,
    Last7Days,
    Last28Days,
    LastMonth,
    Last3Months,
    LastYear,
    AllTime,
    Range,
    Customers,
}

impl Metric {
    pub const ALL: [Metric; 11] = [
        Metric::Today,
        Metric::ThisMonth,
        Metric::ThisYear,
        Metric::Last7Days,
        Metric::Last28Days,
        Metric::LastMonth,
        Metric::Last3Months,
        Metric::LastYear,
        Metric::AllTime,
        Metric::Range,
        Metric::Customers,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::Today => "today",
            Metric::ThisMonth => "this_month",
            Metric::ThisYear => "this_year",
            Metric::Last7Days => "last_7_days",
            Metric::Last28Days => "last_28_days",
            Metric::LastMonth => "last_month",
            Metric::Last3Months => "last_3_months",
            Metric::LastYear => "last_year",
            Metric::AllTime => "all_time",
            Metric::Range => "range",
            Metric::Customers => "customers",
        }
    }

    pub fn from_key(key: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|metric| metric.key() == key)
    }

    /// Single summed value rather than a series or a list.
    pub fn is_total(self) -> bool {
        matches!(self, Metric::Today | Metric::AllTime)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ============================================================================
// Metric Selection
// ============================================================================

/// Metrics requested for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricSelection {
    /// No usable filter was given; the whole catalog is computed.
    All,
    /// Non-empty subset of the catalog named by the caller.
    Only(BTreeSet<Metric>),
}

impl MetricSelection {
    pub fn contains(&self, metric: Metric) -> bool {
        match self {
            MetricSelection::All => true,
            MetricSelection::Only(set) => set.contains(&metric),
        }
    }

    /// Selected metrics in catalog order.
    pub fn metrics(&self) -> Vec<Metric> {
        match self {
            MetricSelection::All => Metric::ALL.to_vec(),
            MetricSelection::Only(set) => set.iter().copied().collect(),
        }
    }

    /// Whether `metric` was named by the caller, as opposed to implied by `All`.
    pub fn is_explicit(&self, metric: Metric) -> bool {
        matches!(self, MetricSelection::Only(set) if set.contains(&metric))
    }
}

impl From<BTreeSet<Metric>> for MetricSelection {
    fn from(set: BTreeSet<Metric>) -> Self {
        if set.is_empty() {
            MetricSelection::All
        } else {
            MetricSelection::Only(set)
        }
    }
}

/// Normalize a comma-separated `filter` value.
///
/// Pieces are trimmed, empty and unknown keys are dropped and duplicates
/// collapse. Nothing left means every metric.
pub fn parse_filter(raw: Option<&str>) -> MetricSelection {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .filter_map(Metric::from_key)
        .collect::<BTreeSet<_>>()
        .into()
}
