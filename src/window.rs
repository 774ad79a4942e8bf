//! Time windows and bucketing for each metric.
//!
//! Windows filter on the store-local order timestamp (`date_created`), while
//! bucket keys are derived from the UTC timestamp (`date_created_gmt`). Orders
//! near midnight can therefore land in a window under one date and be
//! reported under the neighbouring one.

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime};

use crate::catalog::Metric;

/// Lower edge of a [`TimeWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowerBound {
    Inclusive(NaiveDateTime),
    Exclusive(NaiveDateTime),
}

/// Window over local order timestamps. The upper edge is always exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub lower: Option<LowerBound>,
    pub upper: Option<NaiveDateTime>,
}

impl TimeWindow {
    pub const UNBOUNDED: TimeWindow = TimeWindow {
        lower: None,
        upper: None,
    };

    /// Every local timestamp falling on a date in `start..=end`.
    pub fn dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            lower: Some(LowerBound::Inclusive(midnight(start))),
            upper: end.succ_opt().map(midnight),
        }
    }

    fn after(date: NaiveDate) -> Self {
        Self {
            lower: Some(LowerBound::Exclusive(midnight(date))),
            upper: None,
        }
    }

    fn since(date: NaiveDate) -> Self {
        Self {
            lower: Some(LowerBound::Inclusive(midnight(date))),
            upper: None,
        }
    }

    fn between(start: NaiveDate, end_exclusive: Option<NaiveDate>) -> Self {
        Self {
            lower: Some(LowerBound::Inclusive(midnight(start))),
            upper: end_exclusive.map(midnight),
        }
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let above = match self.lower {
            None => true,
            Some(LowerBound::Inclusive(lower)) => at >= lower,
            Some(LowerBound::Exclusive(lower)) => at > lower,
        };
        above && self.upper.map_or(true, |upper| at < upper)
    }
}

/// Granularity of a series key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Day,
    Month,
    /// One entry per distinct order timestamp.
    Timestamp,
}

impl Bucket {
    /// `chrono` format string of the key.
    pub fn format(self) -> &'static str {
        match self {
            Bucket::Day => "%Y-%m-%d",
            Bucket::Month => "%Y-%m",
            Bucket::Timestamp => "%Y-%m-%d %H:%M:%S",
        }
    }

    /// MySQL `DATE_FORMAT` equivalent of [`Bucket::format`].
    pub fn sql_format(self) -> &'static str {
        match self {
            Bucket::Day => "%Y-%m-%d",
            Bucket::Month => "%Y-%m",
            Bucket::Timestamp => "%Y-%m-%d %H:%i:%s",
        }
    }

    pub fn key(self, at_gmt: NaiveDateTime) -> String {
        at_gmt.format(self.format()).to_string()
    }
}

/// Inclusive pair of calendar dates supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// What a metric reads from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricQuery {
    /// One summed value over the window.
    Total(TimeWindow),
    /// Sums grouped by bucket over the window.
    Series(TimeWindow, Bucket),
    /// Most recent purchases with customer identity.
    Customers,
}

/// Resolve the store query for `metric` relative to the local date `today`.
///
/// Returns `None` only for [`Metric::Range`] without a date range.
pub fn plan(metric: Metric, today: NaiveDate, range: Option<&DateRange>) -> Option<MetricQuery> {
    let query = match metric {
        Metric::Today => MetricQuery::Total(TimeWindow::between(today, today.succ_opt())),
        Metric::AllTime => MetricQuery::Total(TimeWindow::UNBOUNDED),
        Metric::Last7Days => MetricQuery::Series(
            TimeWindow::after(days_before(today, 7)),
            Bucket::Day,
        ),
        Metric::Last28Days => MetricQuery::Series(
            TimeWindow::since(days_before(today, 28)),
            Bucket::Day,
        ),
        Metric::LastMonth => MetricQuery::Series(
            TimeWindow::after(months_before(today, 1)),
            Bucket::Day,
        ),
        Metric::Last3Months => MetricQuery::Series(
            TimeWindow::after(months_before(today, 3)),
            Bucket::Month,
        ),
        Metric::LastYear => {
            let this_year = year_start(today.year()).unwrap_or(today);
            let last_year = year_start(today.year() - 1).unwrap_or(NaiveDate::MIN);
            MetricQuery::Series(
                TimeWindow::between(last_year, Some(this_year)),
                Bucket::Day,
            )
        }
        Metric::ThisYear => {
            let start = year_start(today.year()).unwrap_or(today);
            MetricQuery::Series(
                TimeWindow::between(start, year_start(today.year() + 1)),
                Bucket::Day,
            )
        }
        Metric::ThisMonth => {
            let start = today.with_day(1).unwrap_or(today);
            MetricQuery::Series(
                TimeWindow::between(start, start.checked_add_months(Months::new(1))),
                Bucket::Day,
            )
        }
        Metric::Range => {
            let range = range?;
            MetricQuery::Series(TimeWindow::dates(range.start, range.end), Bucket::Timestamp)
        }
        Metric::Customers => MetricQuery::Customers,
    };
    Some(query)
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn year_start(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

fn months_before(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months)).unwrap_or(NaiveDate::MIN)
}
