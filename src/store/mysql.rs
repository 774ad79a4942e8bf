//! WooCommerce order facts read from MySQL.
//!
//! Reads `{prefix}wc_order_stats`, `{prefix}wc_customer_lookup` and
//! `{prefix}options`. Statuses, bounds and limits are always bound as
//! parameters; only the validated table prefix is formatted into SQL.

use async_trait::async_trait;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::debug;

use crate::catalog::OrderStatus;
use crate::error::StoreError;
use crate::models::{BucketTotal, PurchaseRecord};
use crate::window::{Bucket, LowerBound, TimeWindow};

use super::OrderFactsStore;

/// Option holding the shop currency.
const CURRENCY_OPTION: &str = "woocommerce_currency";

pub struct MySqlFactsStore {
    pool: MySqlPool,
    queries: StatsQueries,
}

impl MySqlFactsStore {
    /// `table_prefix` must already be validated as an SQL identifier fragment.
    pub fn new(pool: MySqlPool, table_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            queries: StatsQueries::new(table_prefix),
        }
    }
}

/// SQL text for every read, with the table prefix applied.
#[derive(Debug, Clone)]
struct StatsQueries {
    table_prefix: String,
}

impl StatsQueries {
    fn new(table_prefix: impl Into<String>) -> Self {
        Self {
            table_prefix: table_prefix.into(),
        }
    }

    fn table(&self, name: &str) -> String {
        format!("`{}{}`", self.table_prefix, name)
    }

    fn net_total(&self, status: OrderStatus, window: &TimeWindow) -> QueryBuilder<'static, MySql> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT SUM(os.net_total) FROM {} os",
            self.table("wc_order_stats")
        ));
        push_filters(&mut builder, status, window);
        builder
    }

    fn bucketed_net_totals(
        &self,
        status: OrderStatus,
        window: &TimeWindow,
        bucket: Bucket,
    ) -> QueryBuilder<'static, MySql> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT DATE_FORMAT(os.date_created_gmt, '{}') AS bucket, SUM(os.net_total) AS total FROM {} os",
            bucket.sql_format(),
            self.table("wc_order_stats")
        ));
        push_filters(&mut builder, status, window);
        builder.push(" AND os.date_created_gmt IS NOT NULL GROUP BY bucket ORDER BY bucket");
        builder
    }

    fn recent_purchases(&self) -> String {
        format!(
            "SELECT CONCAT(cl.first_name, ' ', cl.last_name) AS name, os.net_total AS total, os.date_created \
             FROM {} os JOIN {} cl ON cl.customer_id = os.customer_id \
             WHERE os.status = ? ORDER BY os.order_id DESC LIMIT ?",
            self.table("wc_order_stats"),
            self.table("wc_customer_lookup")
        )
    }

    fn currency(&self) -> String {
        format!(
            "SELECT option_value FROM {} WHERE option_name = ? LIMIT 1",
            self.table("options")
        )
    }
}

fn push_filters(builder: &mut QueryBuilder<'static, MySql>, status: OrderStatus, window: &TimeWindow) {
    builder
        .push(" WHERE os.status = ")
        .push_bind(status.stored_value());

    match window.lower {
        Some(LowerBound::Inclusive(at)) => {
            builder.push(" AND os.date_created >= ").push_bind(at);
        }
        Some(LowerBound::Exclusive(at)) => {
            builder.push(" AND os.date_created > ").push_bind(at);
        }
        None => {}
    }
    if let Some(upper) = window.upper {
        builder.push(" AND os.date_created < ").push_bind(upper);
    }
}

#[async_trait]
impl OrderFactsStore for MySqlFactsStore {
    async fn net_total(
        &self,
        status: OrderStatus,
        window: &TimeWindow,
    ) -> Result<Option<f64>, StoreError> {
        let mut builder = self.queries.net_total(status, window);

        debug!(status = %status, sql = builder.sql(), "Summing net totals");
        let total = builder
            .build_query_scalar::<Option<f64>>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn bucketed_net_totals(
        &self,
        status: OrderStatus,
        window: &TimeWindow,
        bucket: Bucket,
    ) -> Result<Vec<BucketTotal>, StoreError> {
        let mut builder = self.queries.bucketed_net_totals(status, window, bucket);

        debug!(status = %status, sql = builder.sql(), "Summing bucketed net totals");
        let rows = builder
            .build_query_as::<BucketTotal>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn recent_purchases(
        &self,
        status: OrderStatus,
        limit: u32,
    ) -> Result<Vec<PurchaseRecord>, StoreError> {
        let sql = self.queries.recent_purchases();
        let rows = sqlx::query_as::<_, PurchaseRecord>(&sql)
            .bind(status.stored_value())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn currency(&self) -> Result<Option<String>, StoreError> {
        let sql = self.queries.currency();
        let value: Option<String> = sqlx::query_scalar(&sql)
            .bind(CURRENCY_OPTION)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.filter(|code| !code.trim().is_empty()))
    }
}
