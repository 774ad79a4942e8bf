//! Read access to the order facts the statistics are computed from.
//!
//! The aggregator only talks to [`OrderFactsStore`]. `mysql` reads the
//! WooCommerce tables directly; `memory` holds facts in process.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;

use crate::catalog::OrderStatus;
use crate::error::StoreError;
use crate::models::{BucketTotal, PurchaseRecord};
use crate::window::{Bucket, TimeWindow};

pub use memory::{MemoryFactsStore, OrderFact, StoreOperation};
pub use mysql::MySqlFactsStore;

/// Queries the aggregator issues. All reads are filtered by one status.
#[async_trait]
pub trait OrderFactsStore: Send + Sync {
    /// Sum of `net_total` over orders whose local creation time is in `window`.
    ///
    /// `None` when no order matched.
    async fn net_total(
        &self,
        status: OrderStatus,
        window: &TimeWindow,
    ) -> Result<Option<f64>, StoreError>;

    /// Sums of `net_total` grouped by `bucket` of the UTC creation time,
    /// ascending by bucket key.
    async fn bucketed_net_totals(
        &self,
        status: OrderStatus,
        window: &TimeWindow,
        bucket: Bucket,
    ) -> Result<Vec<BucketTotal>, StoreError>;

    /// The `limit` most recent orders by order id, with the customer's name.
    async fn recent_purchases(
        &self,
        status: OrderStatus,
        limit: u32,
    ) -> Result<Vec<PurchaseRecord>, StoreError>;

    /// Store-wide currency code, if configured.
    async fn currency(&self) -> Result<Option<String>, StoreError>;
}
