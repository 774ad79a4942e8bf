//! In-process order facts.
//!
//! Applies the same windows, buckets and ordering as the MySQL store over
//! facts held in memory. Individual operations can be made to fail or stall,
//! and every call is counted.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::catalog::OrderStatus;
use crate::error::StoreError;
use crate::models::{BucketTotal, PurchaseRecord};
use crate::window::{Bucket, TimeWindow};

use super::OrderFactsStore;

/// One row of the order stats table.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFact {
    pub order_id: u64,
    pub customer_id: u64,
    pub status: OrderStatus,
    pub net_total: f64,
    /// Store-local creation time.
    pub date_created: NaiveDateTime,
    pub date_created_gmt: NaiveDateTime,
}

/// Store operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    NetTotal,
    BucketedNetTotals,
    RecentPurchases,
    Currency,
}

#[derive(Default)]
pub struct MemoryFactsStore {
    orders: RwLock<Vec<OrderFact>>,
    customers: RwLock<HashMap<u64, (String, String)>>,
    currency: RwLock<Option<String>>,
    failing: RwLock<HashSet<StoreOperation>>,
    delay: RwLock<Option<Duration>>,
    calls: Mutex<HashMap<StoreOperation, usize>>,
}

impl MemoryFactsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_currency(self, code: impl Into<String>) -> Self {
        *self.currency.write().unwrap_or_else(PoisonError::into_inner) = Some(code.into());
        self
    }

    pub fn add_order(&self, order: OrderFact) {
        self.orders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(order);
    }

    pub fn add_customer(
        &self,
        customer_id: u64,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) {
        self.customers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(customer_id, (first_name.into(), last_name.into()));
    }

    /// Make every later call of `operation` fail as if the database were down.
    pub fn fail(&self, operation: StoreOperation) {
        self.failing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation);
    }

    /// Delay every later call by `delay`.
    pub fn stall(&self, delay: Duration) {
        *self.delay.write().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    pub fn calls(&self, operation: StoreOperation) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    async fn enter(&self, operation: StoreOperation) -> Result<(), StoreError> {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(operation)
            .or_default() += 1;

        let delay = *self.delay.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failing
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&operation);
        if failing {
            return Err(StoreError::Unavailable(format!("{operation:?} is failing")));
        }
        Ok(())
    }

    fn matching(&self, status: OrderStatus, window: &TimeWindow) -> Vec<OrderFact> {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|order| order.status == status && window.contains(order.date_created))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OrderFactsStore for MemoryFactsStore {
    async fn net_total(
        &self,
        status: OrderStatus,
        window: &TimeWindow,
    ) -> Result<Option<f64>, StoreError> {
        self.enter(StoreOperation::NetTotal).await?;
        let orders = self.matching(status, window);
        if orders.is_empty() {
            return Ok(None);
        }
        Ok(Some(orders.iter().map(|order| order.net_total).sum()))
    }

    async fn bucketed_net_totals(
        &self,
        status: OrderStatus,
        window: &TimeWindow,
        bucket: Bucket,
    ) -> Result<Vec<BucketTotal>, StoreError> {
        self.enter(StoreOperation::BucketedNetTotals).await?;

        let mut sums: BTreeMap<String, f64> = BTreeMap::new();
        for order in self.matching(status, window) {
            *sums.entry(bucket.key(order.date_created_gmt)).or_default() += order.net_total;
        }

        Ok(sums
            .into_iter()
            .map(|(bucket, total)| BucketTotal {
                bucket,
                total: Some(total),
            })
            .collect())
    }

    async fn recent_purchases(
        &self,
        status: OrderStatus,
        limit: u32,
    ) -> Result<Vec<PurchaseRecord>, StoreError> {
        self.enter(StoreOperation::RecentPurchases).await?;

        let customers = self
            .customers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut orders = self.matching(status, &TimeWindow::UNBOUNDED);
        orders.sort_by(|a, b| b.order_id.cmp(&a.order_id));

        Ok(orders
            .into_iter()
            .filter_map(|order| {
                let (first, last) = customers.get(&order.customer_id)?;
                Some(PurchaseRecord {
                    name: Some(format!("{first} {last}")),
                    total: order.net_total,
                    date_created: order.date_created,
                })
            })
            .take(limit as usize)
            .collect())
    }

    async fn currency(&self) -> Result<Option<String>, StoreError> {
        self.enter(StoreOperation::Currency).await?;
        Ok(self
            .currency
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
