//! HTTP route modules for the statistics service.
//!
//! - `stats`: one endpoint per order status under `/wc-statistic/v1`
//! - `access`: access policy applied to the statistics endpoints

pub mod access;
pub mod stats;
