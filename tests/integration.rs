//! # Integration Tests
//!
//! These tests verify the statistics endpoints by sending HTTP requests to
//! a server bound to an ephemeral local port. Orders are served from the
//! in-memory store, so no database is needed.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test
//! ```

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveDateTime, Utc};
    use reqwest::header::CONTENT_TYPE;
    use serde_json::json;

    use wc_statistic::aggregator::StatsAggregator;
    use wc_statistic::catalog::{Metric, OrderStatus};
    use wc_statistic::config::Config;
    use wc_statistic::create_app;
    use wc_statistic::store::{MemoryFactsStore, OrderFact, StoreOperation};

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn order(id: u64, status: OrderStatus, net_total: f64, local: NaiveDateTime) -> OrderFact {
        OrderFact {
            order_id: id,
            customer_id: id,
            status,
            net_total,
            date_created: local,
            date_created_gmt: local,
        }
    }

    /// One completed order today (10.00) and two historical ones (10.00, 5.00).
    fn shop() -> Arc<MemoryFactsStore> {
        let today_noon = Utc::now().date_naive().and_hms_opt(12, 0, 0).unwrap();
        let store = MemoryFactsStore::new().with_currency("EUR");
        store.add_order(order(1, OrderStatus::Completed, 10.0, at(2020, 1, 10, 9)));
        store.add_order(order(2, OrderStatus::Completed, 5.0, at(2021, 3, 5, 17)));
        store.add_order(order(3, OrderStatus::Completed, 10.0, today_noon));
        store.add_order(order(4, OrderStatus::Cancelled, 42.0, at(2021, 3, 6, 8)));
        store.add_customer(1, "Ada", "Lovelace");
        store.add_customer(2, "Alan", "Turing");
        store.add_customer(3, "Grace", "Hopper");
        Arc::new(store)
    }

    async fn spawn_app(store: Arc<MemoryFactsStore>, vars: &[(&str, &str)]) -> String {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::from_lookup(|var| vars.get(var).cloned()).expect("valid config");
        let app = create_app(StatsAggregator::from_config(store, &config), &config);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("listener address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server failed");
        });
        format!("http://{addr}/wc-statistic/v1")
    }

    async fn get_json(url: &str) -> (u16, serde_json::Value) {
        let res = reqwest::Client::new()
            .get(url)
            .send()
            .await
            .expect("Failed to send request");
        let status = res.status().as_u16();
        let body = res.json().await.expect("Failed to parse response");
        (status, body)
    }

    #[tokio::test]
    async fn test_today_and_all_time() {
        let base = spawn_app(shop(), &[]).await;
        let (status, body) =
            get_json(&format!("{base}/completed?filter=today,all_time&customers_per_page=2")).await;

        assert_eq!(status, 200, "Expected 200 OK");
        assert_eq!(
            body,
            json!({"today": 10.0, "all_time": 25.0, "currency": "EUR", "return": true})
        );
    }

    #[tokio::test]
    async fn test_unknown_filter_returns_whole_catalog() {
        let base = spawn_app(shop(), &[]).await;
        let (status, body) = get_json(&format!("{base}/completed?filter=bogus,,")).await;

        assert_eq!(status, 200);
        let object = body.as_object().expect("Response should be an object");
        assert_eq!(object.len(), Metric::ALL.len() + 2);
        for metric in Metric::ALL {
            assert!(object.contains_key(metric.key()), "missing {}", metric.key());
        }
        assert_eq!(body["range"], json!({}));
        assert_eq!(body["customers"].as_array().map(Vec::len), Some(3));
        assert_eq!(body["customers"][0]["name"], "Grace Hopper");
        assert_eq!(body["return"], true);
    }

    #[tokio::test]
    async fn test_range_requires_between() {
        let base = spawn_app(shop(), &[]).await;
        let (status, body) = get_json(&format!("{base}/completed?filter=range")).await;

        assert_eq!(status, 400, "Expected 400 Bad Request");
        assert_eq!(body["error"], "invalid_range");
    }

    #[tokio::test]
    async fn test_range_between_two_dates() {
        let base = spawn_app(shop(), &[]).await;
        let (status, body) = get_json(&format!(
            "{base}/completed?filter=range&between=2021-01-01,2021-12-31"
        ))
        .await;

        assert_eq!(status, 200);
        assert_eq!(
            body,
            json!({
                "range": {"2021-03-05 17:00:00": 5.0},
                "currency": "EUR",
                "return": true
            })
        );
    }

    #[tokio::test]
    async fn test_zero_customers_skips_lookup() {
        let store = shop();
        let base = spawn_app(store.clone(), &[]).await;
        let (status, body) =
            get_json(&format!("{base}/completed?filter=customers&customers_per_page=0")).await;

        assert_eq!(status, 200);
        assert_eq!(body["customers"], json!([]));
        assert_eq!(body["return"], false);
        assert_eq!(store.calls(StoreOperation::RecentPurchases), 0);
    }

    #[tokio::test]
    async fn test_post_body_overrides_query() {
        let base = spawn_app(shop(), &[]).await;
        let res = reqwest::Client::new()
            .post(format!("{base}/cancelled?filter=today"))
            .json(&json!({"filter": "all_time"}))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 200);
        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert_eq!(
            body,
            json!({"all_time": 42.0, "currency": "EUR", "return": true})
        );
    }

    #[tokio::test]
    async fn test_post_form_body_overrides_query() {
        let base = spawn_app(shop(), &[]).await;
        let res = reqwest::Client::new()
            .post(format!("{base}/cancelled?filter=today"))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("filter=all_time")
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 200);
        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert_eq!(
            body,
            json!({"all_time": 42.0, "currency": "EUR", "return": true})
        );
    }

    #[tokio::test]
    async fn test_post_with_unsupported_body_is_rejected() {
        let base = spawn_app(shop(), &[]).await;
        let res = reqwest::Client::new()
            .post(format!("{base}/completed"))
            .header(CONTENT_TYPE, "text/plain")
            .body("filter=today")
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 400, "Expected 400 Bad Request");
        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert_eq!(body["error"], "invalid_body");
    }

    #[tokio::test]
    async fn test_repeated_query_parameter_keeps_last_value() {
        let base = spawn_app(shop(), &[]).await;
        let (status, body) =
            get_json(&format!("{base}/completed?filter=today&filter=all_time")).await;

        assert_eq!(status, 200);
        assert_eq!(
            body,
            json!({"all_time": 25.0, "currency": "EUR", "return": true})
        );
    }

    #[tokio::test]
    async fn test_post_without_body_uses_query() {
        let base = spawn_app(shop(), &[]).await;
        let res = reqwest::Client::new()
            .post(format!("{base}/pending?filter=all_time"))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 200);
        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert_eq!(body, json!({"all_time": 0.0, "currency": "EUR", "return": false}));
    }

    #[tokio::test]
    async fn test_token_policy() {
        let base = spawn_app(shop(), &[("STATS_API_TOKEN", "s3cret")]).await;
        let url = format!("{base}/completed?filter=today");
        let client = reqwest::Client::new();

        let denied = client.get(&url).send().await.expect("Failed to send request");
        assert_eq!(denied.status(), 401, "Expected 401 Unauthorized");

        let wrong = client
            .get(&url)
            .bearer_auth("s3creT")
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(wrong.status(), 401, "Expected 401 for a same-length wrong token");
        let body: serde_json::Value = wrong.json().await.expect("Failed to parse response");
        assert_eq!(body["error"], "unauthorized");

        let allowed = client
            .get(&url)
            .bearer_auth("s3cret")
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(allowed.status(), 200);
    }

    #[tokio::test]
    async fn test_only_configured_routes_are_served() {
        let base = spawn_app(shop(), &[("STATS_ROUTES", "completed")]).await;
        let client = reqwest::Client::new();

        let res = client
            .get(format!("{base}/refunded"))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(res.status(), 404, "Expected 404 Not Found");

        let res = client
            .get(format!("{base}/completed"))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(res.status(), 200);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let store = shop();
        store.fail(StoreOperation::NetTotal);
        let base = spawn_app(store.clone(), &[]).await;
        let (status, body) =
            get_json(&format!("{base}/completed?filter=today,last_year,customers")).await;

        assert_eq!(status, 503, "Expected 503 Service Unavailable");
        assert_eq!(body["error"], "store_unavailable");
        assert_eq!(store.calls(StoreOperation::BucketedNetTotals), 1);
        assert_eq!(store.calls(StoreOperation::RecentPurchases), 1);
    }
}
