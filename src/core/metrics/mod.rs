//! Process-wide metrics aggregation
//!
//! A single [`MetricsAggregator`] is shared (behind an `Arc`) by every VU of
//! every scenario and passed explicitly to each action. All updates are
//! lock-free atomics except trend samples, which take a short mutex.
//!
//! Exported channel names:
//! `errors`, `errorCounter`, `loginFailureCounter`, `LoginResponseTime`,
//! `cartFailureCounter`, `CartResponseTime`, `PageResponseTime`,
//! `AssetResponseTime` and `response_cached`.

mod primitives;
pub mod sink;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

pub use primitives::{Counter, Rate, RateSnapshot, Trend, TrendSnapshot};
pub use sink::{JsonFileSink, LogSink, MetricsSink};

use super::classifier::{self, ContentCategory, MetricRecord};
use super::http::Exchange;
use crate::errors::IterationError;

/// Shared metrics for a whole run
#[derive(Debug)]
pub struct MetricsAggregator {
    errors: Rate,
    error_count: Counter,
    login_failures: Counter,
    login_time: Trend,
    cart_failures: Counter,
    cart_time: Trend,
    page_time: Trend,
    asset_time: Trend,
    response_cached: Rate,

    /// Object Cache Pro values reported in page comments, keyed by metric name
    object_cache: DashMap<String, Trend>,

    /// Iteration outcomes per scenario name
    scenarios: DashMap<String, IterationCounters>,

    started: Instant,
}

#[derive(Debug, Default)]
struct IterationCounters {
    completed: AtomicU64,
    aborted: AtomicU64,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            errors: Rate::default(),
            error_count: Counter::default(),
            login_failures: Counter::default(),
            login_time: Trend::default(),
            cart_failures: Counter::default(),
            cart_time: Trend::default(),
            page_time: Trend::default(),
            asset_time: Trend::default(),
            response_cached: Rate::default(),
            object_cache: DashMap::new(),
            scenarios: DashMap::new(),
            started: Instant::now(),
        }
    }

    // =========================================================================
    // Exchange outcomes
    // =========================================================================

    /// Record a successful exchange
    ///
    /// Adds a success sample to the error rate, the cache-hit verdict to
    /// `response_cached`, and the duration to the page or asset trend.
    pub fn record(&self, exchange: &Exchange) -> MetricRecord {
        let record = self.observe(exchange);
        self.errors.add(false);
        record
    }

    /// Record a fatal failure and hand the error back for propagation
    ///
    /// Always adds a failure sample and bumps `errorCounter`. The caller must
    /// return the error, which aborts the current iteration.
    #[must_use = "the returned error must be propagated to abort the iteration"]
    pub fn record_error(&self, err: IterationError) -> IterationError {
        self.errors.add(true);
        self.error_count.add(1);
        debug!(error = %err, "iteration failure recorded");
        err
    }

    /// Record an exchange whose failure does not abort anything
    ///
    /// Used where a status is only sampled into the error rate; `errorCounter`
    /// is left alone.
    pub fn record_soft(&self, exchange: &Exchange, is_error: bool) -> MetricRecord {
        let record = self.observe(exchange);
        self.errors.add(is_error);
        record
    }

    /// Fail with [`IterationError::UnexpectedStatus`] unless the status matches
    pub fn expect_status(&self, exchange: &Exchange, expected: u16) -> Result<(), IterationError> {
        if exchange.status == expected {
            return Ok(());
        }
        Err(self.record_error(IterationError::UnexpectedStatus {
            url: exchange.url.clone(),
            expected,
            actual: exchange.status,
        }))
    }

    fn observe(&self, exchange: &Exchange) -> MetricRecord {
        let record = classifier::classify(exchange, exchange.status);
        self.response_cached.add(record.is_cache_hit);
        match record.category {
            ContentCategory::Page => self.page_time.add(record.duration_ms()),
            ContentCategory::Asset => self.asset_time.add(record.duration_ms()),
        }
        record
    }

    // =========================================================================
    // Login and cart channels
    // =========================================================================

    pub fn record_login_failure(&self) {
        self.login_failures.add(1);
    }

    pub fn record_login_time(&self, exchange: &Exchange) {
        self.login_time.add(exchange.duration_ms());
    }

    pub fn record_cart_failure(&self) {
        self.cart_failures.add(1);
    }

    pub fn record_cart_time(&self, exchange: &Exchange) {
        self.cart_time.add(exchange.duration_ms());
    }

    /// Add the numeric values of an object-cache comment
    pub fn record_object_cache(&self, metrics: &HashMap<String, String>) {
        for (name, value) in metrics {
            if let Ok(value) = value.parse::<f64>() {
                self.object_cache
                    .entry(name.clone())
                    .or_default()
                    .add(value);
            }
        }
    }

    // =========================================================================
    // Iterations
    // =========================================================================

    pub fn record_iteration(&self, scenario: &str, completed: bool) {
        let counters = self.scenarios.entry(scenario.to_string()).or_default();
        if completed {
            counters.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.aborted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.value()
    }

    pub fn login_failures(&self) -> u64 {
        self.login_failures.value()
    }

    pub fn cart_failures(&self) -> u64 {
        self.cart_failures.value()
    }

    /// Point-in-time copy of every channel
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            errors: self.errors.snapshot(),
            error_counter: self.error_count.value(),
            login_failure_counter: self.login_failures.value(),
            login_response_time: self.login_time.snapshot(),
            cart_failure_counter: self.cart_failures.value(),
            cart_response_time: self.cart_time.snapshot(),
            page_response_time: self.page_time.snapshot(),
            asset_response_time: self.asset_time.snapshot(),
            response_cached: self.response_cached.snapshot(),
            object_cache: self
                .object_cache
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().snapshot()))
                .collect(),
            scenarios: self
                .scenarios
                .iter()
                .map(|entry| {
                    let counters = entry.value();
                    (
                        entry.key().clone(),
                        ScenarioSnapshot {
                            completed: counters.completed.load(Ordering::Relaxed),
                            aborted: counters.aborted.load(Ordering::Relaxed),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Serializable summary of a run
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub elapsed_secs: f64,
    pub errors: RateSnapshot,
    #[serde(rename = "errorCounter")]
    pub error_counter: u64,
    #[serde(rename = "loginFailureCounter")]
    pub login_failure_counter: u64,
    #[serde(rename = "LoginResponseTime")]
    pub login_response_time: TrendSnapshot,
    #[serde(rename = "cartFailureCounter")]
    pub cart_failure_counter: u64,
    #[serde(rename = "CartResponseTime")]
    pub cart_response_time: TrendSnapshot,
    #[serde(rename = "PageResponseTime")]
    pub page_response_time: TrendSnapshot,
    #[serde(rename = "AssetResponseTime")]
    pub asset_response_time: TrendSnapshot,
    pub response_cached: RateSnapshot,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub object_cache: BTreeMap<String, TrendSnapshot>,
    pub scenarios: BTreeMap<String, ScenarioSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioSnapshot {
    pub completed: u64,
    pub aborted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};
    use std::sync::Arc;
    use std::time::Duration;

    fn exchange(status: u16, content_type: &'static str, cache: Option<&'static str>) -> Exchange {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static(content_type));
        if let Some(value) = cache {
            headers.insert("cf-cache-status", HeaderValue::from_static(value));
        }
        Exchange::new(
            "https://example.com/",
            status,
            headers,
            "",
            Duration::from_millis(12),
        )
    }

    #[test]
    fn test_record_splits_pages_and_assets() {
        let metrics = MetricsAggregator::new();
        metrics.record(&exchange(200, "text/html", Some("HIT")));
        metrics.record(&exchange(200, "text/css", None));
        metrics.record(&exchange(200, "image/png", None));

        let snap = metrics.snapshot();
        assert_eq!(snap.page_response_time.count, 1);
        assert_eq!(snap.asset_response_time.count, 2);
        assert_eq!(snap.errors.passes, 0);
        assert_eq!(snap.errors.fails, 3);
        assert_eq!(snap.response_cached.passes, 1);
    }

    #[test]
    fn test_expect_status_records_error() {
        let metrics = MetricsAggregator::new();
        let err = metrics
            .expect_status(&exchange(503, "text/html", None), 200)
            .unwrap_err();

        assert!(matches!(
            err,
            IterationError::UnexpectedStatus {
                expected: 200,
                actual: 503,
                ..
            }
        ));
        assert_eq!(metrics.error_count(), 1);
        assert_eq!(metrics.snapshot().errors.passes, 1);
    }

    #[test]
    fn test_expect_status_ok_records_nothing() {
        let metrics = MetricsAggregator::new();
        metrics
            .expect_status(&exchange(200, "text/html", None), 200)
            .unwrap();
        assert_eq!(metrics.error_count(), 0);
        assert_eq!(metrics.snapshot().errors.fails, 0);
    }

    #[test]
    fn test_record_soft() {
        let metrics = MetricsAggregator::new();
        metrics.record_soft(&exchange(500, "text/html", None), true);
        metrics.record_soft(&exchange(200, "text/html", None), false);

        let snap = metrics.snapshot();
        assert_eq!(snap.errors.passes, 1);
        assert_eq!(snap.errors.fails, 1);
        assert_eq!(snap.error_counter, 0);
        assert_eq!(snap.page_response_time.count, 2);
    }

    #[test]
    fn test_object_cache_ignores_non_numeric() {
        let metrics = MetricsAggregator::new();
        let values: HashMap<String, String> = [
            ("hits".to_string(), "12".to_string()),
            ("bogus".to_string(), "1.2.3".to_string()),
        ]
        .into();
        metrics.record_object_cache(&values);

        let snap = metrics.snapshot();
        assert_eq!(snap.object_cache.len(), 1);
        assert_eq!(snap.object_cache["hits"].max, 12.0);
    }

    #[test]
    fn test_iteration_counters_per_scenario() {
        let metrics = MetricsAggregator::new();
        metrics.record_iteration("buyer", true);
        metrics.record_iteration("buyer", false);
        metrics.record_iteration("browser", true);

        let snap = metrics.snapshot();
        assert_eq!(
            snap.scenarios["buyer"],
            ScenarioSnapshot {
                completed: 1,
                aborted: 1
            }
        );
        assert_eq!(snap.scenarios["browser"].completed, 1);
    }

    #[tokio::test]
    async fn test_concurrent_recording() {
        let metrics = Arc::new(MetricsAggregator::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let metrics = Arc::clone(&metrics);
            handles.push(tokio::spawn(async move {
                for _ in 0..500 {
                    metrics.record(&exchange(200, "text/html", None));
                    let _ = metrics.record_error(IterationError::CartFailed("concurrent".to_string()));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.page_response_time.count, 8_000);
        assert_eq!(snap.error_counter, 8_000);
        assert_eq!(snap.errors.passes + snap.errors.fails, 16_000);
    }

    #[test]
    fn test_snapshot_serializes_channel_names() {
        let json = serde_json::to_value(MetricsAggregator::new().snapshot()).unwrap();
        assert!(json.get("errorCounter").is_some());
        assert!(json.get("PageResponseTime").is_some());
        assert!(json.get("response_cached").is_some());
        assert!(json.get("object_cache").is_none());
    }
}
