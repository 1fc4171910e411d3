//! Metrics export
//!
//! A sink receives the final [`MetricsSnapshot`] of a run. The binary always
//! logs it and optionally writes it as JSON for later comparison.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::info;

use super::MetricsSnapshot;

/// Destination for a run summary
pub trait MetricsSink: Send + Sync {
    fn export(&self, snapshot: &MetricsSnapshot) -> io::Result<()>;
}

/// Logs the headline numbers through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn export(&self, snapshot: &MetricsSnapshot) -> io::Result<()> {
        info!(
            elapsed_secs = snapshot.elapsed_secs,
            error_rate = snapshot.errors.rate,
            errors = snapshot.error_counter,
            login_failures = snapshot.login_failure_counter,
            cart_failures = snapshot.cart_failure_counter,
            cache_hit_rate = snapshot.response_cached.rate,
            "Run summary"
        );
        info!(
            count = snapshot.page_response_time.count,
            avg_ms = snapshot.page_response_time.avg,
            p95_ms = snapshot.page_response_time.p95,
            "PageResponseTime"
        );
        info!(
            count = snapshot.asset_response_time.count,
            avg_ms = snapshot.asset_response_time.avg,
            p95_ms = snapshot.asset_response_time.p95,
            "AssetResponseTime"
        );
        if snapshot.login_response_time.count > 0 {
            info!(
                count = snapshot.login_response_time.count,
                avg_ms = snapshot.login_response_time.avg,
                p95_ms = snapshot.login_response_time.p95,
                "LoginResponseTime"
            );
        }
        if snapshot.cart_response_time.count > 0 {
            info!(
                count = snapshot.cart_response_time.count,
                avg_ms = snapshot.cart_response_time.avg,
                p95_ms = snapshot.cart_response_time.p95,
                "CartResponseTime"
            );
        }
        for (name, stats) in &snapshot.scenarios {
            info!(
                scenario = %name,
                completed = stats.completed,
                aborted = stats.aborted,
                "Scenario iterations"
            );
        }
        Ok(())
    }
}

/// Writes the snapshot as pretty-printed JSON
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MetricsSink for JsonFileSink {
    fn export(&self, snapshot: &MetricsSnapshot) -> io::Result<()> {
        let json = serde_json::to_string_pretty(snapshot).map_err(io::Error::other)?;
        fs::write(&self.path, json)?;
        info!(path = %self.path.display(), "Summary exported");
        Ok(())
    }
}
