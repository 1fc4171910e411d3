//! Metric primitives: counters, rates and trends
//!
//! All three are safe for concurrent use from any number of VU tasks.
//! Counters and rates are plain atomics; a trend keeps exact aggregates and a
//! bounded sample reservoir behind a mutex so percentiles can be computed at
//! snapshot time.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;

/// Monotonic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Fraction of samples that were `true`
#[derive(Debug, Default)]
pub struct Rate {
    passes: AtomicU64,
    total: AtomicU64,
}

impl Rate {
    pub fn add(&self, sample: bool) {
        if sample {
            self.passes.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RateSnapshot {
        // Read total first so passes can never exceed it in the snapshot
        let total = self.total.load(Ordering::Relaxed);
        let passes = self.passes.load(Ordering::Relaxed).min(total);
        RateSnapshot {
            passes,
            fails: total - passes,
            rate: if total == 0 {
                0.0
            } else {
                passes as f64 / total as f64
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateSnapshot {
    pub passes: u64,
    pub fails: u64,
    pub rate: f64,
}

/// Samples a trend keeps for percentiles once it has seen more than this many
pub const DEFAULT_TREND_CAPACITY: usize = 10_000;

/// Distribution of millisecond samples
///
/// Count, sum, min and max are exact. Percentiles come from a uniform
/// reservoir of at most `capacity` samples, so memory stays bounded however
/// long the run is.
#[derive(Debug)]
pub struct Trend {
    capacity: usize,
    state: Mutex<TrendState>,
}

#[derive(Debug, Default)]
struct TrendState {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    reservoir: Vec<f64>,
}

impl Default for Trend {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TREND_CAPACITY)
    }
}

impl Trend {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(TrendState::default()),
        }
    }

    pub fn add(&self, value_ms: f64) {
        let mut state = self.state.lock();
        if state.count == 0 {
            state.min = value_ms;
            state.max = value_ms;
        } else {
            state.min = state.min.min(value_ms);
            state.max = state.max.max(value_ms);
        }
        state.count += 1;
        state.sum += value_ms;

        if state.reservoir.len() < self.capacity {
            state.reservoir.push(value_ms);
        } else {
            // Algorithm R: keep the new sample with probability capacity / count
            let slot = rand::rng().random_range(0..state.count);
            if let Some(kept) = state.reservoir.get_mut(slot as usize) {
                *kept = value_ms;
            }
        }
    }

    pub fn count(&self) -> usize {
        self.state.lock().count as usize
    }

    /// Samples currently held for percentile estimation
    pub fn retained(&self) -> usize {
        self.state.lock().reservoir.len()
    }

    pub fn snapshot(&self) -> TrendSnapshot {
        let (count, sum, min, max, mut sorted) = {
            let state = self.state.lock();
            (
                state.count,
                state.sum,
                state.min,
                state.max,
                state.reservoir.clone(),
            )
        };
        if count == 0 {
            return TrendSnapshot::default();
        }
        sorted.sort_by(f64::total_cmp);

        TrendSnapshot {
            count,
            min,
            max,
            avg: sum / count as f64,
            p50: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            p95: percentile(&sorted, 95.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrendSnapshot {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
}

/// Nearest-rank percentile over an ascending, non-empty slice
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
