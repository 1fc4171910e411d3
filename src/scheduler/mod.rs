//! Scenario scheduler
//!
//! Every scenario gets a controller task that, once per tick, compares the
//! number of running VU workers with its ramp schedule and spawns or retires
//! workers to match. Scenarios ramp independently and share only the
//! metrics aggregator.
//!
//! A worker runs iterations back to back until it is retired. Each iteration
//! gets a fresh [`VirtualUser`]; a failed iteration is counted and the next
//! one starts immediately. A retired worker finishes its current iteration
//! unless the scenario's graceful-stop window runs out first, in which case
//! the iteration is interrupted.

pub mod ramp;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

pub use ramp::{RampSchedule, RampStage, RampStageYaml};

use crate::core::{AssetRetention, MetricsAggregator, SiteContext, VirtualUser};
use crate::scenarios::Behavior;

/// How often controllers re-evaluate the target population
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// A named, independently ramping population
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub name: String,
    pub behavior: Arc<dyn Behavior>,
    pub schedule: RampSchedule,
    /// How long a retired VU may keep running its current iteration
    pub graceful_stop: Duration,
}

impl ScenarioConfig {
    pub fn new(name: impl Into<String>, behavior: Arc<dyn Behavior>, schedule: RampSchedule) -> Self {
        Self {
            name: name.into(),
            behavior,
            schedule,
            graceful_stop: Duration::ZERO,
        }
    }

    pub fn with_graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.graceful_stop = graceful_stop;
        self
    }
}

/// Runs all scenarios of a test to completion
#[derive(Debug)]
pub struct ScenarioScheduler {
    scenarios: Vec<ScenarioConfig>,
    site: Arc<SiteContext>,
    metrics: Arc<MetricsAggregator>,
    tick: Duration,
    shutdown: CancellationToken,
}

impl ScenarioScheduler {
    pub fn new(
        scenarios: Vec<ScenarioConfig>,
        site: Arc<SiteContext>,
        metrics: Arc<MetricsAggregator>,
    ) -> Self {
        Self {
            scenarios,
            site,
            metrics,
            tick: DEFAULT_TICK,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Stop every scenario when `shutdown` is cancelled
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Token that stops every scenario early when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn scenarios(&self) -> &[ScenarioConfig] {
        &self.scenarios
    }

    /// Drive every scenario concurrently until all schedules have elapsed
    pub async fn run(&self) {
        let controllers = self.scenarios.iter().cloned().map(|scenario| {
            let controller = Controller {
                scenario,
                site: Arc::clone(&self.site),
                metrics: Arc::clone(&self.metrics),
                tick: self.tick,
                stop: self.shutdown.child_token(),
            };
            tokio::spawn(controller.run())
        });

        for result in join_all(controllers).await {
            if let Err(e) = result {
                tracing::error!("Scenario controller panicked: {}", e);
            }
        }
    }
}

// =============================================================================
// Per-scenario controller
// =============================================================================

struct Controller {
    scenario: ScenarioConfig,
    site: Arc<SiteContext>,
    metrics: Arc<MetricsAggregator>,
    tick: Duration,
    stop: CancellationToken,
}

struct WorkerHandle {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl Controller {
    async fn run(self) {
        let name: Arc<str> = Arc::from(self.scenario.name.as_str());
        let total = self.scenario.schedule.total_duration();
        info!(
            scenario = %name,
            behavior = %self.scenario.behavior.kind(),
            duration_secs = total.as_secs(),
            peak = self.scenario.schedule.peak(),
            "Scenario starting"
        );

        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut active: Vec<WorkerHandle> = Vec::new();
        let mut retired: Vec<JoinHandle<()>> = Vec::new();
        let mut next_id: u64 = 0;

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= total {
                break;
            }

            let target = self.scenario.schedule.population_at(elapsed);
            let current = active.len();

            if current < target {
                for _ in current..target {
                    active.push(self.spawn_worker(next_id, Arc::clone(&name)));
                    next_id += 1;
                }
            } else if current > target {
                for worker in active.drain(target..) {
                    worker.stop.cancel();
                    retired.push(worker.handle);
                }
            }

            if current != target {
                info!(scenario = %name, from = current, to = target, "Population changed");
            }
        }

        for worker in active {
            worker.stop.cancel();
            retired.push(worker.handle);
        }
        join_all(retired).await;

        info!(scenario = %name, "Scenario finished");
    }

    fn spawn_worker(&self, id: u64, scenario: Arc<str>) -> WorkerHandle {
        let stop = self.stop.child_token();
        let worker = Worker {
            id,
            scenario,
            behavior: Arc::clone(&self.scenario.behavior),
            site: Arc::clone(&self.site),
            metrics: Arc::clone(&self.metrics),
            graceful_stop: self.scenario.graceful_stop,
            stop: stop.clone(),
        };
        WorkerHandle {
            stop,
            handle: tokio::spawn(worker.run()),
        }
    }
}

// =============================================================================
// VU worker
// =============================================================================

struct Worker {
    id: u64,
    scenario: Arc<str>,
    behavior: Arc<dyn Behavior>,
    site: Arc<SiteContext>,
    metrics: Arc<MetricsAggregator>,
    graceful_stop: Duration,
    stop: CancellationToken,
}

impl Worker {
    async fn run(self) {
        let retention = self.site.settings.retention;
        let mut carried: HashSet<String> = HashSet::new();
        let mut iteration: u64 = 0;

        trace!(scenario = %self.scenario, vu = self.id, "VU started");

        while !self.stop.is_cancelled() {
            let known = match retention {
                AssetRetention::Iteration => HashSet::new(),
                AssetRetention::VirtualUser => std::mem::take(&mut carried),
            };

            let vu = match VirtualUser::new(
                self.id,
                iteration,
                Arc::clone(&self.scenario),
                Arc::clone(&self.site),
                Arc::clone(&self.metrics),
                known,
            ) {
                Ok(vu) => vu,
                Err(e) => {
                    debug!(scenario = %self.scenario, vu = self.id, error = %e, "VU setup failed");
                    self.metrics.record_iteration(&self.scenario, false);
                    sleep_unless_stopped(&self.stop, DEFAULT_TICK).await;
                    continue;
                }
            };

            let interrupt = async {
                self.stop.cancelled().await;
                tokio::time::sleep(self.graceful_stop).await;
            };

            let (result, assets) = tokio::select! {
                biased;
                outcome = iterate(self.behavior.as_ref(), vu) => outcome,
                _ = interrupt => {
                    trace!(scenario = %self.scenario, vu = self.id, iteration, "Iteration interrupted");
                    break;
                }
            };

            match result {
                Ok(()) => self.metrics.record_iteration(&self.scenario, true),
                Err(e) => {
                    debug!(
                        scenario = %self.scenario,
                        vu = self.id,
                        iteration,
                        kind = e.kind(),
                        error = %e,
                        "Iteration aborted"
                    );
                    self.metrics.record_iteration(&self.scenario, false);
                }
            }

            if retention == AssetRetention::VirtualUser {
                carried = assets;
            }
            iteration += 1;
        }

        trace!(scenario = %self.scenario, vu = self.id, iterations = iteration, "VU stopped");
    }
}

/// Sleep for `wait` unless `stop` fires first; true when stopped
async fn sleep_unless_stopped(stop: &CancellationToken, wait: Duration) -> bool {
    tokio::select! {
        _ = stop.cancelled() => true,
        _ = tokio::time::sleep(wait) => false,
    }
}

async fn iterate(
    behavior: &dyn Behavior,
    mut vu: VirtualUser,
) -> (crate::errors::IterationResult<()>, HashSet<String>) {
    let result = behavior.run(&mut vu).await;
    (result, vu.into_assets())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SessionSettings;
    use crate::errors::{IterationError, IterationResult};
    use crate::scenarios::BehaviorKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    /// Counts concurrent and total runs without touching the network
    #[derive(Debug, Default)]
    struct Counting {
        running: AtomicUsize,
        peak: AtomicUsize,
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Behavior for Counting {
        fn kind(&self) -> BehaviorKind {
            BehaviorKind::Homepage
        }

        async fn run(&self, _vu: &mut VirtualUser) -> IterationResult<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            let _running = Running(&self.running);
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(IterationError::CheckFailed {
                    check: "counting",
                    url: String::new(),
                })
            } else {
                Ok(())
            }
        }
    }

    /// Decrements the running count even when an iteration is interrupted
    struct Running<'a>(&'a AtomicUsize);

    impl Drop for Running<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Records how many assets each iteration starts with, then adds one
    #[derive(Debug, Default)]
    struct AssetCounter {
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Behavior for AssetCounter {
        fn kind(&self) -> BehaviorKind {
            BehaviorKind::Homepage
        }

        async fn run(&self, vu: &mut VirtualUser) -> IterationResult<()> {
            self.seen.lock().push(vu.session().known_assets().len());
            let asset = format!("https://example.com/style-{}.css", vu.iteration());
            vu.session_mut().merge_assets([asset]);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        }
    }

    fn site() -> Arc<SiteContext> {
        site_with_retention(AssetRetention::Iteration)
    }

    fn site_with_retention(retention: AssetRetention) -> Arc<SiteContext> {
        let mut settings = SessionSettings::new(Url::parse("https://example.com/").unwrap());
        settings.retention = retention;
        Arc::new(SiteContext::new(settings))
    }

    async fn assets_seen(retention: AssetRetention) -> Vec<usize> {
        let counter = Arc::new(AssetCounter::default());
        let scenario = ScenarioConfig::new(
            "assets",
            counter.clone(),
            RampSchedule::constant(1, Duration::from_millis(200)),
        );

        ScenarioScheduler::new(
            vec![scenario],
            site_with_retention(retention),
            Arc::new(MetricsAggregator::new()),
        )
        .with_tick(Duration::from_millis(10))
        .run()
        .await;

        counter.seen.lock().clone()
    }

    #[tokio::test]
    async fn test_constant_population_runs_iterations() {
        let counting = Arc::new(Counting::default());
        let metrics = Arc::new(MetricsAggregator::new());
        let scenario = ScenarioConfig::new(
            "counting",
            counting.clone(),
            RampSchedule::constant(3, Duration::from_millis(300)),
        );

        ScenarioScheduler::new(vec![scenario], site(), metrics.clone())
            .with_tick(Duration::from_millis(10))
            .run()
            .await;

        assert!(counting.runs.load(Ordering::SeqCst) >= 3);
        assert!(counting.peak.load(Ordering::SeqCst) <= 3);
        assert!(metrics.snapshot().scenarios["counting"].completed >= 3);
        assert_eq!(counting.running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_iterations_restart() {
        let counting = Arc::new(Counting {
            fail: true,
            ..Default::default()
        });
        let metrics = Arc::new(MetricsAggregator::new());
        let scenario = ScenarioConfig::new(
            "failing",
            counting.clone(),
            RampSchedule::constant(1, Duration::from_millis(200)),
        )
        .with_graceful_stop(Duration::from_secs(1));

        ScenarioScheduler::new(vec![scenario], site(), metrics.clone())
            .with_tick(Duration::from_millis(10))
            .run()
            .await;

        let stats = metrics.snapshot().scenarios["failing"];
        assert!(stats.aborted >= 2, "expected repeated iterations, got {stats:?}");
        assert_eq!(stats.completed, 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_early() {
        let counting = Arc::new(Counting::default());
        let metrics = Arc::new(MetricsAggregator::new());
        let scenario = ScenarioConfig::new(
            "long",
            counting.clone(),
            RampSchedule::constant(2, Duration::from_secs(3600)),
        );

        let scheduler = ScenarioScheduler::new(vec![scenario], site(), metrics)
            .with_tick(Duration::from_millis(10));
        let shutdown = scheduler.shutdown_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            shutdown.cancel();
        });

        tokio::time::timeout(Duration::from_secs(5), scheduler.run())
            .await
            .expect("scheduler should stop after shutdown");
        assert_eq!(counting.running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_asset_set_resets_every_iteration() {
        let seen = assets_seen(AssetRetention::Iteration).await;
        assert!(seen.len() >= 2, "expected repeated iterations, got {seen:?}");
        assert!(seen.iter().all(|&n| n == 0), "{seen:?}");
    }

    #[tokio::test]
    async fn test_asset_set_carries_over_for_vu_slot() {
        let seen = assets_seen(AssetRetention::VirtualUser).await;
        assert!(seen.len() >= 2, "expected repeated iterations, got {seen:?}");
        let expected: Vec<usize> = (0..seen.len()).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_sleep_unless_stopped() {
        let stop = CancellationToken::new();
        assert!(!sleep_unless_stopped(&stop, Duration::from_millis(5)).await);

        stop.cancel();
        let stopped = tokio::time::timeout(
            Duration::from_secs(1),
            sleep_unless_stopped(&stop, Duration::from_secs(3600)),
        )
        .await
        .expect("cancelled token should cut the sleep short");
        assert!(stopped);
    }

    #[tokio::test]
    async fn test_scenarios_ramp_independently() {
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let metrics = Arc::new(MetricsAggregator::new());
        let scenarios = vec![
            ScenarioConfig::new("a", a.clone(), RampSchedule::constant(1, Duration::from_millis(200))),
            ScenarioConfig::new("b", b.clone(), RampSchedule::constant(4, Duration::from_millis(200))),
        ];

        ScenarioScheduler::new(scenarios, site(), metrics.clone())
            .with_tick(Duration::from_millis(10))
            .run()
            .await;

        assert!(a.peak.load(Ordering::SeqCst) <= 1);
        assert!(b.peak.load(Ordering::SeqCst) <= 4);
        assert!(b.peak.load(Ordering::SeqCst) > 1);
        let snap = metrics.snapshot();
        assert!(snap.scenarios.contains_key("a") && snap.scenarios.contains_key("b"));
    }
}
