//! Background poller for the exposed path and the rate table.
//!
//! Each tick reads the policy mode, resolves the exposed path from the flag
//! resolver (dynamic) or the static fallback (static), then refreshes the
//! rate table. Every failure is absorbed and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use currency_common::ServiceError;
use currency_rates::RateRefresher;
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::flagd::{FlagError, FlagResolver};
use crate::metrics::{ServiceMetrics, SharedMetrics};
use crate::mode::ModeSource;
use crate::registry::{SharedRegistry, UpdateOutcome};
use crate::state::{ExposedPath, PolicyMode, PollerState};

/// Default bound on a single flag resolution.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Source of poll ticks.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. Returns false once no more ticks will come.
    async fn tick(&mut self) -> bool;
}

/// Wall-clock ticker. The first tick fires immediately.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// Tick every `period`; a slow tick delays the next one instead of bursting.
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Ticker driven by explicit triggers.
pub struct ManualTicker {
    rx: mpsc::Receiver<()>,
}

impl ManualTicker {
    /// Create a ticker and the sender that fires it.
    pub fn new() -> (Self, TickTrigger) {
        let (tx, rx) = mpsc::channel(16);
        (Self { rx }, TickTrigger { tx })
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

/// Fires a [`ManualTicker`]. Dropping every trigger ends the loop.
#[derive(Clone)]
pub struct TickTrigger {
    tx: mpsc::Sender<()>,
}

impl TickTrigger {
    /// Request one tick.
    pub async fn fire(&self) {
        let _ = self.tx.send(()).await;
    }
}

/// What the path step of a tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// Registry took the candidate, or already held it.
    Updated(UpdateOutcome),
    /// Candidate failed the path policy; registry untouched.
    Rejected(ServiceError),
    /// Flag resolver gave no value; registry untouched.
    SourceFailed(ServiceError),
}

/// Result of one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Mode read at the start of the tick.
    pub mode: PolicyMode,
    /// Path step result.
    pub path: PathStep,
    /// Rate refresh result: entry count or failure.
    pub rates: Result<usize, ServiceError>,
}

/// Fixed poller inputs.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Flag holding the exposed path.
    pub flag_key: String,
    /// Path exposed in static mode.
    pub static_path: String,
    /// Bound on a single flag resolution.
    pub resolve_timeout: Duration,
}

impl PollerSettings {
    /// Create settings with the default resolve timeout.
    pub fn new(flag_key: impl Into<String>, static_path: impl Into<String>) -> Self {
        Self {
            flag_key: flag_key.into(),
            static_path: static_path.into(),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }
}

/// Sole writer of the exposed-path registry and the rate cache.
pub struct ConfigPoller {
    registry: SharedRegistry,
    resolver: Arc<dyn FlagResolver>,
    refresher: Arc<RateRefresher>,
    mode: Arc<dyn ModeSource>,
    settings: PollerSettings,
    metrics: SharedMetrics,
    state: Arc<RwLock<PollerState>>,
}

impl ConfigPoller {
    /// Create a poller.
    pub fn new(
        registry: SharedRegistry,
        resolver: Arc<dyn FlagResolver>,
        refresher: Arc<RateRefresher>,
        mode: Arc<dyn ModeSource>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            registry,
            resolver,
            refresher,
            mode,
            settings,
            metrics: Arc::new(ServiceMetrics::new()),
            state: Arc::new(RwLock::new(PollerState::Starting)),
        }
    }

    /// Record into a shared metrics instance.
    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get the current poller state.
    pub fn state(&self) -> PollerState {
        *self.state.read()
    }

    /// Startup pass, run once before the loop.
    ///
    /// Clears a path that fails the policy and, in static mode, installs
    /// the fallback right away so the mirror is not empty until the first
    /// tick.
    pub fn initialize(&self) -> ExposedPath {
        if self.registry.clear_if_invalid() {
            self.metrics.path_rejected();
        }

        if !self.mode.mode().is_dynamic() {
            match self.registry.try_update(&self.settings.static_path, PolicyMode::Static) {
                UpdateOutcome::Applied => {
                    self.metrics.path_updated();
                    info!(path = %self.settings.static_path, "Using static path at startup");
                }
                UpdateOutcome::Unchanged => {}
                UpdateOutcome::Rejected => {
                    self.metrics.path_rejected();
                    warn!(path = %self.settings.static_path, "Static path not allowed; leaving empty");
                }
            }
        }

        self.registry.snapshot()
    }

    /// Run one tick: path step, then rate refresh.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> TickReport {
        let mode = self.mode.mode();

        let path = match mode {
            PolicyMode::Dynamic => match self.resolve_flag().await {
                Ok(candidate) => self.apply(&candidate, mode),
                Err(e) => {
                    self.metrics.flag_failed();
                    warn!(error = %e, flag_key = %self.settings.flag_key, "Flag unavailable; keeping previous path");
                    PathStep::SourceFailed(e.into())
                }
            },
            PolicyMode::Static => {
                let candidate = self.settings.static_path.clone();
                self.apply(&candidate, mode)
            }
        };

        let rates = self.refresher.refresh().await.map_err(ServiceError::from);
        self.metrics.rate_refresh(rates.is_ok());
        self.metrics.tick();

        debug!(%mode, path = ?path, rates = ?rates, "Tick complete");
        TickReport { mode, path, rates }
    }

    /// Run the startup pass and start the loop on the current runtime.
    pub fn spawn<T: Ticker + 'static>(self, mut ticker: T) -> PollerHandle {
        self.initialize();

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (ticks_tx, ticks_rx) = watch::channel(0u64);
        let state = self.state.clone();
        *state.write() = PollerState::Running;

        let task = tokio::spawn(async move {
            info!("Config poller started");
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    more = ticker.tick() => {
                        if !more {
                            break;
                        }
                        self.tick().await;
                        ticks_tx.send_modify(|n| *n += 1);
                    }
                }
            }
            *self.state.write() = PollerState::Stopped;
            info!("Config poller stopped");
        });

        PollerHandle {
            shutdown_tx,
            ticks_rx,
            state,
            task,
        }
    }

    fn apply(&self, candidate: &str, mode: PolicyMode) -> PathStep {
        let outcome = self.registry.try_update(candidate, mode);
        match outcome {
            UpdateOutcome::Applied => self.metrics.path_updated(),
            UpdateOutcome::Rejected => {
                self.metrics.path_rejected();
                return PathStep::Rejected(ServiceError::ValidationRejected {
                    path: candidate.to_string(),
                });
            }
            UpdateOutcome::Unchanged => {}
        }
        PathStep::Updated(outcome)
    }

    async fn resolve_flag(&self) -> Result<String, FlagError> {
        let timeout = self.settings.resolve_timeout;
        match tokio::time::timeout(timeout, self.resolver.resolve_string(&self.settings.flag_key)).await
        {
            Ok(result) => result,
            Err(_) => Err(FlagError::Timeout(timeout.as_millis() as u64)),
        }
    }
}

/// Handle to a running poller loop.
///
/// Dropping the handle also stops the loop after its current tick.
pub struct PollerHandle {
    shutdown_tx: watch::Sender<bool>,
    ticks_rx: watch::Receiver<u64>,
    state: Arc<RwLock<PollerState>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Get the current poller state.
    pub fn state(&self) -> PollerState {
        *self.state.read()
    }

    /// Check if the loop is still running.
    pub fn is_running(&self) -> bool {
        self.state().is_running() && !self.task.is_finished()
    }

    /// Number of completed ticks.
    pub fn completed_ticks(&self) -> u64 {
        *self.ticks_rx.borrow()
    }

    /// Wait until at least `count` ticks have completed.
    ///
    /// Returns false if the loop exits first.
    pub async fn wait_for_ticks(&self, count: u64) -> bool {
        self.ticks_rx.clone().wait_for(|n| *n >= count).await.is_ok()
    }

    /// Stop the loop after the current tick and wait for it to exit.
    pub async fn stop(self) {
        {
            let mut state = self.state.write();
            if state.is_running() {
                *state = PollerState::Stopping;
            }
        }
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Config poller task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flagd::MockFlagResolver;
    use crate::mode::ModeSwitch;
    use crate::registry::ExposedPathRegistry;
    use currency_common::PathPolicy;
    use currency_rates::{MockRateSource, RateCache, RateRow, RateSource, RatesResult};

    struct Fixture {
        registry: SharedRegistry,
        resolver: Arc<MockFlagResolver>,
        source: Arc<MockRateSource>,
        cache: Arc<RateCache>,
        switch: ModeSwitch,
        metrics: SharedMetrics,
        poller: ConfigPoller,
    }

    fn fixture(dynamic: bool, static_path: &str) -> Fixture {
        let registry = Arc::new(ExposedPathRegistry::new(
            PathPolicy::default(),
            PolicyMode::from_dynamic_enabled(dynamic),
        ));
        let resolver = Arc::new(MockFlagResolver::new());
        let source = Arc::new(MockRateSource::new("test"));
        source.set_rates(&[("EUR", 1.0), ("USD", 1.1)]);
        let cache = Arc::new(RateCache::new());
        let refresher = Arc::new(RateRefresher::new(source.clone(), cache.clone()));
        let switch = ModeSwitch::new(dynamic);
        let metrics = Arc::new(ServiceMetrics::new());

        let poller = ConfigPoller::new(
            registry.clone(),
            resolver.clone(),
            refresher,
            Arc::new(switch.clone()),
            PollerSettings::new("exposed_path", static_path),
        )
        .with_metrics(metrics.clone());

        Fixture {
            registry,
            resolver,
            source,
            cache,
            switch,
            metrics,
            poller,
        }
    }

    #[test]
    fn test_initialize_static_sets_fallback() {
        let f = fixture(false, "/tmp/log.txt");
        let exposed = f.poller.initialize();
        assert_eq!(exposed.path(), Some("/tmp/log.txt"));
        assert_eq!(exposed.mode, PolicyMode::Static);
    }

    #[test]
    fn test_initialize_static_rejects_bad_fallback() {
        let f = fixture(false, "relative.txt");
        let exposed = f.poller.initialize();
        assert_eq!(exposed.path(), None);
        assert_eq!(f.metrics.snapshot().path_rejections, 1);
    }

    #[test]
    fn test_initialize_dynamic_leaves_empty() {
        let f = fixture(true, "/tmp/log.txt");
        assert_eq!(f.poller.initialize().path(), None);
        assert_eq!(f.resolver.calls(), 0);
    }

    #[tokio::test]
    async fn test_dynamic_tick_applies_flag_value() {
        let f = fixture(true, "/tmp/log.txt");
        f.resolver.set_value(Some("/var/data/report.csv"));

        let report = f.poller.tick().await;

        assert_eq!(report.mode, PolicyMode::Dynamic);
        assert_eq!(report.path, PathStep::Updated(UpdateOutcome::Applied));
        assert_eq!(report.rates.unwrap(), 2);
        assert_eq!(f.registry.snapshot().path(), Some("/var/data/report.csv"));
        assert_eq!(f.cache.lookup("USD"), Some(1.1));

        let again = f.poller.tick().await;
        assert_eq!(again.path, PathStep::Updated(UpdateOutcome::Unchanged));
    }

    #[tokio::test]
    async fn test_flag_failure_keeps_previous_path() {
        let f = fixture(true, "/tmp/log.txt");
        f.resolver.set_value(Some("/var/data/a"));
        f.poller.tick().await;
        let before = f.registry.snapshot();

        f.resolver.set_value(None);
        let report = f.poller.tick().await;

        assert!(matches!(report.path, PathStep::SourceFailed(ServiceError::SourceUnavailable { .. })));
        assert_eq!(f.registry.snapshot(), before);
        assert_eq!(f.resolver.calls(), 2);
        assert_eq!(f.metrics.snapshot().flag_failures, 1);
        // Rate refresh still ran.
        assert!(report.rates.is_ok());
        assert_eq!(f.source.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalid_flag_value_rejected() {
        let f = fixture(true, "/tmp/log.txt");
        f.resolver.set_value(Some("/var/data/a"));
        f.poller.tick().await;

        f.resolver.set_value(Some("../../etc/shadow"));
        let report = f.poller.tick().await;

        assert_eq!(
            report.path,
            PathStep::Rejected(ServiceError::ValidationRejected {
                path: "../../etc/shadow".into()
            })
        );
        assert_eq!(f.registry.snapshot().path(), Some("/var/data/a"));
    }

    #[tokio::test]
    async fn test_mode_flip_installs_static_path() {
        let f = fixture(true, "/tmp/log.txt");
        f.resolver.set_value(Some("/var/data/dynamic.txt"));
        f.poller.tick().await;
        assert_eq!(f.registry.snapshot().path(), Some("/var/data/dynamic.txt"));

        f.switch.set_dynamic(false);
        let report = f.poller.tick().await;

        assert_eq!(report.mode, PolicyMode::Static);
        assert_eq!(report.path, PathStep::Updated(UpdateOutcome::Applied));
        let exposed = f.registry.snapshot();
        assert_eq!(exposed.path(), Some("/tmp/log.txt"));
        assert_eq!(exposed.mode, PolicyMode::Static);
        // Static ticks do not consult the resolver.
        assert_eq!(f.resolver.calls(), 1);

        f.switch.set_dynamic(true);
        f.poller.tick().await;
        assert_eq!(f.registry.snapshot().path(), Some("/var/data/dynamic.txt"));
    }

    #[tokio::test]
    async fn test_invalid_static_path_leaves_path_unchanged() {
        let f = fixture(true, "tmp/relative.txt");
        f.resolver.set_value(Some("/var/data/dynamic.txt"));
        f.poller.tick().await;

        f.switch.set_dynamic(false);
        let report = f.poller.tick().await;

        assert!(matches!(
            report.path,
            PathStep::Rejected(ServiceError::ValidationRejected { ref path }) if path == "tmp/relative.txt"
        ));
        assert_eq!(f.registry.snapshot().path(), Some("/var/data/dynamic.txt"));
    }

    #[tokio::test]
    async fn test_rate_failure_does_not_touch_path_or_cache() {
        let f = fixture(false, "/tmp/log.txt");
        f.poller.tick().await;
        let table = f.cache.snapshot();

        f.source.set_failing(true);
        let report = f.poller.tick().await;

        assert!(report.rates.is_err());
        assert_eq!(report.path, PathStep::Updated(UpdateOutcome::Unchanged));
        assert!(Arc::ptr_eq(&table, &f.cache.snapshot()));
        let snap = f.metrics.snapshot();
        assert_eq!(snap.rate_refresh_failures, 1);
        assert_eq!(snap.ticks, 2);
    }

    struct SlowResolver;

    #[async_trait]
    impl FlagResolver for SlowResolver {
        fn name(&self) -> &str {
            "slow"
        }

        async fn resolve_string(&self, _flag_key: &str) -> Result<String, FlagError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("/tmp/late".to_string())
        }
    }

    #[tokio::test]
    async fn test_stalled_resolver_is_bounded() {
        let f = fixture(true, "/tmp/log.txt");
        let mut settings = PollerSettings::new("exposed_path", "/tmp/log.txt");
        settings.resolve_timeout = Duration::from_millis(20);
        let refresher = Arc::new(RateRefresher::new(f.source.clone(), f.cache.clone()));
        let poller = ConfigPoller::new(
            f.registry.clone(),
            Arc::new(SlowResolver),
            refresher,
            Arc::new(ModeSwitch::new(true)),
            settings,
        );

        let report = tokio::time::timeout(Duration::from_secs(2), poller.tick())
            .await
            .expect("tick should not stall");

        assert!(matches!(report.path, PathStep::SourceFailed(_)));
        assert_eq!(f.registry.snapshot().path(), None);
    }

    /// Records the exposed path seen at fetch time.
    struct ObservingSource {
        registry: SharedRegistry,
        seen: parking_lot::Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl RateSource for ObservingSource {
        fn name(&self) -> &str {
            "observing"
        }

        async fn fetch_rates(&self) -> RatesResult<Vec<RateRow>> {
            self.seen.lock().push(self.registry.snapshot().path);
            Ok(vec![RateRow::new("EUR", "1.0")])
        }
    }

    #[tokio::test]
    async fn test_path_update_happens_before_refresh() {
        let f = fixture(true, "/tmp/log.txt");
        let source = Arc::new(ObservingSource {
            registry: f.registry.clone(),
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        let refresher = Arc::new(RateRefresher::new(source.clone(), f.cache.clone()));
        let poller = ConfigPoller::new(
            f.registry.clone(),
            f.resolver.clone(),
            refresher,
            Arc::new(f.switch.clone()),
            PollerSettings::new("exposed_path", "/tmp/log.txt"),
        );

        f.resolver.set_value(Some("/tmp/first"));
        poller.tick().await;
        f.resolver.set_value(Some("/tmp/second"));
        poller.tick().await;

        assert_eq!(
            *source.seen.lock(),
            vec![Some("/tmp/first".to_string()), Some("/tmp/second".to_string())]
        );
    }

    #[tokio::test]
    async fn test_spawned_loop_with_manual_ticks() {
        let f = fixture(true, "/tmp/log.txt");
        let registry = f.registry.clone();
        let resolver = f.resolver.clone();
        let (ticker, trigger) = ManualTicker::new();

        resolver.set_value(Some("/tmp/one"));
        let handle = f.poller.spawn(ticker);
        assert!(handle.is_running());

        trigger.fire().await;
        assert!(handle.wait_for_ticks(1).await);
        assert_eq!(registry.snapshot().path(), Some("/tmp/one"));

        resolver.set_value(Some("/tmp/two"));
        trigger.fire().await;
        assert!(handle.wait_for_ticks(2).await);
        assert_eq!(registry.snapshot().path(), Some("/tmp/two"));
        assert_eq!(handle.completed_ticks(), 2);

        handle.stop().await;
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn test_loop_ends_when_trigger_dropped() {
        let f = fixture(false, "/tmp/log.txt");
        let (ticker, trigger) = ManualTicker::new();
        let handle = f.poller.spawn(ticker);

        trigger.fire().await;
        assert!(handle.wait_for_ticks(1).await);
        drop(trigger);

        assert!(!handle.wait_for_ticks(2).await);
        assert_eq!(handle.state(), PollerState::Stopped);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_interval_ticker_keeps_polling() {
        let f = fixture(false, "/tmp/log.txt");
        let source = f.source.clone();
        let handle = f.poller.spawn(IntervalTicker::new(Duration::from_millis(10)));

        let reached = tokio::time::timeout(Duration::from_secs(5), handle.wait_for_ticks(3)).await;

        assert!(matches!(reached, Ok(true)));
        assert!(source.calls() >= 3);
        handle.stop().await;
    }
}
