//! Currency Server
//!
//! Currency conversion service plus a flag-controlled single-file mirror.
//!
//! A background [`ConfigPoller`] is the only writer of shared state. Each
//! tick it resolves the exposed path (from the flag resolver or the static
//! fallback) into the [`ExposedPathRegistry`] and refreshes the rate cache.
//! The conversion API and the [`FileMirror`] only read that state.

pub mod config;
pub mod state;
pub mod registry;
pub mod flagd;
pub mod mode;
pub mod metrics;
pub mod poller;
pub mod mirror;
pub mod service;
pub mod api;

pub use config::ServiceConfig;
pub use flagd::{FlagError, FlagResolver, FlagdClient};
pub use metrics::{MetricsSnapshot, ServiceMetrics, SharedMetrics};
pub use mirror::{FileMirror, MirrorError};
pub use mode::{EnvModeSource, ModeSource, ModeSwitch};
pub use poller::{
    ConfigPoller, IntervalTicker, ManualTicker, PathStep, PollerHandle, PollerSettings,
    TickReport, TickTrigger, Ticker,
};
pub use registry::{ExposedPathRegistry, SharedRegistry, UpdateOutcome};
pub use service::CurrencyService;
pub use state::{ExposedPath, PolicyMode, PollerState};

#[cfg(any(test, feature = "test-utils"))]
pub use flagd::MockFlagResolver;
