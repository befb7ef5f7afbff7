//! Metrics collection for the currency service.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

/// Service metrics.
pub struct ServiceMetrics {
    /// Successful conversions.
    pub conversions_total: AtomicU64,
    /// Failed conversions.
    pub conversions_failed: AtomicU64,
    /// Successful conversions by target currency.
    conversions_by_currency: DashMap<String, AtomicU64>,
    /// Successful rate refreshes.
    pub rate_refreshes: AtomicU64,
    /// Failed rate refreshes.
    pub rate_refresh_failures: AtomicU64,
    /// Exposed path changes.
    pub path_updates: AtomicU64,
    /// Candidate paths rejected by policy.
    pub path_rejections: AtomicU64,
    /// Flag resolutions that returned no value.
    pub flag_failures: AtomicU64,
    /// Completed poller ticks.
    pub ticks: AtomicU64,
}

impl ServiceMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            conversions_total: AtomicU64::new(0),
            conversions_failed: AtomicU64::new(0),
            conversions_by_currency: DashMap::new(),
            rate_refreshes: AtomicU64::new(0),
            rate_refresh_failures: AtomicU64::new(0),
            path_updates: AtomicU64::new(0),
            path_rejections: AtomicU64::new(0),
            flag_failures: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
        }
    }

    /// Record a successful conversion into `currency_code`.
    pub fn conversion(&self, currency_code: &str) {
        self.conversions_total.fetch_add(1, Ordering::Relaxed);
        self.conversions_by_currency
            .entry(currency_code.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed conversion.
    pub fn conversion_failed(&self) {
        self.conversions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rate refresh result.
    pub fn rate_refresh(&self, ok: bool) {
        if ok {
            self.rate_refreshes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rate_refresh_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an exposed path change.
    pub fn path_updated(&self) {
        self.path_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected candidate path.
    pub fn path_rejected(&self) {
        self.path_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed flag resolution.
    pub fn flag_failed(&self) {
        self.flag_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed tick.
    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            conversions_total: self.conversions_total.load(Ordering::Relaxed),
            conversions_failed: self.conversions_failed.load(Ordering::Relaxed),
            conversions_by_currency: self
                .conversions_by_currency
                .iter()
                .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
                .collect(),
            rate_refreshes: self.rate_refreshes.load(Ordering::Relaxed),
            rate_refresh_failures: self.rate_refresh_failures.load(Ordering::Relaxed),
            path_updates: self.path_updates.load(Ordering::Relaxed),
            path_rejections: self.path_rejections.load(Ordering::Relaxed),
            flag_failures: self.flag_failures.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub conversions_total: u64,
    pub conversions_failed: u64,
    pub conversions_by_currency: BTreeMap<String, u64>,
    pub rate_refreshes: u64,
    pub rate_refresh_failures: u64,
    pub path_updates: u64,
    pub path_rejections: u64,
    pub flag_failures: u64,
    pub ticks: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<ServiceMetrics>;
