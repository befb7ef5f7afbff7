//! Rate table refresh.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::cache::{RateTable, SharedRateCache};
use crate::error::{RatesError, RatesResult};
use crate::source::RateSource;

/// Default bound on a single rate source query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Reloads the rate cache from a rate source.
///
/// The next table is built in a local buffer while no lock is held; only a
/// complete table is installed. On any failure the cache keeps its current
/// table.
pub struct RateRefresher {
    source: Arc<dyn RateSource>,
    cache: SharedRateCache,
    timeout: Duration,
}

impl RateRefresher {
    /// Create a refresher with the default query timeout.
    pub fn new(source: Arc<dyn RateSource>, cache: SharedRateCache) -> Self {
        Self {
            source,
            cache,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Set the query timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Query the source and install the result. Returns the entry count.
    #[instrument(skip(self), fields(source = self.source.name()))]
    pub async fn refresh(&self) -> RatesResult<usize> {
        let result = match tokio::time::timeout(self.timeout, self.source.fetch_rates()).await {
            Ok(rows) => rows.and_then(RateTable::from_rows),
            Err(_) => Err(RatesError::Timeout {
                source_name: self.source.name().to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(table) => {
                let entries = table.len();
                self.cache.replace(table);
                info!(entries, "Rates updated");
                Ok(entries)
            }
            Err(e) => {
                warn!(error = %e, "Rate refresh failed; keeping previous table");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RateCache;
    use crate::source::{MockRateSource, RateRow};

    fn setup() -> (Arc<MockRateSource>, SharedRateCache, RateRefresher) {
        let source = Arc::new(MockRateSource::new("test"));
        let cache = Arc::new(RateCache::new());
        let refresher = RateRefresher::new(source.clone(), cache.clone());
        (source, cache, refresher)
    }

    #[tokio::test]
    async fn test_refresh_installs_table() {
        let (source, cache, refresher) = setup();
        source.set_rates(&[("EUR", 1.0), ("USD", 1.1), ("JPY", 160.5)]);

        let entries = refresher.refresh().await.unwrap();

        assert_eq!(entries, 3);
        assert_eq!(cache.lookup("JPY"), Some(160.5));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_table() {
        let (source, cache, refresher) = setup();
        source.set_rates(&[("EUR", 1.0), ("USD", 1.1)]);
        refresher.refresh().await.unwrap();
        let before = cache.snapshot();

        source.set_failing(true);
        assert!(refresher.refresh().await.is_err());

        assert!(Arc::ptr_eq(&before, &cache.snapshot()));
        assert_eq!(cache.stats().generation, 1);
    }

    #[tokio::test]
    async fn test_malformed_row_fails_whole_refresh() {
        let (source, cache, refresher) = setup();
        source.set_rates(&[("EUR", 1.0)]);
        refresher.refresh().await.unwrap();

        source.set_rows(vec![
            RateRow::new("EUR", "1.0"),
            RateRow::new("USD", "not-a-number"),
        ]);
        let err = refresher.refresh().await.unwrap_err();

        assert!(matches!(err, RatesError::MalformedRow { ref code, .. } if code == "USD"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("USD"), None);
    }

    #[tokio::test]
    async fn test_refresh_times_out() {
        let (source, cache, refresher) = setup();
        let refresher = refresher.with_timeout(Duration::from_millis(20));
        source.set_rates(&[("EUR", 1.0)]);
        source.set_delay(Some(Duration::from_millis(200)));

        let err = refresher.refresh().await.unwrap_err();

        assert!(matches!(err, RatesError::Timeout { timeout_ms: 20, .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_refresh_replaces_whole_table() {
        let (source, cache, refresher) = setup();
        source.set_rates(&[("EUR", 1.0), ("GBP", 0.85)]);
        tokio_test::assert_ok!(tokio_test::block_on(refresher.refresh()));

        source.set_rates(&[("EUR", 1.0), ("USD", 1.1)]);
        tokio_test::assert_ok!(tokio_test::block_on(refresher.refresh()));

        assert_eq!(cache.lookup("GBP"), None);
        assert_eq!(cache.lookup("USD"), Some(1.1));
        assert_eq!(cache.stats().generation, 2);
        assert_eq!(source.calls(), 2);
    }
}
