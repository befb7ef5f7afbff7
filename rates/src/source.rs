//! Rate source traits and implementations.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::debug;

use crate::error::{RatesError, RatesResult};

/// One raw `(code, rate)` row as read from a rate source.
///
/// The rate is kept as text so the table builder decides what is numeric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRow {
    pub code: String,
    pub rate: Option<String>,
}

impl RateRow {
    /// Create a row.
    pub fn new(code: impl Into<String>, rate: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            rate: Some(rate.into()),
        }
    }
}

/// Trait for currency rate sources.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Read the complete set of rate rows.
    async fn fetch_rates(&self) -> RatesResult<Vec<RateRow>>;
}

/// Rate source backed by a Postgres table with `code` and `rate` columns.
pub struct PgRateSource {
    pool: PgPool,
    query: String,
}

impl PgRateSource {
    /// Create a source reading from `table`.
    ///
    /// The table name is interpolated into the query, so it must be a plain
    /// (optionally schema-qualified) identifier.
    pub fn new(pool: PgPool, table: &str) -> RatesResult<Self> {
        if !is_plain_identifier(table) {
            return Err(RatesError::InvalidConfig(format!(
                "table name {table:?} is not a plain identifier"
            )));
        }

        Ok(Self {
            pool,
            query: format!("SELECT code, rate::text AS rate FROM {table}"),
        })
    }

    /// Get the query issued on every fetch.
    pub fn query(&self) -> &str {
        &self.query
    }
}

#[async_trait]
impl RateSource for PgRateSource {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn fetch_rates(&self) -> RatesResult<Vec<RateRow>> {
        let rows = sqlx::query(&self.query).fetch_all(&self.pool).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(RateRow {
                code: row.try_get("code")?,
                rate: row.try_get("rate")?,
            });
        }

        debug!(rows = out.len(), "Fetched rate rows");
        Ok(out)
    }
}

fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Mock rate source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateSource {
    name: String,
    rows: parking_lot::Mutex<Vec<RateRow>>,
    failing: std::sync::atomic::AtomicBool,
    delay: parking_lot::Mutex<Option<std::time::Duration>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateSource {
    /// Create a new mock source with no rows.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: parking_lot::Mutex::new(Vec::new()),
            failing: std::sync::atomic::AtomicBool::new(false),
            delay: parking_lot::Mutex::new(None),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Replace the rows returned by the next fetch.
    pub fn set_rows(&self, rows: Vec<RateRow>) {
        *self.rows.lock() = rows;
    }

    /// Set rows from `(code, rate)` pairs.
    pub fn set_rates(&self, rates: &[(&str, f64)]) {
        self.set_rows(
            rates
                .iter()
                .map(|(code, rate)| RateRow::new(*code, rate.to_string()))
                .collect(),
        );
    }

    /// Make fetches fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Delay every fetch by `delay`.
    pub fn set_delay(&self, delay: Option<std::time::Duration>) {
        *self.delay.lock() = delay;
    }

    /// Number of fetches so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_rates(&self) -> RatesResult<Vec<RateRow>> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RatesError::SourceUnavailable {
                source_name: self.name.clone(),
                reason: "mock failure".to_string(),
            });
        }

        Ok(self.rows.lock().clone())
    }
}
