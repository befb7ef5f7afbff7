//! Process-wide currency rate cache.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{RatesError, RatesResult};
use crate::source::RateRow;

/// Currency code to rate, relative to one implicit pivot currency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    rates: HashMap<String, f64>,
}

impl RateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a complete table from raw source rows.
    ///
    /// Any rate that is not a positive finite number fails the whole build.
    pub fn from_rows(rows: Vec<RateRow>) -> RatesResult<Self> {
        let mut rates = HashMap::with_capacity(rows.len());
        for row in rows {
            let rate = row
                .rate
                .as_deref()
                .map(str::trim)
                .and_then(|value| value.parse::<f64>().ok())
                .filter(|rate| rate.is_finite() && *rate > 0.0)
                .ok_or_else(|| RatesError::MalformedRow {
                    code: row.code.clone(),
                    value: row.rate.clone(),
                })?;
            rates.insert(row.code, rate);
        }
        Ok(Self { rates })
    }

    /// Get the rate for a currency code.
    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    /// Check if a currency code is present.
    pub fn contains(&self, code: &str) -> bool {
        self.rates.contains_key(code)
    }

    /// Currency codes in the table, in no particular order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }

    /// Number of currencies.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Check if the table is empty (not loaded yet).
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl FromIterator<(String, f64)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            rates: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    table: Arc<RateTable>,
    refreshed_at: Option<DateTime<Utc>>,
    generation: u64,
}

/// Thread-safe holder of the current rate table.
///
/// Readers get an `Arc` to an immutable table; `replace` swaps the pointer
/// under the write lock, so a reader sees either the old or the new table.
pub struct RateCache {
    state: RwLock<CacheState>,
}

impl RateCache {
    /// Create an empty rate cache.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Get the current table.
    pub fn snapshot(&self) -> Arc<RateTable> {
        self.state.read().table.clone()
    }

    /// Install a new table. The only mutator.
    pub fn replace(&self, table: RateTable) {
        let table = Arc::new(table);
        let entries = table.len();

        let generation = {
            let mut state = self.state.write();
            state.table = table;
            state.refreshed_at = Some(Utc::now());
            state.generation += 1;
            state.generation
        };

        debug!(entries, generation, "Rate table replaced");
    }

    /// Look up a single rate in the current table.
    pub fn lookup(&self, code: &str) -> Option<f64> {
        self.state.read().table.get(code)
    }

    /// Get the number of currencies in the current table.
    pub fn len(&self) -> usize {
        self.state.read().table.len()
    }

    /// Check if no table has been loaded.
    pub fn is_empty(&self) -> bool {
        self.state.read().table.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        CacheStats {
            entries: state.table.len(),
            generation: state.generation,
            refreshed_at: state.refreshed_at,
        }
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    /// Number of successful replaces since start.
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Shared rate cache.
pub type SharedRateCache = Arc<RateCache>;
