//! Currency Rates
//!
//! Rate table management and currency conversion.
//!
//! # Features
//!
//! - Process-wide rate cache with copy-on-read snapshots and swap-only replace
//! - Pluggable rate sources, with a Postgres implementation
//! - Refresh that builds the next table off-lock and never installs partial state
//! - Pivot-currency conversion over the units/nanos money format
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use currency_common::MoneyAmount;
//! use currency_rates::{ConversionEngine, RateCache, RateRefresher};
//!
//! let cache = Arc::new(RateCache::new());
//! let refresher = RateRefresher::new(source, cache.clone());
//! refresher.refresh().await?;
//!
//! let engine = ConversionEngine::new(cache);
//! let usd = engine.convert(&MoneyAmount::new("EUR", 100, 0), "EUR", "USD")?;
//! ```

pub mod cache;
pub mod source;
pub mod refresh;
pub mod engine;
pub mod error;

pub use cache::{RateCache, RateTable, SharedRateCache};
pub use source::{PgRateSource, RateRow, RateSource};
pub use refresh::RateRefresher;
pub use engine::ConversionEngine;
pub use error::{RatesError, RatesResult};

#[cfg(any(test, feature = "test-utils"))]
pub use source::MockRateSource;
