//! Currency conversion over the rate cache.

use currency_common::MoneyAmount;
use tracing::{debug, instrument};

use crate::cache::SharedRateCache;
use crate::error::{RatesError, RatesResult};

/// Converts amounts between currencies through the pivot currency.
///
/// Holds no state of its own; every call reads one cache snapshot.
#[derive(Clone)]
pub struct ConversionEngine {
    cache: SharedRateCache,
}

impl ConversionEngine {
    /// Create an engine reading from `cache`.
    pub fn new(cache: SharedRateCache) -> Self {
        Self { cache }
    }

    /// Convert `amount` from `from_code` to `to_code`.
    #[instrument(skip(self, amount), fields(units = amount.units, nanos = amount.nanos))]
    pub fn convert(
        &self,
        amount: &MoneyAmount,
        from_code: &str,
        to_code: &str,
    ) -> RatesResult<MoneyAmount> {
        let table = self.cache.snapshot();

        let from_rate = table
            .get(from_code)
            .ok_or_else(|| RatesError::UnsupportedCurrency(from_code.to_string()))?;
        let to_rate = table
            .get(to_code)
            .ok_or_else(|| RatesError::UnsupportedCurrency(to_code.to_string()))?;

        if from_code == to_code {
            return Ok(amount.with_currency(to_code));
        }

        let pivot_value = amount.to_decimal() / from_rate;
        let result = MoneyAmount::from_decimal(to_code, pivot_value * to_rate)
            .ok_or_else(|| RatesError::AmountOutOfRange(to_code.to_string()))?;

        debug!(from_rate, to_rate, result = %result, "Converted amount");
        Ok(result)
    }

    /// Convert `amount` from its own currency to `to_code`.
    pub fn convert_to(&self, amount: &MoneyAmount, to_code: &str) -> RatesResult<MoneyAmount> {
        self.convert(amount, &amount.currency_code, to_code)
    }

    /// Currency codes currently in the cache, sorted.
    pub fn supported_currencies(&self) -> Vec<String> {
        let table = self.cache.snapshot();
        let mut codes: Vec<String> = table.codes().map(str::to_string).collect();
        codes.sort_unstable();
        codes
    }

    /// Check if a currency code is currently supported.
    pub fn supports(&self, code: &str) -> bool {
        self.cache.snapshot().contains(code)
    }
}
