//! Currency service operations.

use currency_common::{MoneyAmount, ServiceError};
use currency_rates::ConversionEngine;
use tracing::{error, info, instrument};

use crate::metrics::SharedMetrics;

/// Conversion operations exposed to the transport layer.
#[derive(Clone)]
pub struct CurrencyService {
    engine: ConversionEngine,
    metrics: SharedMetrics,
}

impl CurrencyService {
    /// Create a service over `engine`.
    pub fn new(engine: ConversionEngine, metrics: SharedMetrics) -> Self {
        Self { engine, metrics }
    }

    /// Currency codes present in the current rate table, sorted.
    #[instrument(skip(self))]
    pub fn supported_currencies(&self) -> Vec<String> {
        let codes = self.engine.supported_currencies();
        info!(count = codes.len(), "Supported currencies fetched");
        codes
    }

    /// Convert `from` (tagged with its own currency) into `to_code`.
    #[instrument(skip(self, from), fields(from_code = %from.currency_code, to_code = %to_code))]
    pub fn convert(&self, from: &MoneyAmount, to_code: &str) -> Result<MoneyAmount, ServiceError> {
        match self.engine.convert_to(from, to_code) {
            Ok(result) => {
                self.metrics.conversion(to_code);
                info!("Conversion successful");
                Ok(result)
            }
            Err(e) => {
                self.metrics.conversion_failed();
                error!(error = %e, "Conversion failure");
                Err(e.into())
            }
        }
    }

    /// Get the metrics this service records into.
    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ServiceMetrics;
    use currency_rates::{RateCache, RateTable};
    use std::sync::Arc;

    fn setup_service() -> CurrencyService {
        let cache = Arc::new(RateCache::new());
        let table: RateTable = [("EUR", 1.0), ("USD", 1.1)]
            .into_iter()
            .map(|(c, r)| (c.to_string(), r))
            .collect();
        cache.replace(table);
        CurrencyService::new(ConversionEngine::new(cache), Arc::new(ServiceMetrics::new()))
    }

    #[test]
    fn test_convert_records_metrics() {
        let service = setup_service();

        let usd = service.convert(&MoneyAmount::new("EUR", 100, 0), "USD").unwrap();
        assert_eq!(usd.units, 110);
        assert_eq!(usd.currency_code, "USD");

        let err = service.convert(&MoneyAmount::new("EUR", 1, 0), "XYZ").unwrap_err();
        assert_eq!(err, ServiceError::UnsupportedCurrency("XYZ".into()));

        let snap = service.metrics().snapshot();
        assert_eq!(snap.conversions_total, 1);
        assert_eq!(snap.conversions_failed, 1);
        assert_eq!(snap.conversions_by_currency.get("USD"), Some(&1));
    }

    #[test]
    fn test_supported_currencies() {
        assert_eq!(setup_service().supported_currencies(), vec!["EUR", "USD"]);
    }
}
