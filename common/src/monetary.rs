//! Monetary types for the currency service.
//!
//! Amounts cross the service boundary as a whole-unit integer plus a
//! nine-digit fixed-point fraction ("nanos"). Conversion arithmetic runs
//! in double precision; this module owns the codec between the two.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of nanos in one whole unit.
pub const NANOS_PER_UNIT: i32 = 1_000_000_000;

/// Digits carried by the nanos field.
pub const NANOS_DIGITS: u32 = 9;

const MIN_UNITS: f64 = i64::MIN as f64;

/// A monetary amount in units and nanos, tagged with a currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyAmount {
    /// Currency code, e.g. "USD".
    pub currency_code: String,
    /// Whole units of the amount.
    pub units: i64,
    /// Nano (10^-9) units of the amount. Same sign as `units`.
    pub nanos: i32,
}

impl MoneyAmount {
    /// Create a new amount.
    pub fn new(currency_code: impl Into<String>, units: i64, nanos: i32) -> Self {
        Self {
            currency_code: currency_code.into(),
            units,
            nanos,
        }
    }

    /// Encode a floating-point value as units and nanos.
    ///
    /// The fractional remainder is scaled by 10^9 and truncated toward zero.
    /// Returns `None` if `value` is not finite or its whole part does not
    /// fit in `units`.
    pub fn from_decimal(currency_code: impl Into<String>, value: f64) -> Option<Self> {
        let whole = value.trunc();
        // -2^63 is representable, 2^63 is not.
        if !value.is_finite() || whole < MIN_UNITS || whole >= -MIN_UNITS {
            return None;
        }

        let mut units = whole as i64;
        let remainder = value - whole;
        let mut nanos = (remainder * f64::from(NANOS_PER_UNIT)) as i32;

        // Scaling can round a remainder just below 1.0 up to a full unit.
        if nanos >= NANOS_PER_UNIT {
            units = units.checked_add(1)?;
            nanos = 0;
        } else if nanos <= -NANOS_PER_UNIT {
            units = units.checked_sub(1)?;
            nanos = 0;
        }

        Some(Self::new(currency_code, units, nanos))
    }

    /// Decode the amount into a floating-point value.
    ///
    /// The fraction is rebuilt one digit at a time from the least
    /// significant nanos digit, so every one of the nine digits keeps its
    /// position.
    pub fn to_decimal(&self) -> f64 {
        let mut nanos = self.nanos;
        let mut fraction = 0.0_f64;
        for _ in 0..NANOS_DIGITS {
            let digit = f64::from(nanos % 10) / 10.0;
            nanos /= 10;
            fraction = fraction / 10.0 + digit;
        }
        self.units as f64 + fraction
    }

    /// Check the nanos invariants: magnitude below 10^9, sign matching units.
    pub fn is_valid(&self) -> bool {
        if self.nanos.unsigned_abs() >= NANOS_PER_UNIT as u32 {
            return false;
        }
        match self.units.signum() {
            1 => self.nanos >= 0,
            -1 => self.nanos <= 0,
            _ => true,
        }
    }

    /// Same value re-tagged with another currency code.
    pub fn with_currency(&self, currency_code: impl Into<String>) -> Self {
        Self::new(currency_code, self.units, self.nanos)
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.units < 0 || self.nanos < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:09} {}",
            sign,
            self.units.unsigned_abs(),
            self.nanos.unsigned_abs(),
            self.currency_code
        )
    }
}
