//! Rate observations, the unit of the durable time series.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::currency::{round_rate, CurrencyCode};
use crate::error::CommonError;
use crate::time::Timestamp;

/// A single observed exchange rate against the ingestion base currency.
///
/// Identity is `(currency, observed_at)`. Observations are immutable once
/// built; the rate is rounded to four fractional digits at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateObservation {
    /// Currency the rate is quoted for.
    pub currency: CurrencyCode,
    /// Units of `currency` per one unit of the base currency.
    pub rate: Decimal,
    /// When the rate was captured.
    pub observed_at: Timestamp,
}

impl RateObservation {
    /// Create a new observation, rounding the rate half-up to four places.
    pub fn new(currency: CurrencyCode, rate: Decimal, observed_at: Timestamp) -> Self {
        Self {
            currency,
            rate: round_rate(rate),
            observed_at,
        }
    }

    /// Create from a raw provider value.
    ///
    /// Accepts plain decimals and scientific notation. Negative rates are
    /// rejected; a zero rate is kept and handled at conversion time.
    pub fn from_raw(
        currency: CurrencyCode,
        raw_rate: &str,
        observed_at: Timestamp,
    ) -> Result<Self, CommonError> {
        let raw = raw_rate.trim();
        let rate = Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map_err(|_| CommonError::InvalidRate(format!("{currency}: {raw_rate:?}")))?;

        if rate.is_sign_negative() && !rate.is_zero() {
            return Err(CommonError::InvalidRate(format!("{currency}: negative rate {rate}")));
        }

        Ok(Self::new(currency, rate, observed_at))
    }

    /// Identity key of this observation.
    pub fn key(&self) -> (&CurrencyCode, Timestamp) {
        (&self.currency, self.observed_at)
    }
}

impl fmt::Display for RateObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} @ {}", self.currency, self.rate, self.observed_at)
    }
}
