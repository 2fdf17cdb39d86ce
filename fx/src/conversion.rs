//! Currency conversion types and operations.

use ratefeed_common::{round_rate, CurrencyCode, RateObservation, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FxError, FxResult};

/// Represents a completed currency conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedAmount {
    /// Source currency.
    pub from: CurrencyCode,
    /// Target currency.
    pub to: CurrencyCode,
    /// Input amount, in `from` units.
    pub amount: Decimal,
    /// Output amount, in `to` units, four fractional digits.
    pub converted: Decimal,
    /// Rate of `from` against the base currency.
    pub from_rate: Decimal,
    /// Rate of `to` against the base currency.
    pub to_rate: Decimal,
    /// When the conversion was executed.
    pub executed_at: Timestamp,
}

impl ConvertedAmount {
    /// Build from the two resolved observations.
    pub fn from_observations(
        from: &RateObservation,
        to: &RateObservation,
        amount: Decimal,
        executed_at: Timestamp,
    ) -> FxResult<Self> {
        let converted = convert_amount(amount, from.rate, to.rate, &from.currency)?;

        Ok(Self {
            from: from.currency.clone(),
            to: to.currency.clone(),
            amount,
            converted,
            from_rate: from.rate,
            to_rate: to.rate,
            executed_at,
        })
    }

    /// Effective cross rate `to_rate / from_rate`.
    pub fn effective_rate(&self) -> Decimal {
        if self.from_rate.is_zero() {
            return Decimal::ZERO;
        }
        self.to_rate / self.from_rate
    }
}

/// Convert `amount` through the base currency: `amount * to_rate / from_rate`.
///
/// Multiplication happens before division to keep precision; the result is
/// rounded half-up to four fractional digits. `from_code` names the failing
/// side when `from_rate` is zero.
pub fn convert_amount(
    amount: Decimal,
    from_rate: Decimal,
    to_rate: Decimal,
    from_code: &CurrencyCode,
) -> FxResult<Decimal> {
    if from_rate.is_zero() {
        return Err(FxError::DivideByZeroRate(from_code.clone()));
    }

    let scaled = amount
        .checked_mul(to_rate)
        .and_then(|product| product.checked_div(from_rate))
        .ok_or_else(|| FxError::InvalidInput(format!("amount {amount} overflows conversion")))?;

    Ok(round_rate(scaled))
}
