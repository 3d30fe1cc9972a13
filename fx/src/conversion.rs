//! Conversion request type.

use ratescout_common::{parse_amount, CurrencyCode, CurrencyPair, ValidationError, ValidationResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A validated request to convert `amount` from `source` to `target`.
///
/// Source and target always differ and the amount is always positive;
/// the only way to build one is through [`ConversionRequest::new`] or
/// [`ConversionRequest::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConversionRequest")]
pub struct ConversionRequest {
    source: CurrencyCode,
    target: CurrencyCode,
    amount: Decimal,
}

impl ConversionRequest {
    /// Create a new conversion request.
    pub fn new(source: CurrencyCode, target: CurrencyCode, amount: Decimal) -> ValidationResult<Self> {
        if source == target {
            return Err(ValidationError::SameCurrency(source));
        }
        if amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(amount));
        }
        Ok(Self {
            source,
            target,
            amount,
        })
    }

    /// Build a request from raw user input.
    pub fn parse(source: &str, target: &str, amount: &str) -> ValidationResult<Self> {
        Self::new(
            CurrencyCode::parse(source)?,
            CurrencyCode::parse(target)?,
            parse_amount(amount)?,
        )
    }

    /// Currency being converted from.
    pub fn source(&self) -> &CurrencyCode {
        &self.source
    }

    /// Currency being converted to.
    pub fn target(&self) -> &CurrencyCode {
        &self.target
    }

    /// Amount in the source currency.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Get the currency pair.
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.source.clone(), self.target.clone())
    }
}

#[derive(Deserialize)]
struct RawConversionRequest {
    source: CurrencyCode,
    target: CurrencyCode,
    amount: Decimal,
}

impl TryFrom<RawConversionRequest> for ConversionRequest {
    type Error = ValidationError;

    fn try_from(raw: RawConversionRequest) -> Result<Self, Self::Error> {
        Self::new(raw.source, raw.target, raw.amount)
    }
}
