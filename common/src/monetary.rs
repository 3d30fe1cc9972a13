//! Monetary types for RateScout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ValidationError, ValidationResult};

/// Normalized three-letter currency code.
///
/// Codes are trimmed and uppercased on parse, so `"usd"` and `" USD "`
/// compare equal. Membership in the ISO 4217 list is not checked.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parse and normalize a currency code.
    pub fn parse(code: &str) -> ValidationResult<Self> {
        let normalized = code.trim().to_ascii_uppercase();
        if normalized.len() != 3 || !normalized.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency(code.to_string()));
        }
        Ok(Self(normalized))
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Get the standard decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        match self.0.as_str() {
            "JPY" | "KRW" | "VND" => 0,
            "BHD" | "KWD" | "OMR" => 3,
            _ => 2,
        }
    }

    /// Round an amount to this currency's display precision.
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp(self.decimal_places())
    }

    /// Common currencies
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn eur() -> Self {
        Self("EUR".to_string())
    }

    pub fn gbp() -> Self {
        Self("GBP".to_string())
    }

    pub fn jpy() -> Self {
        Self("JPY".to_string())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// A currency pair for a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Currency being sold.
    pub base: CurrencyCode,
    /// Currency being bought.
    pub quote: CurrencyCode,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: CurrencyCode, quote: CurrencyCode) -> Self {
        Self { base, quote }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Parse a decimal amount from text, accepting scientific notation.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .ok()
        .or_else(|| Decimal::from_scientific(text).ok())
}

/// Parse a strictly positive amount.
pub fn parse_amount(text: &str) -> ValidationResult<Decimal> {
    let amount =
        parse_decimal(text).ok_or_else(|| ValidationError::InvalidAmount(text.to_string()))?;
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount(amount));
    }
    Ok(amount)
}
