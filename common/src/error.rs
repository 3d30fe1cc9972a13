//! Validation errors for RateScout input types.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::CurrencyCode;

/// Errors raised when caller-supplied input fails validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Currency code is not three ASCII letters.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrency(String),

    /// Source and target currency are the same.
    #[error("Source and target currency are both {0}")]
    SameCurrency(CurrencyCode),

    /// Amount is zero or negative.
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// Amount could not be parsed as a decimal.
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    /// Provider identifier is empty or contains unsupported characters.
    #[error("Invalid provider id: {0:?}")]
    InvalidProviderId(String),
}

impl ValidationError {
    /// Get error code for structured output.
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::InvalidCurrency(_) => "INVALID_CURRENCY",
            ValidationError::SameCurrency(_) => "SAME_CURRENCY",
            ValidationError::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            ValidationError::InvalidAmount(_) => "INVALID_AMOUNT",
            ValidationError::InvalidProviderId(_) => "INVALID_PROVIDER_ID",
        }
    }
}

/// Result type alias for validation.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
