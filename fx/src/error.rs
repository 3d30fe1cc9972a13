//! FX engine error types.

use ratescout_common::{ProviderId, ValidationError};
use thiserror::Error;

use crate::quote::FailureReason;

/// Errors returned synchronously by the engine to its caller.
///
/// Provider-side problems never show up here; they are recorded as
/// failed quotes inside a [`crate::ComparisonResult`].
#[derive(Debug, Error)]
pub enum FxError {
    /// Request failed validation; no provider was contacted.
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// Two registrations share the same provider id.
    #[error("Duplicate provider: {0}")]
    DuplicateProvider(ProviderId),

    /// Engine or provider configuration is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;

/// Errors a rate provider can hit while producing a rate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Connection, DNS, TLS or transport-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Remote answered with a non-success status.
    #[error("HTTP status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// Payload could not be decoded.
    #[error("Malformed payload: {0}")]
    Parse(String),

    /// Provider has no rate for the requested pair.
    #[error("Unsupported currency pair: {0}")]
    UnsupportedPair(String),

    /// Provider returned a zero or negative rate.
    #[error("Invalid rate: {0}")]
    InvalidRate(String),
}

impl ProviderError {
    /// Failure reason recorded in the quote for this error.
    pub fn reason(&self) -> FailureReason {
        match self {
            ProviderError::Network(_) => FailureReason::Network,
            ProviderError::HttpStatus { .. } => FailureReason::HttpStatus,
            ProviderError::Parse(_) => FailureReason::Parse,
            ProviderError::UnsupportedPair(_) => FailureReason::UnsupportedPair,
            ProviderError::InvalidRate(_) => FailureReason::InvalidRate,
        }
    }
}

/// Result type for provider internals.
pub type ProviderResult<T> = Result<T, ProviderError>;
