//! Rate quotes returned by providers.

use std::fmt;
use std::time::Duration;

use ratescout_common::{duration_ms, ProviderId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::conversion::ConversionRequest;
use crate::error::ProviderError;

/// Why a provider did not produce a usable rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Transport failure before a response arrived.
    Network,
    /// Response arrived with a non-success status.
    HttpStatus,
    /// Payload was malformed.
    Parse,
    /// Provider does not quote the pair.
    UnsupportedPair,
    /// Provider quoted a zero or negative rate.
    InvalidRate,
    /// Provider did not answer before its deadline.
    Timeout,
    /// Provider task panicked.
    Internal,
}

impl FailureReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::HttpStatus => "http_status",
            Self::Parse => "parse",
            Self::UnsupportedPair => "unsupported_pair",
            Self::InvalidRate => "invalid_rate",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A usable offer from one provider.
///
/// Only constructible through [`SuccessQuote::new`] or deserialization, both
/// of which reject non-positive rates and amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSuccessQuote")]
pub struct SuccessQuote {
    provider_id: ProviderId,
    converted_amount: Decimal,
    rate: Decimal,
    #[serde(with = "duration_ms")]
    latency: Duration,
}

/// Wire form of [`SuccessQuote`], validated on conversion.
#[derive(Deserialize)]
struct RawSuccessQuote {
    provider_id: ProviderId,
    converted_amount: Decimal,
    rate: Decimal,
    #[serde(with = "duration_ms")]
    latency: Duration,
}

impl TryFrom<RawSuccessQuote> for SuccessQuote {
    type Error = ProviderError;

    fn try_from(raw: RawSuccessQuote) -> Result<Self, Self::Error> {
        if raw.rate <= Decimal::ZERO {
            return Err(ProviderError::InvalidRate(raw.rate.to_string()));
        }
        if raw.converted_amount <= Decimal::ZERO {
            return Err(ProviderError::InvalidRate(format!(
                "converted amount {} is not positive",
                raw.converted_amount
            )));
        }
        Ok(Self {
            provider_id: raw.provider_id,
            converted_amount: raw.converted_amount,
            rate: raw.rate,
            latency: raw.latency,
        })
    }
}

impl SuccessQuote {
    /// Build a quote for `request` at `rate`.
    ///
    /// Rejects non-positive rates; the converted amount is always the exact
    /// product of the request amount and the rate.
    pub fn new(
        provider_id: ProviderId,
        request: &ConversionRequest,
        rate: Decimal,
        latency: Duration,
    ) -> Result<Self, ProviderError> {
        if rate <= Decimal::ZERO {
            return Err(ProviderError::InvalidRate(rate.to_string()));
        }
        let converted_amount = request
            .amount()
            .checked_mul(rate)
            .ok_or_else(|| ProviderError::InvalidRate(format!("{rate} overflows amount")))?;

        Ok(Self {
            provider_id,
            converted_amount,
            rate,
            latency,
        })
    }

    /// Provider that produced the offer.
    pub fn provider_id(&self) -> &ProviderId {
        &self.provider_id
    }

    /// Amount received in the target currency, `amount * rate`.
    pub fn converted_amount(&self) -> Decimal {
        self.converted_amount
    }

    /// Rate applied to the request amount.
    pub fn rate(&self) -> Decimal {
        self.rate
    }

    /// Time the provider took to answer.
    pub fn latency(&self) -> Duration {
        self.latency
    }
}

/// A provider attempt that produced no offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedQuote {
    /// Provider that failed.
    pub provider_id: ProviderId,
    /// Failure classification.
    pub reason: FailureReason,
    /// Human readable detail.
    pub detail: String,
    /// Time spent before the failure was recorded.
    #[serde(with = "duration_ms")]
    pub latency: Duration,
}

impl FailedQuote {
    /// Failed quote from a provider error.
    pub fn from_error(provider_id: ProviderId, error: &ProviderError, latency: Duration) -> Self {
        Self {
            provider_id,
            reason: error.reason(),
            detail: error.to_string(),
            latency,
        }
    }

    /// Synthetic failure for a provider that missed its deadline.
    pub fn timeout(provider_id: ProviderId, deadline: Duration) -> Self {
        Self {
            provider_id,
            reason: FailureReason::Timeout,
            detail: format!("no answer within {}ms", deadline.as_millis()),
            latency: deadline,
        }
    }

    /// Failure for a provider task that panicked or was cancelled.
    pub fn internal(provider_id: ProviderId, detail: impl Into<String>, latency: Duration) -> Self {
        Self {
            provider_id,
            reason: FailureReason::Internal,
            detail: detail.into(),
            latency,
        }
    }
}

/// Outcome of asking one provider for a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RateQuote {
    Success(SuccessQuote),
    Failure(FailedQuote),
}

impl RateQuote {
    /// Provider the quote belongs to.
    pub fn provider_id(&self) -> &ProviderId {
        match self {
            RateQuote::Success(q) => q.provider_id(),
            RateQuote::Failure(q) => &q.provider_id,
        }
    }

    /// Time the provider took.
    pub fn latency(&self) -> Duration {
        match self {
            RateQuote::Success(q) => q.latency(),
            RateQuote::Failure(q) => q.latency,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RateQuote::Success(_))
    }

    pub fn as_success(&self) -> Option<&SuccessQuote> {
        match self {
            RateQuote::Success(q) => Some(q),
            RateQuote::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&FailedQuote> {
        match self {
            RateQuote::Success(_) => None,
            RateQuote::Failure(q) => Some(q),
        }
    }
}

impl From<SuccessQuote> for RateQuote {
    fn from(quote: SuccessQuote) -> Self {
        RateQuote::Success(quote)
    }
}

impl From<FailedQuote> for RateQuote {
    fn from(quote: FailedQuote) -> Self {
        RateQuote::Failure(quote)
    }
}
