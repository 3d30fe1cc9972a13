//! Format adapters decoding provider payloads into a rate.

mod envelope;
mod json;
mod xml;

use std::fmt;

use ratescout_common::parse_decimal;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::conversion::ConversionRequest;
use crate::error::{ProviderError, ProviderResult};

pub use envelope::JsonEnvelopeAdapter;
pub use json::{JsonRateAdapter, JsonRatesAdapter};
pub use xml::{XmlRatesAdapter, XmlTotalAdapter};

/// Payload shape spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadFormat {
    /// `{"USD": {"EUR": 0.91}}`
    Json,
    /// `{"rate": 0.91}`
    JsonRate,
    /// `{"statusCode": 200, "data": {"total": 910.0}}`
    JsonEnvelope,
    /// `<rates base="USD"><rate currency="EUR">0.91</rate></rates>`
    Xml,
    /// `<XML><Result>910.00</Result></XML>`
    XmlTotal,
}

impl PayloadFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonRate => "json-rate",
            Self::JsonEnvelope => "json-envelope",
            Self::Xml => "xml",
            Self::XmlTotal => "xml-total",
        }
    }

    /// Adapter decoding this format.
    pub fn adapter(self) -> Box<dyn FormatAdapter> {
        match self {
            Self::Json => Box::new(JsonRatesAdapter),
            Self::JsonRate => Box::new(JsonRateAdapter),
            Self::JsonEnvelope => Box::new(JsonEnvelopeAdapter),
            Self::Xml => Box::new(XmlRatesAdapter),
            Self::XmlTotal => Box::new(XmlTotalAdapter),
        }
    }

    /// `Accept` header value for requests expecting this format.
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json | Self::JsonRate | Self::JsonEnvelope => "application/json",
            Self::Xml | Self::XmlTotal => "application/xml",
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure decoder from a raw payload to the rate for a request.
pub trait FormatAdapter: Send + Sync {
    /// Format handled by this adapter.
    fn format(&self) -> PayloadFormat;

    /// Decode the rate converting `request.source()` into `request.target()`.
    fn decode(&self, payload: &str, request: &ConversionRequest) -> ProviderResult<Decimal>;
}

/// Parse a rate from text, rejecting non-numeric and non-positive values.
pub(crate) fn positive_rate(text: &str) -> ProviderResult<Decimal> {
    let rate = parse_decimal(text)
        .ok_or_else(|| ProviderError::Parse(format!("rate {text:?} is not a number")))?;
    if rate <= Decimal::ZERO {
        return Err(ProviderError::InvalidRate(rate.to_string()));
    }
    Ok(rate)
}

/// Derive a rate from a converted total for the request amount.
pub(crate) fn rate_from_total(total: Decimal, request: &ConversionRequest) -> ProviderResult<Decimal> {
    total
        .checked_div(request.amount())
        .ok_or_else(|| ProviderError::InvalidRate(format!("cannot derive rate from {total}")))
}

/// Parse a rate from a JSON number or numeric string.
pub(crate) fn json_rate(value: &serde_json::Value) -> ProviderResult<Decimal> {
    match value {
        serde_json::Value::Number(n) => positive_rate(&n.to_string()),
        serde_json::Value::String(s) => positive_rate(s),
        other => Err(ProviderError::Parse(format!("rate {other} is not a number"))),
    }
}
