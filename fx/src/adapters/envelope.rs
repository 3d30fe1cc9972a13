use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::{json_rate, rate_from_total, FormatAdapter, PayloadFormat};
use crate::conversion::ConversionRequest;
use crate::error::{ProviderError, ProviderResult};

/// Decodes status envelopes carrying a converted total:
/// `{"statusCode": 200, "message": "...", "data": {"total": 910.0}}`.
///
/// The rate is derived as `total / amount`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEnvelopeAdapter;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    status_code: u16,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<EnvelopeData>,
}

#[derive(Deserialize)]
struct EnvelopeData {
    total: Option<Value>,
}

impl FormatAdapter for JsonEnvelopeAdapter {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::JsonEnvelope
    }

    fn decode(&self, payload: &str, request: &ConversionRequest) -> ProviderResult<Decimal> {
        let envelope: Envelope =
            serde_json::from_str(payload).map_err(|e| ProviderError::Parse(e.to_string()))?;

        if envelope.status_code != 200 {
            return Err(ProviderError::HttpStatus {
                status: envelope.status_code,
                message: envelope
                    .message
                    .unwrap_or_else(|| "provider reported an error".into()),
            });
        }

        let total = envelope
            .data
            .and_then(|data| data.total)
            .ok_or_else(|| ProviderError::Parse("missing data.total".into()))?;
        rate_from_total(json_rate(&total)?, request)
    }
}
