use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::{json_rate, FormatAdapter, PayloadFormat};
use crate::conversion::ConversionRequest;
use crate::error::{ProviderError, ProviderResult};

/// Decodes `{"<BASE>": {"<TARGET>": rate, ...}}` rate tables.
///
/// Currency keys match case-insensitively; rates may be numbers or numeric
/// strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRatesAdapter;

impl FormatAdapter for JsonRatesAdapter {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::Json
    }

    fn decode(&self, payload: &str, request: &ConversionRequest) -> ProviderResult<Decimal> {
        let root: Value =
            serde_json::from_str(payload).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let root = root
            .as_object()
            .ok_or_else(|| ProviderError::Parse("expected a JSON object".into()))?;

        let table = lookup(root, request.source().code())
            .ok_or_else(|| {
                ProviderError::UnsupportedPair(format!("no rates for base {}", request.source()))
            })?
            .as_object()
            .ok_or_else(|| {
                ProviderError::Parse(format!("rates for {} are not an object", request.source()))
            })?;

        let rate = lookup(table, request.target().code()).ok_or_else(|| {
            ProviderError::UnsupportedPair(request.pair().to_string())
        })?;

        json_rate(rate)
    }
}

/// Decodes a single flat rate: `{"rate": 0.91}`.
///
/// The provider is expected to answer for the pair it was asked about, so
/// the payload carries no currency codes.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRateAdapter;

impl FormatAdapter for JsonRateAdapter {
    fn format(&self) -> PayloadFormat {
        PayloadFormat::JsonRate
    }

    fn decode(&self, payload: &str, _request: &ConversionRequest) -> ProviderResult<Decimal> {
        let root: Value =
            serde_json::from_str(payload).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let root = root
            .as_object()
            .ok_or_else(|| ProviderError::Parse("expected a JSON object".into()))?;

        let rate = lookup(root, "rate")
            .ok_or_else(|| ProviderError::Parse("missing \"rate\" field".into()))?;

        json_rate(rate)
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, code: &str) -> Option<&'a Value> {
    map.get(code).or_else(|| {
        map.iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(code))
            .map(|(_, value)| value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(source: &str, target: &str) -> ConversionRequest {
        ConversionRequest::parse(source, target, "100").unwrap()
    }

    #[test]
    fn test_decode_nested_rate() {
        let payload = r#"{"USD": {"EUR": 0.91, "GBP": 0.78}}"#;

        let rate = JsonRatesAdapter.decode(payload, &request("USD", "GBP")).unwrap();

        assert_eq!(rate, dec!(0.78));
    }

    #[test]
    fn test_keys_match_case_insensitively() {
        let payload = r#"{"usd": {"eur": "0.905"}}"#;

        let rate = JsonRatesAdapter.decode(payload, &request("USD", "EUR")).unwrap();

        assert_eq!(rate, dec!(0.905));
    }

    #[test]
    fn test_missing_base_is_unsupported() {
        let payload = r#"{"GBP": {"EUR": 1.16}}"#;

        let result = JsonRatesAdapter.decode(payload, &request("USD", "EUR"));

        assert!(matches!(result, Err(ProviderError::UnsupportedPair(_))));
    }

    #[test]
    fn test_missing_target_is_unsupported() {
        let payload = r#"{"USD": {"GBP": 0.78}}"#;

        let result = JsonRatesAdapter.decode(payload, &request("USD", "EUR"));

        assert_eq!(
            result,
            Err(ProviderError::UnsupportedPair("USD/EUR".into()))
        );
    }

    #[test]
    fn test_malformed_payloads() {
        let req = request("USD", "EUR");

        assert!(matches!(
            JsonRatesAdapter.decode("not json", &req),
            Err(ProviderError::Parse(_))
        ));
        assert!(matches!(
            JsonRatesAdapter.decode("[1, 2]", &req),
            Err(ProviderError::Parse(_))
        ));
        assert!(matches!(
            JsonRatesAdapter.decode(r#"{"USD": 0.91}"#, &req),
            Err(ProviderError::Parse(_))
        ));
        assert!(matches!(
            JsonRatesAdapter.decode(r#"{"USD": {"EUR": true}}"#, &req),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn test_flat_rate() {
        let req = request("USD", "EUR");

        assert_eq!(JsonRateAdapter.decode(r#"{"rate": 0.91}"#, &req).unwrap(), dec!(0.91));
        assert_eq!(
            JsonRateAdapter.decode(r#"{"Rate": "0.905", "from": "USD"}"#, &req).unwrap(),
            dec!(0.905)
        );
    }

    #[test]
    fn test_flat_rate_malformed() {
        let req = request("USD", "EUR");

        for payload in [r#"{"value": 0.91}"#, "[0.91]", r#"{"rate": null}"#, "{"] {
            assert!(
                matches!(JsonRateAdapter.decode(payload, &req), Err(ProviderError::Parse(_))),
                "accepted {payload}"
            );
        }
        assert!(matches!(
            JsonRateAdapter.decode(r#"{"rate": 0}"#, &req),
            Err(ProviderError::InvalidRate(_))
        ));
    }

    #[test]
    fn test_negative_rate_is_invalid() {
        let result = JsonRatesAdapter.decode(r#"{"USD": {"EUR": -0.91}}"#, &request("USD", "EUR"));

        assert!(matches!(result, Err(ProviderError::InvalidRate(_))));
    }
}
