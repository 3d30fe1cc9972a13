//! Rendering comparison results for the terminal.

use std::fmt::Write;

use ratescout_fx::{ComparisonResult, RateQuote};

/// Message printed when no provider produced an offer.
pub const NO_OFFERS: &str = "no offers available, try again later";

/// Human readable table, one row per provider in registration order.
pub fn render_table(result: &ComparisonResult) -> String {
    let request = &result.request;
    let target = request.target();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Converting {} {} to {} ({} providers, {}ms)",
        request.amount(),
        request.source(),
        target,
        result.all_quotes.len(),
        result.elapsed.as_millis()
    );
    let _ = writeln!(
        out,
        "{:<20} {:<8} {:>14} {:>16} {:>9}  {}",
        "PROVIDER", "STATUS", "RATE", "AMOUNT", "LATENCY", "DETAIL"
    );

    for quote in &result.all_quotes {
        let latency = format!("{}ms", quote.latency().as_millis());
        let _ = match quote {
            RateQuote::Success(q) => writeln!(
                out,
                "{:<20} {:<8} {:>14} {:>16} {:>9}",
                q.provider_id().as_str(),
                "ok",
                q.rate().normalize(),
                target.round(q.converted_amount()),
                latency
            ),
            RateQuote::Failure(q) => writeln!(
                out,
                "{:<20} {:<8} {:>14} {:>16} {:>9}  {}",
                q.provider_id.as_str(),
                q.reason.as_str(),
                "-",
                "-",
                latency,
                q.detail
            ),
        };
    }

    out.push('\n');
    match &result.winner {
        Some(best) => {
            let _ = writeln!(
                out,
                "Best offer: {} gives {} {} at rate {}",
                best.provider_id(),
                target.round(best.converted_amount()),
                target,
                best.rate().normalize()
            );
        }
        None => {
            let _ = writeln!(out, "{NO_OFFERS}");
        }
    }

    out
}

/// The full result as pretty printed JSON.
pub fn render_json(result: &ComparisonResult) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratescout_common::{now, ComparisonId, ProviderId};
    use ratescout_fx::{ConversionRequest, FailedQuote, ProviderError, SuccessQuote};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn pid(id: &str) -> ProviderId {
        ProviderId::new(id).unwrap()
    }

    fn result(with_winner: bool) -> ComparisonResult {
        let request = ConversionRequest::parse("USD", "JPY", "1000").unwrap();
        let mut all_quotes = vec![RateQuote::from(FailedQuote::from_error(
            pid("api3"),
            &ProviderError::Network("connection refused".into()),
            Duration::from_millis(12),
        ))];
        let winner = if with_winner {
            let quote = SuccessQuote::new(
                pid("api1"),
                &request,
                dec!(151.2346),
                Duration::from_millis(230),
            )
            .unwrap();
            all_quotes.insert(0, quote.clone().into());
            Some(quote)
        } else {
            None
        };

        ComparisonResult {
            id: ComparisonId::new(),
            request,
            winner,
            all_quotes,
            elapsed: Duration::from_millis(240),
            completed_at: now(),
        }
    }

    #[test]
    fn test_table_rounds_to_target_currency() {
        let table = render_table(&result(true));

        assert!(table.starts_with("Converting 1000 USD to JPY (2 providers, 240ms)"));
        assert!(table.contains("151235"));
        assert!(!table.contains("151234.6"));
        assert!(table.contains("Best offer: api1 gives 151235 JPY at rate 151.2346"));
        assert!(table.contains("network"));
        assert!(table.contains("connection refused"));
    }

    #[test]
    fn test_table_without_offers() {
        let table = render_table(&result(false));

        assert!(table.trim_end().ends_with(NO_OFFERS));
    }

    #[test]
    fn test_json_output() {
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&result(true)).unwrap()).unwrap();

        assert_eq!(json["winner"]["provider_id"], "api1");
        assert_eq!(json["all_quotes"].as_array().unwrap().len(), 2);
        assert_eq!(json["elapsed"], 240);
    }
}
