//! Rate provider trait and the simulated provider used by tests and demos.

use async_trait::async_trait;
use ratescout_common::ProviderId;
use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::debug;

use crate::conversion::ConversionRequest;
use crate::error::ProviderResult;
use crate::quote::{FailedQuote, RateQuote, SuccessQuote};

/// Trait for FX rate providers.
///
/// Implementors only supply [`RateProvider::fetch_rate`]; the provided
/// [`RateProvider::quote`] turns its outcome into a [`RateQuote`] so no error
/// ever crosses the provider boundary.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider id.
    fn id(&self) -> &ProviderId;

    /// Fetch the rate for converting the request's source into its target.
    async fn fetch_rate(&self, request: &ConversionRequest) -> ProviderResult<Decimal>;

    /// Produce a quote for the request.
    async fn quote(&self, request: &ConversionRequest) -> RateQuote {
        let started = Instant::now();
        let outcome = self.fetch_rate(request).await;
        let latency = started.elapsed();

        let quote = outcome
            .and_then(|rate| SuccessQuote::new(self.id().clone(), request, rate, latency));

        match quote {
            Ok(quote) => {
                debug!(
                    provider = %self.id(),
                    pair = %request.pair(),
                    rate = %quote.rate(),
                    latency_ms = latency.as_millis() as u64,
                    "Got rate from provider"
                );
                quote.into()
            }
            Err(e) => FailedQuote::from_error(self.id().clone(), &e, latency).into(),
        }
    }
}

#[cfg(any(test, feature = "demo"))]
pub use simulated::SimulatedRateProvider;

#[cfg(any(test, feature = "demo"))]
mod simulated {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use ratescout_common::{CurrencyCode, ProviderId};
    use rust_decimal::Decimal;

    use super::RateProvider;
    use crate::conversion::ConversionRequest;
    use crate::error::{ProviderError, ProviderResult};

    /// Provider with injectable behavior: a rate table, a simulated latency,
    /// a forced failure or a call that never completes.
    pub struct SimulatedRateProvider {
        id: ProviderId,
        source: Option<CurrencyCode>,
        rates: HashMap<CurrencyCode, Decimal>,
        fallback_rate: Option<Decimal>,
        latency: Duration,
        failure: Option<ProviderError>,
        hang: bool,
        calls: AtomicUsize,
    }

    impl SimulatedRateProvider {
        /// Create a new simulated provider with an empty rate table.
        pub fn new(id: ProviderId) -> Self {
            Self {
                id,
                source: None,
                rates: HashMap::new(),
                fallback_rate: None,
                latency: Duration::ZERO,
                failure: None,
                hang: false,
                calls: AtomicUsize::new(0),
            }
        }

        /// Provider that quotes `rate` for any pair.
        pub fn fixed(id: ProviderId, rate: Decimal) -> Self {
            Self::new(id).with_fallback_rate(rate)
        }

        /// Provider that always fails with `error`.
        pub fn failing(id: ProviderId, error: ProviderError) -> Self {
            Self::new(id).with_failure(error)
        }

        /// Quote `rate` when converting into `target`.
        pub fn with_rate(mut self, target: CurrencyCode, rate: Decimal) -> Self {
            self.rates.insert(target, rate);
            self
        }

        /// Rate used for targets missing from the table.
        pub fn with_fallback_rate(mut self, rate: Decimal) -> Self {
            self.fallback_rate = Some(rate);
            self
        }

        /// Only quote requests from this source currency.
        pub fn with_source(mut self, source: CurrencyCode) -> Self {
            self.source = Some(source);
            self
        }

        /// Sleep this long before answering.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        /// Fail every call with `error` after the simulated latency.
        pub fn with_failure(mut self, error: ProviderError) -> Self {
            self.failure = Some(error);
            self
        }

        /// Never answer.
        pub fn hanging(mut self) -> Self {
            self.hang = true;
            self
        }

        /// Number of times the provider was asked for a rate.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn lookup(&self, request: &ConversionRequest) -> ProviderResult<Decimal> {
            if let Some(source) = &self.source {
                if source != request.source() {
                    return Err(ProviderError::UnsupportedPair(request.pair().to_string()));
                }
            }
            self.rates
                .get(request.target())
                .copied()
                .or(self.fallback_rate)
                .ok_or_else(|| ProviderError::UnsupportedPair(request.pair().to_string()))
        }
    }

    #[async_trait]
    impl RateProvider for SimulatedRateProvider {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        async fn fetch_rate(&self, request: &ConversionRequest) -> ProviderResult<Decimal> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.hang {
                std::future::pending::<()>().await;
            }
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if let Some(error) = &self.failure {
                return Err(error.clone());
            }
            self.lookup(request)
        }
    }
}
