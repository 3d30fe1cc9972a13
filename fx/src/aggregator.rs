//! Concurrent best-offer aggregator.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use ratescout_common::{
    constants, duration_ms, now, ComparisonId, CurrencyCode, ProviderId, Timestamp,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::conversion::ConversionRequest;
use crate::error::{FxError, FxResult};
use crate::provider::RateProvider;
use crate::quote::{FailedQuote, RateQuote, SuccessQuote};
use crate::selector::select;

/// Configuration for the aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Deadline for providers registered without their own timeout.
    pub default_timeout: Duration,
    /// Maximum provider calls in flight per comparison. Time spent waiting
    /// for a slot counts against the provider's deadline.
    pub max_concurrency: Option<usize>,
    /// Abort provider tasks that miss their deadline instead of letting
    /// them run to completion in the background.
    pub abort_on_timeout: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            default_timeout: constants::default_provider_timeout(),
            max_concurrency: None,
            abort_on_timeout: false,
        }
    }
}

impl AggregatorConfig {
    /// Validate configuration.
    pub fn validate(&self) -> FxResult<()> {
        if self.default_timeout.is_zero() {
            return Err(FxError::Configuration("default timeout cannot be 0".into()));
        }
        if self.default_timeout > constants::max_provider_timeout() {
            return Err(FxError::Configuration(format!(
                "default timeout cannot exceed {}s",
                constants::max_provider_timeout().as_secs()
            )));
        }
        if self.max_concurrency == Some(0) {
            return Err(FxError::Configuration("max concurrency cannot be 0".into()));
        }
        Ok(())
    }
}

/// A provider together with the deadline the aggregator enforces on it.
#[derive(Clone)]
pub struct ProviderRegistration {
    provider: Arc<dyn RateProvider>,
    timeout: Duration,
}

impl ProviderRegistration {
    pub fn id(&self) -> &ProviderId {
        self.provider.id()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for ProviderRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistration")
            .field("id", self.id())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Outcome of one comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Comparison identifier, also attached to log lines.
    pub id: ComparisonId,
    /// Request that was compared.
    pub request: ConversionRequest,
    /// Best offer, `None` when no provider succeeded.
    pub winner: Option<SuccessQuote>,
    /// One quote per registered provider, in registration order.
    pub all_quotes: Vec<RateQuote>,
    /// Wall time of the whole comparison.
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    /// When the comparison finished.
    pub completed_at: Timestamp,
}

impl ComparisonResult {
    /// Whether any provider produced an offer.
    pub fn has_offer(&self) -> bool {
        self.winner.is_some()
    }

    pub fn successful_count(&self) -> usize {
        self.all_quotes.iter().filter(|q| q.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.all_quotes.len() - self.successful_count()
    }
}

/// Builder collecting provider registrations.
pub struct AggregatorBuilder {
    config: AggregatorConfig,
    providers: Vec<(Arc<dyn RateProvider>, Option<Duration>)>,
}

impl AggregatorBuilder {
    /// Replace the aggregator configuration.
    pub fn config(mut self, config: AggregatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a provider using the default timeout.
    pub fn register(mut self, provider: Arc<dyn RateProvider>) -> Self {
        self.providers.push((provider, None));
        self
    }

    /// Register a provider with its own timeout.
    pub fn register_with_timeout(mut self, provider: Arc<dyn RateProvider>, timeout: Duration) -> Self {
        self.providers.push((provider, Some(timeout)));
        self
    }

    /// Validate the configuration and freeze the registry.
    pub fn build(self) -> FxResult<Aggregator> {
        self.config.validate()?;

        if self.providers.is_empty() {
            return Err(FxError::Configuration("no rate providers registered".into()));
        }

        let mut seen = HashSet::new();
        let mut registrations = Vec::with_capacity(self.providers.len());
        for (provider, timeout) in self.providers {
            if !seen.insert(provider.id().clone()) {
                return Err(FxError::DuplicateProvider(provider.id().clone()));
            }
            let timeout = timeout.unwrap_or(self.config.default_timeout);
            if timeout.is_zero() || timeout > constants::max_provider_timeout() {
                return Err(FxError::Configuration(format!(
                    "provider {}: timeout must be between 1ms and {}s",
                    provider.id(),
                    constants::max_provider_timeout().as_secs()
                )));
            }
            registrations.push(ProviderRegistration { provider, timeout });
        }

        Ok(Aggregator {
            registrations: Arc::from(registrations),
            config: self.config,
        })
    }
}

/// Queries every registered provider concurrently and selects the best offer.
///
/// The registry is immutable after [`AggregatorBuilder::build`]; each call to
/// [`Aggregator::compare`] is independent and shares no mutable state.
#[derive(Clone)]
pub struct Aggregator {
    registrations: Arc<[ProviderRegistration]>,
    config: AggregatorConfig,
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("registrations", &self.registrations)
            .field("config", &self.config)
            .finish()
    }
}

impl Aggregator {
    /// Start building an aggregator.
    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder {
            config: AggregatorConfig::default(),
            providers: Vec::new(),
        }
    }

    /// Registered providers, in registration order.
    pub fn registrations(&self) -> &[ProviderRegistration] {
        &self.registrations
    }

    /// Longest deadline among the registered providers.
    pub fn max_timeout(&self) -> Duration {
        self.registrations
            .iter()
            .map(ProviderRegistration::timeout)
            .max()
            .unwrap_or(self.config.default_timeout)
    }

    /// Validate raw input, then compare.
    ///
    /// Invalid input is rejected before any provider is contacted.
    pub async fn compare_raw(
        &self,
        source: &str,
        target: &str,
        amount: Decimal,
    ) -> FxResult<ComparisonResult> {
        let request = CurrencyCode::parse(source)
            .and_then(|source| Ok((source, CurrencyCode::parse(target)?)))
            .and_then(|(source, target)| ConversionRequest::new(source, target, amount))
            .map_err(|e| {
                warn!(from = source, to = target, amount = %amount, error = %e, "Rejected conversion request");
                FxError::from(e)
            })?;

        Ok(self.compare(&request).await)
    }

    /// Ask every provider for a quote and pick the best offer.
    ///
    /// Waits for every provider to answer or hit its deadline, so the call
    /// takes roughly the longest configured timeout at most. Provider
    /// failures are recorded as failed quotes, never returned as errors.
    pub async fn compare(&self, request: &ConversionRequest) -> ComparisonResult {
        let id = ComparisonId::new();
        let span = info_span!(
            "compare",
            comparison_id = %id,
            pair = %request.pair(),
            amount = %request.amount()
        );
        self.run(id, request).instrument(span).await
    }

    async fn run(&self, id: ComparisonId, request: &ConversionRequest) -> ComparisonResult {
        let started = Instant::now();
        let shared = Arc::new(request.clone());
        let permits = self
            .config
            .max_concurrency
            .map(|limit| Arc::new(Semaphore::new(limit)));

        debug!(providers = self.registrations.len(), "Dispatching to providers");

        // join_all yields results in input order: one slot per registration.
        let all_quotes = join_all(
            self.registrations
                .iter()
                .map(|registration| self.dispatch(registration, shared.clone(), permits.clone())),
        )
        .await;

        for quote in &all_quotes {
            match quote {
                RateQuote::Success(q) => debug!(
                    provider = %q.provider_id(),
                    rate = %q.rate(),
                    converted_amount = %q.converted_amount(),
                    latency_ms = q.latency().as_millis() as u64,
                    "Provider quoted"
                ),
                RateQuote::Failure(q) => warn!(
                    provider = %q.provider_id,
                    reason = %q.reason,
                    detail = %q.detail,
                    latency_ms = q.latency.as_millis() as u64,
                    "Provider failed to quote"
                ),
            }
        }

        let winner = select(all_quotes.iter().filter_map(RateQuote::as_success));
        let elapsed = started.elapsed();

        match &winner {
            Some(best) => info!(
                provider = %best.provider_id(),
                rate = %best.rate(),
                converted_amount = %best.converted_amount(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Best offer selected"
            ),
            None => warn!(
                providers = all_quotes.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "No offers available"
            ),
        }

        ComparisonResult {
            id,
            request: request.clone(),
            winner,
            all_quotes,
            elapsed,
            completed_at: now(),
        }
    }

    /// Run one provider on its own task, bounded by its deadline.
    async fn dispatch(
        &self,
        registration: &ProviderRegistration,
        request: Arc<ConversionRequest>,
        permits: Option<Arc<Semaphore>>,
    ) -> RateQuote {
        let started = Instant::now();
        let provider = registration.provider.clone();
        let provider_id = provider.id().clone();

        let handle = tokio::spawn(
            async move {
                let _permit = match permits {
                    Some(permits) => permits.acquire_owned().await.ok(),
                    None => None,
                };
                provider.quote(&request).await
            }
            .in_current_span(),
        );
        let abort = handle.abort_handle();

        match timeout(registration.timeout, handle).await {
            Ok(Ok(quote)) => quote,
            Ok(Err(e)) => {
                let detail = if e.is_panic() {
                    "provider task panicked"
                } else {
                    "provider task was cancelled"
                };
                FailedQuote::internal(provider_id, detail, started.elapsed()).into()
            }
            Err(_) => {
                // The detached task may still finish; its result is dropped.
                if self.config.abort_on_timeout {
                    abort.abort();
                }
                FailedQuote::timeout(provider_id, registration.timeout).into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, ProviderResult};
    use crate::provider::SimulatedRateProvider;
    use crate::quote::FailureReason;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn pid(id: &str) -> ProviderId {
        ProviderId::new(id).unwrap()
    }

    fn usd_eur(amount: &str) -> ConversionRequest {
        ConversionRequest::parse("USD", "EUR", amount).unwrap()
    }

    fn fixed(id: &str, rate: Decimal, latency_ms: u64) -> Arc<dyn RateProvider> {
        Arc::new(
            SimulatedRateProvider::fixed(pid(id), rate)
                .with_latency(Duration::from_millis(latency_ms)),
        )
    }

    fn failing(id: &str) -> Arc<dyn RateProvider> {
        Arc::new(SimulatedRateProvider::failing(
            pid(id),
            ProviderError::Network("connection refused".into()),
        ))
    }

    fn reasons(result: &ComparisonResult) -> Vec<Option<FailureReason>> {
        result
            .all_quotes
            .iter()
            .map(|q| q.as_failure().map(|f| f.reason))
            .collect()
    }

    fn ids(result: &ComparisonResult) -> Vec<String> {
        result
            .all_quotes
            .iter()
            .map(|q| q.provider_id().to_string())
            .collect()
    }

    /// Sleeps, then flags completion; used to observe abandoned tasks.
    struct LateProvider {
        id: ProviderId,
        delay: Duration,
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl RateProvider for LateProvider {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        async fn fetch_rate(&self, _request: &ConversionRequest) -> ProviderResult<Decimal> {
            tokio::time::sleep(self.delay).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(dec!(2))
        }
    }

    struct PanickingProvider {
        id: ProviderId,
    }

    #[async_trait]
    impl RateProvider for PanickingProvider {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        async fn fetch_rate(&self, _request: &ConversionRequest) -> ProviderResult<Decimal> {
            panic!("provider bug");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_best_offer_with_partial_failure() {
        let aggregator = Aggregator::builder()
            .register(fixed("P1", dec!(0.90), 10))
            .register(fixed("P2", dec!(0.91), 10))
            .register(failing("P3"))
            .build()
            .unwrap();

        let result = aggregator.compare(&usd_eur("1000")).await;

        let winner = result.winner.clone().unwrap();
        assert_eq!(winner.provider_id(), &pid("P2"));
        assert_eq!(winner.converted_amount(), dec!(910));
        assert_eq!(ids(&result), vec!["P1", "P2", "P3"]);
        assert_eq!(reasons(&result), vec![None, None, Some(FailureReason::Network)]);
        assert_eq!(result.successful_count(), 2);
        assert_eq!(result.failed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_providers_fail() {
        let aggregator = Aggregator::builder()
            .register(failing("P1"))
            .register(failing("P2"))
            .register(failing("P3"))
            .build()
            .unwrap();

        let result = aggregator.compare(&usd_eur("1000")).await;

        assert!(result.winner.is_none());
        assert!(!result.has_offer());
        assert_eq!(ids(&result), vec!["P1", "P2", "P3"]);
        assert!(result.all_quotes.iter().all(|q| !q.is_success()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out_others_still_count() {
        let aggregator = Aggregator::builder()
            .config(AggregatorConfig {
                default_timeout: Duration::from_millis(500),
                ..Default::default()
            })
            .register(fixed("P1", dec!(0.99), 2_000))
            .register(fixed("P2", dec!(0.91), 50))
            .register(fixed("P3", dec!(0.90), 100))
            .build()
            .unwrap();

        let result = aggregator.compare(&usd_eur("1000")).await;

        let timeout = result.all_quotes[0].as_failure().unwrap();
        assert_eq!(timeout.reason, FailureReason::Timeout);
        assert_eq!(timeout.latency, Duration::from_millis(500));
        assert_eq!(result.winner.unwrap().provider_id(), &pid("P2"));
        assert!(result.elapsed < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_amounts_prefer_lower_latency() {
        let aggregator = Aggregator::builder()
            .register(fixed("alpha", dec!(1.25), 150))
            .register(fixed("beta", dec!(1.25), 50))
            .build()
            .unwrap();

        let result = aggregator.compare(&usd_eur("1000")).await;

        let winner = result.winner.unwrap();
        assert_eq!(winner.converted_amount(), dec!(1250.00));
        assert_eq!(winner.provider_id(), &pid("beta"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_amounts_and_latency_prefer_provider_id() {
        let aggregator = Aggregator::builder()
            .register(fixed("zulu", dec!(1.25), 100))
            .register(fixed("bravo", dec!(1.25), 100))
            .build()
            .unwrap();

        let result = aggregator.compare(&usd_eur("1000")).await;

        assert_eq!(result.winner.unwrap().provider_id(), &pid("bravo"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_success_wins_regardless_of_amount() {
        let aggregator = Aggregator::builder()
            .register(failing("P1"))
            .register(fixed("P2", dec!(0.000001), 10))
            .build()
            .unwrap();

        let result = aggregator.compare(&usd_eur("1")).await;

        assert_eq!(result.winner.unwrap().provider_id(), &pid("P2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registration_order_independent_of_completion_order() {
        let aggregator = Aggregator::builder()
            .register(fixed("slow", dec!(0.9), 300))
            .register(fixed("medium", dec!(0.9), 200))
            .register(fixed("fast", dec!(0.9), 100))
            .build()
            .unwrap();

        let result = aggregator.compare(&usd_eur("10")).await;

        assert_eq!(ids(&result), vec!["slow", "medium", "fast"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_providers_run_in_parallel() {
        let aggregator = Aggregator::builder()
            .register(fixed("P1", dec!(0.9), 1_000))
            .register(fixed("P2", dec!(0.9), 1_000))
            .register(fixed("P3", dec!(0.9), 1_000))
            .build()
            .unwrap();

        let result = aggregator.compare(&usd_eur("10")).await;

        assert_eq!(result.successful_count(), 3);
        assert!(result.elapsed < Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_providers_bounded_by_max_timeout() {
        let aggregator = Aggregator::builder()
            .register_with_timeout(
                Arc::new(SimulatedRateProvider::fixed(pid("hang1"), dec!(1)).hanging()),
                Duration::from_millis(300),
            )
            .register_with_timeout(
                Arc::new(SimulatedRateProvider::fixed(pid("hang2"), dec!(1)).hanging()),
                Duration::from_millis(800),
            )
            .build()
            .unwrap();

        let result = aggregator.compare(&usd_eur("10")).await;

        assert_eq!(aggregator.max_timeout(), Duration::from_millis(800));
        assert!(result.winner.is_none());
        assert_eq!(
            reasons(&result),
            vec![Some(FailureReason::Timeout), Some(FailureReason::Timeout)]
        );
        assert!(result.elapsed >= Duration::from_millis(800));
        assert!(result.elapsed < Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_task_keeps_running_by_default() {
        let finished = Arc::new(AtomicBool::new(false));
        let aggregator = Aggregator::builder()
            .register_with_timeout(
                Arc::new(LateProvider {
                    id: pid("late"),
                    delay: Duration::from_secs(5),
                    finished: finished.clone(),
                }),
                Duration::from_millis(100),
            )
            .build()
            .unwrap();

        let result = aggregator.compare(&usd_eur("10")).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(result.all_quotes.len(), 1);
        assert_eq!(reasons(&result), vec![Some(FailureReason::Timeout)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_on_timeout_cancels_task() {
        let finished = Arc::new(AtomicBool::new(false));
        let aggregator = Aggregator::builder()
            .config(AggregatorConfig {
                default_timeout: Duration::from_millis(100),
                abort_on_timeout: true,
                ..Default::default()
            })
            .register(Arc::new(LateProvider {
                id: pid("late"),
                delay: Duration::from_secs(5),
                finished: finished.clone(),
            }))
            .build()
            .unwrap();

        aggregator.compare(&usd_eur("10")).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_provider_is_internal_failure() {
        let aggregator = Aggregator::builder()
            .register(Arc::new(PanickingProvider { id: pid("buggy") }))
            .register(fixed("ok", dec!(0.9), 10))
            .build()
            .unwrap();

        let result = aggregator.compare(&usd_eur("10")).await;

        assert_eq!(reasons(&result), vec![Some(FailureReason::Internal), None]);
        assert_eq!(result.winner.unwrap().provider_id(), &pid("ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit_counts_against_deadline() {
        let aggregator = Aggregator::builder()
            .config(AggregatorConfig {
                default_timeout: Duration::from_millis(250),
                max_concurrency: Some(1),
                ..Default::default()
            })
            .register(fixed("P1", dec!(0.9), 100))
            .register(fixed("P2", dec!(0.9), 100))
            .register(fixed("P3", dec!(0.9), 100))
            .build()
            .unwrap();

        let result = aggregator.compare(&usd_eur("10")).await;

        let timeouts = reasons(&result)
            .into_iter()
            .filter(|r| *r == Some(FailureReason::Timeout))
            .count();
        assert_eq!(result.successful_count(), 2);
        assert_eq!(timeouts, 1);
        assert!(result.elapsed < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_invalid_raw_request_skips_providers() {
        let provider = Arc::new(SimulatedRateProvider::fixed(pid("P1"), dec!(0.9)));
        let aggregator = Aggregator::builder()
            .register(provider.clone())
            .build()
            .unwrap();

        let same = aggregator.compare_raw("USD", "usd", dec!(10)).await;
        let negative = aggregator.compare_raw("USD", "EUR", dec!(-10)).await;
        let bad_code = aggregator.compare_raw("US", "EUR", dec!(10)).await;

        assert!(matches!(same, Err(FxError::InvalidRequest(_))));
        assert!(matches!(negative, Err(FxError::InvalidRequest(_))));
        assert!(matches!(bad_code, Err(FxError::InvalidRequest(_))));
        assert_eq!(provider.calls(), 0);

        let ok = aggregator.compare_raw("usd", "eur", dec!(10)).await.unwrap();
        assert_eq!(ok.winner.unwrap().converted_amount(), dec!(9.0));
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let result = Aggregator::builder()
            .register(fixed("P1", dec!(0.9), 0))
            .register(fixed("P1", dec!(0.8), 0))
            .build();

        assert!(matches!(result, Err(FxError::DuplicateProvider(id)) if id == pid("P1")));
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        assert!(matches!(
            Aggregator::builder().build(),
            Err(FxError::Configuration(_))
        ));

        let zero_timeout = Aggregator::builder()
            .register_with_timeout(fixed("P1", dec!(0.9), 0), Duration::ZERO)
            .build();
        assert!(matches!(zero_timeout, Err(FxError::Configuration(_))));

        let zero_concurrency = Aggregator::builder()
            .config(AggregatorConfig {
                max_concurrency: Some(0),
                ..Default::default()
            })
            .register(fixed("P1", dec!(0.9), 0))
            .build();
        assert!(matches!(zero_concurrency, Err(FxError::Configuration(_))));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AggregatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_debug_lists_providers_and_deadlines() {
        let aggregator = Aggregator::builder()
            .register(fixed("P1", dec!(0.9), 0))
            .register_with_timeout(failing("P2"), Duration::from_millis(750))
            .build()
            .unwrap();

        let debug = format!("{aggregator:?}");

        assert!(debug.contains("P1"));
        assert!(debug.contains("P2"));
        assert!(debug.contains("750ms"));
        assert!(debug.contains("default_timeout: 3s"));
    }

    #[tokio::test]
    async fn test_result_serializes_for_display() {
        let aggregator = Aggregator::builder()
            .register(fixed("P1", dec!(0.9), 0))
            .register(failing("P2"))
            .build()
            .unwrap();

        let result = aggregator.compare(&usd_eur("100")).await;
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["winner"]["provider_id"], "P1");
        assert_eq!(json["all_quotes"][1]["status"], "failure");
        assert_eq!(json["request"]["source"], "USD");
    }
}
