//! Provider configuration consumed by the aggregator.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ratescout_common::ProviderId;
use serde::Deserialize;
use tracing::info;

use crate::adapters::PayloadFormat;
use crate::aggregator::{Aggregator, AggregatorConfig};
use crate::error::{FxError, FxResult};
use crate::http_provider::{Credential, HttpRateProvider};
use crate::transport::HttpTransport;

/// Registry of remote providers, usually loaded from a JSON file.
///
/// ```json
/// {
///   "timeout_ms": 3000,
///   "providers": {
///     "api1": { "endpoint": "https://api1.example/latest/{source}", "format": "json" },
///     "api2": { "endpoint": "https://api2.example/exchange", "format": "xml-total",
///               "body": "<XML><From>{source}</From><To>{target}</To><Amount>{amount}</Amount></XML>" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// Default per-provider deadline in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub abort_on_timeout: Option<bool>,
    /// Providers keyed by id; registered in key order.
    pub providers: BTreeMap<ProviderId, ProviderSettings>,
}

/// Settings for one remote provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    /// URL template, may contain `{source}`, `{target}` and `{amount}`.
    pub endpoint: String,
    #[serde(default = "default_format")]
    pub format: PayloadFormat,
    /// Request body template; when present the request is a POST.
    #[serde(default)]
    pub body: Option<String>,
    /// Deadline override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub credential: Option<Credential>,
}

fn default_format() -> PayloadFormat {
    PayloadFormat::Json
}

impl ProvidersConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> FxResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| FxError::Configuration(format!("invalid provider configuration: {e}")))
    }

    /// Aggregator settings derived from the top-level fields.
    pub fn aggregator_config(&self) -> AggregatorConfig {
        let defaults = AggregatorConfig::default();
        AggregatorConfig {
            default_timeout: self
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_timeout),
            max_concurrency: self.max_concurrency.or(defaults.max_concurrency),
            abort_on_timeout: self.abort_on_timeout.unwrap_or(defaults.abort_on_timeout),
        }
    }

    /// Create one [`HttpRateProvider`] per entry, all sharing `transport`.
    pub fn build_aggregator(&self, transport: Arc<dyn HttpTransport>) -> FxResult<Aggregator> {
        let mut builder = Aggregator::builder().config(self.aggregator_config());

        for (id, settings) in &self.providers {
            let mut provider =
                HttpRateProvider::new(id.clone(), &settings.endpoint, settings.format, transport.clone())?;
            if let Some(body) = &settings.body {
                provider = provider.with_body_template(body);
            }
            if let Some(credential) = &settings.credential {
                provider = provider.with_credential(credential.clone());
            }

            info!(
                provider = %id,
                format = %settings.format,
                timeout_ms = settings.timeout_ms,
                "Registering rate provider"
            );

            builder = match settings.timeout_ms {
                Some(ms) => builder.register_with_timeout(Arc::new(provider), Duration::from_millis(ms)),
                None => builder.register(Arc::new(provider)),
            };
        }

        builder.build()
    }
}
