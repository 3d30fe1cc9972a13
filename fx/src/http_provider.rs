//! Remote rate provider reached over HTTP.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ratescout_common::ProviderId;
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::adapters::{FormatAdapter, PayloadFormat};
use crate::conversion::ConversionRequest;
use crate::error::{FxError, FxResult, ProviderError, ProviderResult};
use crate::provider::RateProvider;
use crate::transport::{HttpMethod, HttpRequest, HttpTransport};

/// Credential injected into every request of a provider.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credential {
    /// `Authorization: Bearer <token>`
    Bearer { token: String },
    /// Arbitrary header, e.g. `X-API-Key`.
    Header { name: String, value: String },
    /// Query string parameter appended to the endpoint.
    Query { param: String, value: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Bearer { .. } => f.write_str("Bearer(***)"),
            Credential::Header { name, .. } => write!(f, "Header({name}: ***)"),
            Credential::Query { param, .. } => write!(f, "Query({param}=***)"),
        }
    }
}

/// Provider calling a remote endpoint and decoding its payload with a
/// [`FormatAdapter`].
///
/// The endpoint and optional body templates substitute `{source}`,
/// `{target}` and `{amount}`. A body template switches the request to POST.
pub struct HttpRateProvider {
    id: ProviderId,
    endpoint: String,
    body_template: Option<String>,
    credential: Option<Credential>,
    adapter: Box<dyn FormatAdapter>,
    transport: Arc<dyn HttpTransport>,
}

impl HttpRateProvider {
    /// Create a provider, rejecting endpoints that do not render to a URL.
    pub fn new(
        id: ProviderId,
        endpoint: impl Into<String>,
        format: PayloadFormat,
        transport: Arc<dyn HttpTransport>,
    ) -> FxResult<Self> {
        let endpoint = endpoint.into();
        let sample = render(&endpoint, "USD", "EUR", "1");
        Url::parse(&sample).map_err(|e| {
            FxError::Configuration(format!("provider {id}: invalid endpoint {endpoint:?}: {e}"))
        })?;

        Ok(Self {
            id,
            endpoint,
            body_template: None,
            credential: None,
            adapter: format.adapter(),
            transport,
        })
    }

    /// POST this body instead of issuing a GET.
    pub fn with_body_template(mut self, template: impl Into<String>) -> Self {
        self.body_template = Some(template.into());
        self
    }

    /// Attach a credential.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Payload format the provider expects.
    pub fn format(&self) -> PayloadFormat {
        self.adapter.format()
    }

    fn build_request(&self, request: &ConversionRequest) -> ProviderResult<HttpRequest> {
        let source = request.source().code();
        let target = request.target().code();
        let amount = request.amount().normalize().to_string();

        let mut url = Url::parse(&render(&self.endpoint, source, target, &amount))
            .map_err(|e| ProviderError::Network(format!("invalid endpoint: {e}")))?;
        if let Some(Credential::Query { param, value }) = &self.credential {
            url.query_pairs_mut().append_pair(param, value);
        }

        let mut http = match &self.body_template {
            Some(template) => HttpRequest::new(HttpMethod::Post, url.as_str())
                .with_header("content-type", self.format().content_type())
                .with_body(render(template, source, target, &amount)),
            None => HttpRequest::get(url.as_str()),
        }
        .with_header("accept", self.format().content_type());

        match &self.credential {
            Some(Credential::Bearer { token }) => {
                http = http.with_header("authorization", format!("Bearer {token}"));
            }
            Some(Credential::Header { name, value }) => {
                http = http.with_header(name.as_str(), value.as_str());
            }
            Some(Credential::Query { .. }) | None => {}
        }

        Ok(http)
    }
}

impl fmt::Debug for HttpRateProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRateProvider")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("format", &self.format())
            .field("credential", &self.credential)
            .finish()
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn fetch_rate(&self, request: &ConversionRequest) -> ProviderResult<Decimal> {
        let http = self.build_request(request)?;
        debug!(provider = %self.id, endpoint = %self.endpoint, "Requesting rate");

        let response = self.transport.execute(http).await?;
        if !response.is_success() {
            return Err(ProviderError::HttpStatus {
                status: response.status,
                message: snippet(&response.body),
            });
        }

        self.adapter.decode(&response.body, request)
    }
}

fn render(template: &str, source: &str, target: &str, amount: &str) -> String {
    template
        .replace("{source}", source)
        .replace("{target}", target)
        .replace("{amount}", amount)
}

fn snippet(body: &str) -> String {
    const MAX: usize = 120;
    let body = body.trim();
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
