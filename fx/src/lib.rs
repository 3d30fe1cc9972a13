//! RateScout FX Engine
//!
//! Queries several exchange rate providers concurrently and picks the offer
//! that yields the most target currency.
//!
//! # Features
//!
//! - One task per provider, each bounded by its own deadline
//! - JSON, JSON envelope and XML payload adapters
//! - Deterministic best-offer selection
//! - Provider registry loadable from JSON configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ratescout_fx::{ProvidersConfig, ReqwestTransport};
//! use rust_decimal_macros::dec;
//!
//! let config = ProvidersConfig::from_json(&std::fs::read_to_string("providers.json")?)?;
//! let transport = Arc::new(ReqwestTransport::new(std::time::Duration::from_secs(5))?);
//! let aggregator = config.build_aggregator(transport)?;
//!
//! let result = aggregator.compare_raw("USD", "EUR", dec!(1000)).await?;
//! if let Some(best) = result.winner {
//!     println!("{} offers {}", best.provider_id(), best.converted_amount());
//! }
//! ```

pub mod adapters;
pub mod aggregator;
pub mod config;
pub mod conversion;
pub mod error;
pub mod http_provider;
pub mod provider;
pub mod quote;
pub mod selector;
pub mod transport;

pub use adapters::{FormatAdapter, PayloadFormat};
pub use aggregator::{Aggregator, AggregatorBuilder, AggregatorConfig, ComparisonResult, ProviderRegistration};
pub use config::{ProviderSettings, ProvidersConfig};
pub use conversion::ConversionRequest;
pub use error::{FxError, FxResult, ProviderError, ProviderResult};
pub use http_provider::{Credential, HttpRateProvider};
pub use provider::RateProvider;
#[cfg(any(test, feature = "demo"))]
pub use provider::SimulatedRateProvider;
pub use quote::{FailedQuote, FailureReason, RateQuote, SuccessQuote};
pub use selector::select;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
