//! Offline demo providers.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ratescout_common::{CurrencyCode, ProviderId};
use ratescout_fx::{ProviderError, RateProvider, SimulatedRateProvider};
use rust_decimal::Decimal;

/// Maximum random latency added to each provider.
const JITTER_MS: u64 = 50;

struct DemoProfile {
    id: &'static str,
    base_latency_ms: u64,
    usd_eur: Decimal,
    eur_usd: Decimal,
    fails: bool,
}

fn profiles() -> [DemoProfile; 3] {
    [
        DemoProfile {
            id: "mock-api1",
            base_latency_ms: 200,
            usd_eur: Decimal::new(85, 2),
            eur_usd: Decimal::new(118, 2),
            fails: false,
        },
        DemoProfile {
            id: "mock-api2",
            base_latency_ms: 300,
            usd_eur: Decimal::new(86, 2),
            eur_usd: Decimal::new(119, 2),
            fails: false,
        },
        DemoProfile {
            id: "mock-api3",
            base_latency_ms: 400,
            usd_eur: Decimal::new(87, 2),
            eur_usd: Decimal::new(120, 2),
            fails: true,
        },
    ]
}

/// Three simulated providers: two healthy ones quoting USD/EUR at 0.85 and
/// 0.86, and one that always answers with an error. Latencies are jittered,
/// reproducibly when a seed is given.
pub fn demo_providers(seed: Option<u64>) -> anyhow::Result<Vec<Arc<dyn RateProvider>>> {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    profiles()
        .into_iter()
        .map(|profile| {
            let latency = profile.base_latency_ms + rng.gen_range(0..=JITTER_MS);
            let mut provider = SimulatedRateProvider::new(ProviderId::new(profile.id)?)
                .with_rate(CurrencyCode::eur(), profile.usd_eur)
                .with_rate(CurrencyCode::usd(), profile.eur_usd)
                .with_fallback_rate(Decimal::ONE)
                .with_latency(Duration::from_millis(latency));
            if profile.fails {
                provider = provider.with_failure(ProviderError::HttpStatus {
                    status: 400,
                    message: "simulated outage".into(),
                });
            }
            Ok(Arc::new(provider) as Arc<dyn RateProvider>)
        })
        .collect()
}
