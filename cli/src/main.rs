//! RateScout CLI
//!
//! Compares conversion offers from every configured provider and prints the
//! best one.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use ratescout_common::{constants, parse_amount};
use ratescout_fx::{Aggregator, AggregatorConfig, ReqwestTransport};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod demo;
mod output;

/// Exit status when no provider produced an offer.
const EXIT_NO_OFFERS: u8 = 2;

/// RateScout CLI
#[derive(Parser, Debug)]
#[command(name = "ratescout", version)]
#[command(about = "Find the best FX conversion offer across rate providers")]
struct Args {
    /// Currency to convert from
    #[arg(short, long)]
    source: String,

    /// Currency to convert into
    #[arg(short, long)]
    target: String,

    /// Amount of source currency
    #[arg(short, long)]
    amount: String,

    /// Provider registry (JSON)
    #[arg(short, long, env = "RATESCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Default per-provider deadline in milliseconds
    #[arg(long, env = "RATESCOUT_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Use built-in simulated providers instead of a registry
    ///
    /// Takes precedence over `--config`.
    #[arg(long)]
    demo: bool,

    /// Random seed for demo latencies
    #[arg(long, requires = "demo")]
    seed: Option<u64>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let amount = parse_amount(&args.amount)?;
    let aggregator = build_aggregator(&args)?;

    info!(
        providers = aggregator.registrations().len(),
        max_timeout_ms = aggregator.max_timeout().as_millis() as u64,
        "Starting comparison"
    );

    let result = aggregator
        .compare_raw(&args.source, &args.target, amount)
        .await?;

    if args.json {
        println!("{}", output::render_json(&result)?);
    } else {
        print!("{}", output::render_table(&result));
    }

    if result.has_offer() {
        Ok(ExitCode::SUCCESS)
    } else {
        if args.json {
            eprintln!("{}", output::NO_OFFERS);
        }
        Ok(ExitCode::from(EXIT_NO_OFFERS))
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn build_aggregator(args: &Args) -> anyhow::Result<Aggregator> {
    if args.demo {
        let mut config = AggregatorConfig::default();
        if let Some(ms) = args.timeout_ms {
            config.default_timeout = Duration::from_millis(ms);
        }

        let mut builder = Aggregator::builder().config(config);
        for provider in demo::demo_providers(args.seed)? {
            builder = builder.register(provider);
        }
        return Ok(builder.build()?);
    }

    let Some(path) = &args.config else {
        bail!("no providers configured: pass --config <file> or --demo");
    };

    let mut providers = config::load_providers(path)?;
    if let Some(ms) = args.timeout_ms {
        providers.timeout_ms = Some(ms);
    }

    let transport = ReqwestTransport::new(constants::max_provider_timeout())
        .context("failed to create HTTP client")?;
    Ok(providers.build_aggregator(Arc::new(transport))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_demo_args() {
        let args = Args::try_parse_from([
            "ratescout", "--source", "USD", "--target", "EUR", "--amount", "1000", "--demo",
            "--seed", "3", "--timeout-ms", "250",
        ])
        .unwrap();

        let aggregator = build_aggregator(&args).unwrap();

        assert_eq!(aggregator.registrations().len(), 3);
        assert_eq!(aggregator.max_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_seed_requires_demo() {
        let result = Args::try_parse_from([
            "ratescout", "-s", "USD", "-t", "EUR", "-a", "1", "--seed", "3",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_missing_provider_source_is_an_error() {
        let args = Args {
            source: "USD".into(),
            target: "EUR".into(),
            amount: "1".into(),
            config: None,
            timeout_ms: None,
            demo: false,
            seed: None,
            json: false,
            log_json: false,
        };

        let err = build_aggregator(&args).unwrap_err();

        assert!(err.to_string().contains("--demo"));
    }
}
