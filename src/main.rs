use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rlm_engine::{
    config::Config,
    memory::TranscriptSource,
    router::{Effort, HttpProvider, TierLevel},
    QueryEngine, SessionConfig,
};

/// Answer a question over a transcript by recursive decomposition.
#[derive(Debug, Parser)]
#[command(name = "rlm-engine", version, about)]
struct Cli {
    /// The question to resolve.
    question: String,

    /// Path to the transcript/document file providing the context.
    #[arg(long)]
    transcript: std::path::PathBuf,

    /// Context scope label used for cache fingerprinting.
    #[arg(long, default_value = "session")]
    scope: String,

    /// Maximum recursion depth (root is 0).
    #[arg(long)]
    max_depth: Option<u32>,

    /// Model-call budget for the session.
    #[arg(long)]
    budget: Option<u32>,

    /// Starting tier: deep, standard, or light.
    #[arg(long)]
    tier: Option<TierLevel>,

    /// Reasoning effort: low, medium, or high. Conflicts with --temperature.
    #[arg(long, conflicts_with = "temperature")]
    effort: Option<Effort>,

    /// Sampling temperature. Conflicts with --effort.
    #[arg(long)]
    temperature: Option<f32>,

    /// Print the metrics snapshot as CSV after the answer.
    #[arg(long)]
    csv: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "RLM engine starting");

    let transcript = std::fs::read_to_string(&cli.transcript).map_err(|e| {
        error!(path = %cli.transcript.display(), error = %e, "Failed to read transcript");
        anyhow::anyhow!("failed to read {}: {}", cli.transcript.display(), e)
    })?;
    let source = Arc::new(TranscriptSource::new(&transcript));
    info!(
        path = %cli.transcript.display(),
        lines = source.len(),
        "Transcript loaded"
    );

    let provider = Arc::new(HttpProvider::new(&config.provider, &config.request)?);
    let engine = QueryEngine::new(&config, source, provider);

    let mut session = SessionConfig::from_config(&config).with_scope(cli.scope);
    if let Some(max_depth) = cli.max_depth {
        session.max_depth = max_depth;
    }
    if let Some(budget) = cli.budget {
        session.budget = budget;
    }
    if let Some(tier) = cli.tier {
        session.default_tier = tier;
    }
    if let Some(effort) = cli.effort {
        session.effort = Some(effort);
        session.temperature = None;
    }
    if let Some(temperature) = cli.temperature {
        session.temperature = Some(temperature);
        session.effort = None;
    }

    let resolution = match engine.resolve(&cli.question, session).await {
        Ok(resolution) => resolution,
        Err(e) => {
            error!(error = %e, "Resolution failed");
            return Err(e.into());
        }
    };

    println!("{}", resolution.answer);

    let metrics = &resolution.metrics;
    eprintln!();
    eprintln!(
        "tokens: {} in / {} out | cost: ${:.4} | cache: {} hits / {} misses | tier shifts: {}",
        metrics.input_tokens,
        metrics.output_tokens,
        metrics.cost_usd,
        metrics.cache_hits,
        metrics.cache_misses,
        metrics.tier_shifts,
    );

    if cli.csv {
        eprintln!();
        eprint!("{}", metrics.to_csv());
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        rlm_engine::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        rlm_engine::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
