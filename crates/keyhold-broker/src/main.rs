//! Keyhold broker binary.
//!
//! # Usage
//!
//! ```bash
//! # Ephemeral root secret (development; keys die with the process)
//! keyhold --generate-root-secret
//!
//! # Root secret from a hex file
//! keyhold --root-secret-file /run/secrets/keyhold.hex
//!
//! # Root secret from the environment, JSON logs
//! KEYHOLD_ROOT_SECRET=0011… keyhold --log-json
//! ```
//!
//! Requests are read from stdin and responses written to stdout, one JSON
//! object per line. Logs go to stderr.

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use keyhold_broker::{
    BrokerConfig, DEFAULT_WORKERS, KeyBroker, ROOT_SECRET_ENV, SystemEntropy, serve,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keyhold key broker
#[derive(Parser, Debug)]
#[command(name = "keyhold")]
#[command(about = "Per-service key derivation and hybrid encryption broker")]
#[command(version)]
struct Args {
    /// Path to a hex-encoded root secret (overrides KEYHOLD_ROOT_SECRET)
    #[arg(long)]
    root_secret_file: Option<PathBuf>,

    /// Generate a random root secret when none is configured
    #[arg(long)]
    generate_root_secret: bool,

    /// Maximum concurrently executing requests
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let json_layer = args.log_json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!args.log_json).then(|| fmt::layer().with_writer(std::io::stderr));
    tracing_subscriber::registry().with(filter).with(json_layer).with(text_layer).init();

    tracing::info!("Keyhold broker starting");

    let config = BrokerConfig::resolve(
        args.root_secret_file,
        std::env::var(ROOT_SECRET_ENV).ok(),
        args.generate_root_secret,
        args.workers,
    )?;
    let root = config.load_root_secret(&SystemEntropy::new())?;
    let broker = Arc::new(KeyBroker::new(root, SystemEntropy::new()));

    serve(broker, tokio::io::stdin(), tokio::io::stdout(), config.workers).await?;

    tracing::info!("Keyhold broker stopped");

    Ok(())
}
