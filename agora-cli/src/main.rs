use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use agora_core::core_crypto::Keypair;
use agora_core::core_hub::Hub;
use agora_core::core_protocol::StructuralValidator;
use agora_core::{init_logging_with_config, Config, LogConfig};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

mod transport;

#[derive(Parser, Debug)]
#[command(name = "agora")]
#[command(author, version, about = "Federated event-log hub", long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on for client connections
    #[arg(long, default_value = "127.0.0.1:9000")]
    listen: SocketAddr,

    /// Path to a file holding the base64-encoded 32-byte organizer key seed.
    /// When omitted, an ephemeral keypair is generated.
    #[arg(long)]
    organizer_seed: Option<PathBuf>,
}

fn load_organizer(path: Option<&PathBuf>) -> Result<Keypair> {
    let Some(path) = path else {
        return Ok(Keypair::generate());
    };
    let encoded = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read organizer seed from {}", path.display()))?;
    let seed = B64
        .decode(encoded.trim())
        .context("organizer seed is not valid base64")?;
    let seed: [u8; 32] = seed
        .try_into()
        .map_err(|_| anyhow::anyhow!("organizer seed must decode to 32 bytes"))?;
    Ok(Keypair::from_seed(&seed))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args
        .log_level
        .parse()
        .with_context(|| format!("invalid log level {:?}", args.log_level))?;
    init_logging_with_config(LogConfig::new(log_level).json_format(args.json_logs))?;

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let organizer = load_organizer(args.organizer_seed.as_ref())?;
    info!(
        organizer = %organizer.public().to_base64(),
        workers = config.hub.num_workers,
        "starting hub"
    );

    let hub = Hub::new(
        &config.hub,
        organizer.public(),
        Arc::new(StructuralValidator),
    );
    let dispatcher = hub.start();

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;

    tokio::select! {
        res = transport::serve(Arc::clone(&hub), listener) => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    hub.stop().await;
    let _ = dispatcher.await;
    Ok(())
}
