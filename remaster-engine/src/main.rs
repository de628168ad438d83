//! Remaster Engine - Main entry point
//!
//! Chunked real-time mastering and streaming service: registers tracks,
//! masters them window by window, and streams the result over HTTP/SSE.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use remaster_engine::config::Config;
use remaster_engine::{api, SharedState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for remaster-engine
#[derive(Parser, Debug)]
#[command(name = "remaster-engine")]
#[command(about = "Chunked real-time audio mastering and streaming engine")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "REMASTER_BIND_ADDR")]
    bind_addr: Option<String>,

    /// Root folder tracks are registered from
    #[arg(short, long, env = "REMASTER_LIBRARY_ROOT")]
    library_root: Option<PathBuf>,

    /// Optional TOML configuration file
    #[arg(short, long, env = "REMASTER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "remaster_engine=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).context("loading configuration file")?,
        None => Config::default(),
    };
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }
    if let Some(library_root) = args.library_root {
        config.library_root = library_root;
    }
    config.validate().context("validating configuration")?;

    info!(
        "starting remaster-engine on {} (window {}s / interval {}s, cache {} chunks, {} jobs)",
        config.bind_addr,
        config.chunk_duration_s,
        config.chunk_interval_s,
        config.cache_capacity_chunks,
        config.max_concurrent_jobs
    );

    let state = SharedState::new(config);
    api::serve(state).await.context("running HTTP server")?;

    info!("remaster-engine shut down");
    Ok(())
}
