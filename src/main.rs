mod cache;
mod config;
mod error;
mod handlers;
mod metrics;
mod models;
mod prompts;
mod quiz;
mod quiz_cli;
mod state;
mod upstream;

use anyhow::Context;
use clap::Parser; // for cli
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::{Args, Command};
use crate::state::AppState;

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // logs go to stderr so the quiz prompt keeps stdout to itself
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // parse cli arguments
    let args = Args::parse();
    let state = Arc::new(AppState::from_args(&args)?);

    match args.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(state, &args).await,
        Command::Quiz { file } => quiz_cli::run(state.as_ref(), &file).await,
    }
}

async fn serve(state: Arc<AppState>, args: &Args) -> anyhow::Result<()> {
    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(port = args.port, "gateway running on http://localhost:{}", args.port);
    tracing::info!(upstream = %args.upstream_url, "forwarding to model provider");
    tracing::info!(
        ttl_secs = args.cache_ttl,
        capacity = args.cache_capacity,
        max_attempts = args.max_attempts,
        "cache and retry policy"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
