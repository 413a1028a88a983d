use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;
use tokio_util::sync::CancellationToken;

use args::Args;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = config::Config::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;

    logger::init(&config.log_level);

    log::info!("loaded configuration from {}", args.config.display());

    let store = Arc::new(config::ConfigStore::new(config));

    let app = llm::router(store);

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind to {}", args.listen))?;

    log::info!("listening on http://{}", args.listen);

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("received shutdown signal, shutting down gracefully...");
            shutdown_signal.cancel();
        }
    });

    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result.context("server error")?;
        }
        _ = shutdown.cancelled() => {}
    }

    Ok(())
}
