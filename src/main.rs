use anyhow::Context;
use tokio::signal;

use seedmix_api::{
    api::{create_router, AppState},
    config::Config,
    db::{create_redis_client, Cache},
    logging::init_logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_logging(config.log_format)?;

    let (cache, cache_writer) = match config.redis_url.as_deref() {
        Some(redis_url) => {
            let client = create_redis_client(redis_url).context("Invalid REDIS_URL")?;
            let (cache, writer) = Cache::new(client);
            (Some(cache), Some(writer))
        }
        None => {
            tracing::info!("REDIS_URL not set, recommendation caching disabled");
            (None, None)
        }
    };

    let address = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, cache)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;
    tracing::info!(address = %address, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(writer) = cache_writer {
        writer.shutdown().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}
