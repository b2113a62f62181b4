use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pagediff_server::{AppState, ServerConfig, build_router};

/// Page comparison API server.
#[derive(Parser)]
#[command(name = "pagediff-server", version)]
struct Cli {
    #[command(flatten)]
    config: ServerConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagediff=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app = build_router(AppState::default(), &cli.config)?;

    let listener = tokio::net::TcpListener::bind(cli.config.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.config.bind))?;
    tracing::info!(
        addr = %cli.config.bind,
        origins = ?cli.config.allowed_origins,
        body_limit = cli.config.body_limit,
        "pagediff server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(%e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
