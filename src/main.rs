use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use ideaboard::auth::TokenSigner;
use ideaboard::config::AppConfig;
use ideaboard::context::AppState;
use ideaboard::email::LogEmailer;
use ideaboard::oauth::HttpOAuthClient;
use ideaboard::routes;
use ideaboard::services::Collaborators;
use ideaboard::storage::postgres::PostgresDatabase;
use ideaboard::worker::{self, TaskQueue};

/// Resolves on SIGINT or SIGTERM. A handler that cannot be installed
/// never fires.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    config.validate().context("invalid configuration")?;
    tracing::info!(environment = ?config.environment, mode = ?config.host.mode, "starting ideaboard");

    let db = PostgresDatabase::connect_lazy(&config.database).context("invalid database configuration")?;
    let collaborators = Collaborators {
        signer: Arc::new(TokenSigner::new(&config.security.jwt_secret)?),
        oauth: Arc::new(HttpOAuthClient::new()?),
        emailer: Arc::new(LogEmailer),
        config: Arc::new(config),
    };

    let (queue, receiver) = TaskQueue::channel();
    let state = AppState {
        db: Arc::new(db),
        collaborators,
        queue,
    };
    let workers = worker::spawn(state.job_environment(), receiver, state.config().worker.concurrency);
    tracing::info!(workers = workers.len(), "workers started");

    let bind_addr = format!("0.0.0.0:{}", state.config().server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("ideaboard listening on http://{}", bind_addr);

    routes::serve(listener, state, workers, shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("ideaboard stopped");
    Ok(())
}
