//! Storefront HTTP server.

use shop::config::{Config, StorageBackend};
use shop::server::{build_router, payment_gateway, AppState, Repositories};
use shop::{db, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use storefront_core::environment::SystemClock;
use storefront_runtime::metrics::MetricsServer;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env: {e}");
        }
    }

    let config = Config::from_env()?;
    telemetry::init_tracing(&config.server.log_level);
    info!("Starting storefront server");
    info!(
        backend = ?config.storage.backend,
        gateway = ?config.payment.gateway,
        currency = %config.payment.currency,
        "Configuration loaded"
    );

    let metrics_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.metrics_port).parse()?;
    let mut metrics_server = MetricsServer::new(metrics_addr);
    if let Err(e) = metrics_server.start() {
        warn!(error = %e, "Metrics recorder not installed; /metrics disabled");
    }
    telemetry::describe_metrics();

    let repos = match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Repositories::in_memory()
        },
        StorageBackend::Postgres => {
            info!("Connecting to database...");
            let pool = db::connect(&config.storage).await?;
            db::migrate(&pool).await?;
            info!("Database ready");
            Repositories::postgres(&pool)
        },
    };

    let gateway = payment_gateway(&config.payment)?;
    let state = AppState::new(&config, repos, gateway, Arc::new(SystemClock)).with_metrics(Arc::new(metrics_server));
    let checkout = state.checkout.clone();
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Draining checkout store...");
    if let Err(e) = checkout.shutdown(config.shutdown_timeout()).await {
        error!(error = %e, "Checkout store did not drain cleanly");
    }

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
        () = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}
