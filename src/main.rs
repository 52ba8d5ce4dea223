mod config;
mod facts;
mod handlers;
mod models;
mod router;
mod runner;
mod sysdescr;
mod utils;
mod xml;

use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use facts::Catalogs;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub catalogs: Catalogs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netfacts=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let cfg = Config::load();
    tracing::info!("Starting NetFacts Server");
    tracing::info!("Listen: {}", cfg.listen_addr);
    tracing::info!(
        "Device defaults: user={} ssh_port={} netconf_port={} timeout={}s",
        cfg.default_ssh_user,
        cfg.ssh_port,
        cfg.netconf_port,
        cfg.ssh_timeout_secs
    );

    let catalogs = Catalogs::new();
    for catalog in catalogs.all() {
        tracing::info!(
            "Loaded {} catalog ({} subsets)",
            catalog.platform(),
            catalog.names().len()
        );
    }

    // Create app state
    let state = Arc::new(AppState {
        config: cfg.clone(),
        catalogs,
    });

    // Build router
    let app = router::build(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    tracing::info!("NetFacts listening on {}", cfg.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("NetFacts shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
