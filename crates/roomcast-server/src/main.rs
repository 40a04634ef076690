use std::sync::Arc;

use tracing::{info, warn};

use roomcast_api::state::AppStateInner;
use roomcast_db::Database;
use roomcast_gateway::Dispatcher;
use roomcast_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "roomcast=debug,roomcast_server=debug,roomcast_gateway=debug,roomcast_api=debug,roomcast_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Storage, broadcast fan-out and services are built once and shared
    let db = Arc::new(Database::open(&config.db_path)?);
    let state = AppStateInner::new(db, Dispatcher::new());

    let app = roomcast_server::app(state, &config)?;

    let listener = roomcast_server::bind(&config).await?;
    info!("Roomcast listening on {}", listener.local_addr()?);
    info!("Upload limit: {} bytes", config.max_upload_bytes);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
