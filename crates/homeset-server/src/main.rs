mod bridge;
mod gateway;
mod policy;
mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use homeset_core::{HomeService, Settings};
use homeset_db::Database;

use crate::bridge::BridgeHost;
use crate::policy::SharePolicy;
use crate::routes::AppStateInner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "homeset=debug,homeset_core=debug,homeset_db=info,tower_http=debug".into()
            }),
        )
        .init();

    // Config
    let db_path: PathBuf = std::env::var("HOMESET_DB_PATH")
        .unwrap_or_else(|_| "homes.db".into())
        .into();
    let host = std::env::var("HOMESET_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HOMESET_PORT")
        .unwrap_or_else(|_| "3100".into())
        .parse()?;
    let bridge_token = std::env::var("HOMESET_BRIDGE_TOKEN")
        .ok()
        .filter(|t| !t.is_empty());
    let api_token = std::env::var("HOMESET_API_TOKEN")
        .ok()
        .filter(|t| !t.is_empty())
        .or_else(|| bridge_token.clone());

    let settings = Settings::from_env()?;
    let policy = SharePolicy::from_env()?;
    info!(?settings, ?policy, "Loaded settings");
    if bridge_token.is_none() {
        warn!("HOMESET_BRIDGE_TOKEN unset, bridge connections are not authenticated");
    }
    if api_token.is_none() {
        warn!("HOMESET_API_TOKEN and HOMESET_BRIDGE_TOKEN unset, command routes are open");
    }

    let db = Arc::new(Database::open(&db_path)?);

    let bridge = BridgeHost::new();
    let service = HomeService::new(db, settings, Arc::new(bridge.clone()), Arc::new(policy));
    let state = Arc::new(AppStateInner::new(service, bridge, bridge_token, api_token));

    let app = routes::router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Homeset server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Homeset server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
