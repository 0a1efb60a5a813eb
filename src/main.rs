//! PersonaPlex probe server - liveness/readiness endpoints for orchestration

use personaplex_launcher::config::{BIND_HOST, ProbeSettings, ProcessEnv};
use personaplex_launcher::{AppState, create_router, init_tracing};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = ProbeSettings::from_env(&ProcessEnv);
    info!("Probe settings: {:?}", settings);

    let addr = format!("{BIND_HOST}:{}", settings.port);
    let app = create_router(AppState::new(settings));

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("PersonaPlex probe listening on http://{}", addr);
    info!("Available endpoints:");
    info!("  - GET  /health  - Liveness probe");
    info!("  - GET  /ready   - Readiness probe");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}
