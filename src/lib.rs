//! PersonaPlex deployment shim.
//!
//! Two entry points share this library: `personaplex-launch` turns environment
//! configuration into a `moshi.server` command line and hands control to it,
//! and `personaplex-probe` answers orchestration liveness/readiness checks.

use axum::{Router, routing::get};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod config;
pub mod error;
pub mod events;
pub mod invocation;
pub mod launcher;
pub mod v1;

use config::ProbeSettings;

#[derive(Clone, Default)]
pub struct AppState {
    pub settings: Arc<ProbeSettings>,
}

impl AppState {
    pub fn new(settings: ProbeSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(v1::health_check))
        .route("/ready", get(v1::readiness_check))
        .with_state(state)
}

/// Installs the stderr log subscriber, honouring `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "personaplex_launcher=info,personaplex_probe=info,personaplex_launch=info".into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
