//! HTTP server for wattwised

use crate::routes;
use anyhow::{Context, Result};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;
use wattwise_common::runtime::Runtime;

/// Application state shared across handlers
pub struct AppState {
    pub runtime: Runtime,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(runtime: Runtime) -> Self {
        Self {
            runtime,
            start_time: Instant::now(),
        }
    }
}

/// All routes with tracing
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::calculator_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves, then finish in-flight requests
pub async fn run(
    state: Arc<AppState>,
    bind: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}
