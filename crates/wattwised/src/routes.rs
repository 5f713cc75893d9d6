//! HTTP routes for wattwised

use crate::form::CalcInput;
use crate::page;
use crate::server::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Form, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use wattwise_common::{build_query, ConversationSession};

type AppStateArc = Arc<AppState>;

// ============================================================================
// Calculator
// ============================================================================

pub fn calculator_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/", get(show_form))
        .route("/calculate", post(calculate))
}

async fn show_form() -> Html<String> {
    Html(page::form_page())
}

/// Build the query from the form and answer it in a fresh session
async fn calculate(
    State(state): State<AppStateArc>,
    Form(input): Form<CalcInput>,
) -> (StatusCode, Html<String>) {
    let query = match input
        .to_usage_form()
        .map_err(|e| e.to_string())
        .and_then(|form| build_query(&form).map_err(|e| e.to_string()))
    {
        Ok(query) => query,
        Err(message) => {
            warn!(error = %message, "Rejected calculator form");
            return (StatusCode::BAD_REQUEST, Html(page::error_page(&message)));
        }
    };

    info!(query = %query, "Calculating");

    // Each submission is independent
    let mut session = ConversationSession::new();
    let runtime = &state.runtime;
    match runtime.agent.run(&mut session, &query, &runtime.deps).await {
        Ok(reply) => (StatusCode::OK, Html(page::result_page(&reply.content))),
        Err(e) => {
            error!(error = %e, "Calculation failed");
            (
                StatusCode::BAD_GATEWAY,
                Html(page::error_page(&format!("Could not compute an answer: {}", e))),
            )
        }
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub fact_store: String,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    let fact_store = match state.runtime.deps.store.healthcheck().await {
        Ok(()) => "ok".to_string(),
        Err(e) => e.to_string(),
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        fact_store,
    })
}
