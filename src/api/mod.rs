use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::{guardrails::GuardrailConfig, llm::ResilientClient, metrics::Metrics, obs::Obs};

pub mod handlers;
pub mod middleware;
pub mod types;

use handlers::{ask, health, metrics};
use middleware::track_requests;

#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<ResilientClient>,
    pub obs: Arc<Obs>,
    pub metrics: Arc<Metrics>,
    pub guardrails: Arc<GuardrailConfig>,
    pub llm_configured: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ask", post(ask))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            track_requests,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}
