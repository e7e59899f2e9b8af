//! Dashboard HTTP API

pub mod auth;
pub mod error;
pub mod routes;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::bot::BotManager;
use crate::store::{LogStore, ProfileStore};

pub use error::ApiError;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub bot: BotManager,
    pub profiles: Arc<dyn ProfileStore>,
    pub logs: Arc<LogStore>,
    /// Bearer token required on every request, when set
    pub password: Option<Arc<str>>,
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/bot/status", get(routes::status))
        .route("/bot/start", post(routes::start))
        .route("/bot/stop", post(routes::stop))
        .route("/bot/chat", post(routes::chat))
        .route("/logs", get(routes::logs).delete(routes::clear_logs))
        .route("/config", get(routes::get_config).post(routes::save_config))
        .route("/profiles", get(routes::profiles))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
