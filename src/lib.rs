// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod notify;
pub mod protocol;
pub mod questions;
pub mod roles;
pub mod scoring;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use auth::AuthConfig;
use state::AppState;

/// Build the HTTP + WebSocket router
pub fn build_router(state: Arc<AppState>, auth_config: Arc<AuthConfig>) -> Router {
    // Protected host routes (with HTTP Basic Auth)
    let host_routes = Router::new()
        .route("/api/sessions", post(api::create_session))
        .route_layer(middleware::from_fn_with_state(
            auth_config.clone(),
            auth::host_auth_middleware,
        ));

    // WebSocket route; role=host requires the same credentials
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(
            auth_config,
            auth::host_ws_auth_middleware,
        ));

    Router::new()
        .merge(host_routes)
        .merge(ws_routes)
        .route("/api/sessions/{id}", get(api::get_session))
        .route("/api/sessions/{id}/leaderboard", get(api::get_leaderboard))
        .route("/api/sessions/{id}/players", post(api::join_session))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
