//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - permissive CORS and a per-request trace layer
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        // Explore + submission
        .route("/api/v1/riddles", get(http::http_list_riddles).post(http::http_submit_riddle))
        .route("/api/v1/riddles/:id", get(http::http_get_riddle))
        .route("/api/v1/origins", get(http::http_list_origins))
        .route("/api/v1/languages", get(http::http_list_languages))
        // Play
        .route("/api/v1/play/next", post(http::http_next_riddle))
        .route("/api/v1/play/reveal", post(http::http_reveal))
        // Admin
        .route("/api/v1/admin/populate/step", post(http::http_populate_step))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}
