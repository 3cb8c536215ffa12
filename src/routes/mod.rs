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

pub mod bridge;
pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket exam sessions at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from `STATIC_DIR` (default `./static`) with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| "./static".into());
    let static_service = ServeDir::new(&static_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(format!("{}/index.html", static_dir)));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/exam/generate", post(http::http_post_exam))
        .route("/api/v1/reading/generate", post(http::http_post_reading))
        .route("/api/v1/writing/generate", post(http::http_post_writing_prompt))
        .route("/api/v1/writing/grade", post(http::http_post_writing_grade))
        .route("/api/v1/speaking/chat", post(http::http_post_speaking_chat))
        .route("/api/v1/speaking/grade", post(http::http_post_speaking_grade))
        .route("/api/v1/results", post(http::http_post_result).get(http::http_get_results))
        .route("/api/v1/history", get(http::http_get_history))
        .route("/api/v1/stats", get(http::http_get_stats))
        .route(
            "/api/v1/vocabulary",
            get(http::http_get_vocabulary)
                .post(http::http_post_vocabulary)
                .delete(http::http_delete_vocabulary),
        )
        // State + CORS + HTTP tracing
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
        // Frontend fallback
        .fallback_service(static_service)
}
