//! IELTS Mock Test Backend
//!
//! - Axum HTTP + WebSocket API (one exam session per socket)
//! - Optional LLM integration through an OpenAI-compatible endpoint
//! - Static SPA fallback (STATIC_DIR/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   LLM_API_KEY       : enables the LLM (GROQ_API_KEY is accepted too)
//!   LLM_BASE_URL      : default "https://api.groq.com/openai/v1"
//!   LLM_MODEL         : default "llama-3.3-70b-versatile"
//!   LLM_TIMEOUT_SECS  : request timeout, default 60
//!   IELTS_CONFIG_PATH : path to TOML config (prompts + exam settings)
//!   STATIC_DIR        : frontend build directory, default "./static"
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use ielts_backend::routes::build_router;
use ielts_backend::state::AppState;
use ielts_backend::telemetry;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (stores, LLM client, prompts, generator).
  let state = Arc::new(AppState::new());

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "ielts_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "ielts_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "ielts_backend", error = %e, "Could not listen for Ctrl-C; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "ielts_backend", "Shutdown signal received");
}
