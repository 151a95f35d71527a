//! DevinetteNet · Riddle Quiz Backend
//!
//! - Axum HTTP + WebSocket API
//! - Riddle store: SQLite when DATABASE_PATH is set, in-memory otherwise
//! - Optional OpenAI integration for adaptive selection and corpus population
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   DATABASE_PATH         : SQLite file for the riddle store
//!   OPENAI_API_KEY        : enables OpenAI integration if present
//!   OPENAI_BASE_URL       : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL     : selection advisor, default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL   : riddle generator, default "gpt-4o"
//!   DEVINETTE_CONFIG_PATH : path to TOML config (prompts, population plan, riddle bank)
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod history;
mod config;
mod seeds;
mod store;
mod remote;
mod openai;
mod selector;
mod population;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Store, seeds, OpenAI client and population plan.
  let state = Arc::new(AppState::from_env().await?);

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "devinettenet", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "devinettenet", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "devinettenet", error = %e, "Could not listen for ctrl-c; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "devinettenet", "Shutdown signal received");
}
