//! MathQuest · Learner Maths Quiz Backend
//!
//! - Axum HTTP + WebSocket API
//! - Quiz and word-problem content generated by OpenAI (required)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   OPENAI_API_KEY        : required; startup aborts without it
//!   OPENAI_BASE_URL       : default "https://api.openai.com/v1"
//!   OPENAI_MODEL          : default "gpt-4o-mini"
//!   OPENAI_TIMEOUT_SECS   : transport timeout, default 30
//!   MATHQUEST_CONFIG_PATH : path to TOML config (prompt templates + temperatures)
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod errors;
mod config;
mod curriculum;
mod seeds;
mod generation;
mod openai;
mod session;
mod state;
mod protocol;
mod logic;
mod routes;
#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Fail fast: no model credential, no service.
  let state = match AppState::from_env() {
    Ok(state) => Arc::new(state),
    Err(e) => {
      error!(target: "mathquest", error = %e, "Startup aborted");
      return Err(e.into());
    }
  };

  let _sweeper = state.spawn_session_sweeper();
  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "mathquest", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "mathquest", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "mathquest", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "mathquest", "Shutdown signal received");
}
