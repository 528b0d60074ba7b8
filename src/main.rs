//! Mathsprout · Math Practice Backend
//!
//! - Axum HTTP JSON API for problem generation, grading and history
//! - Google Generative Language API integration (via environment variables)
//! - Supabase/PostgREST persistence for sessions and submissions
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   GOOGLE_API_KEY      : required, key for the generative-text backend
//!   GOOGLE_API_BASE_URL : default "https://generativelanguage.googleapis.com"
//!   GOOGLE_API_VERSION  : preferred API version, default "v1beta"
//!   GOOGLE_MODEL_NAME   : default "models/gemini-2.0-flash"
//!   SUPABASE_URL        : required, project base URL
//!   SUPABASE_ANON_KEY   : required, PostgREST access key
//!   PROMPTS_CONFIG_PATH : optional TOML file overriding prompt templates
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

use mathsprout_backend::routes::build_router;
use mathsprout_backend::state::AppState;
use mathsprout_backend::telemetry;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (Gemini client, Supabase store, prompts).
  let state = match AppState::from_env() {
    Ok(s) => Arc::new(s),
    Err(e) => {
      error!(target: "mathsprout_backend", error = %e, "Startup failed");
      return Err(e.into());
    }
  };

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "mathsprout_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
