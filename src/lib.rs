//! Mathsprout · Primary 5 math practice backend (library crate).
//!
//! The binary in `main.rs` is a thin wrapper; everything lives here so the
//! integration tests can build the router against fake backends.

pub mod telemetry;
pub mod util;
pub mod domain;
pub mod config;
pub mod error;
pub mod grading;
pub mod prompts;
pub mod protocol;
pub mod gemini;
pub mod store;
pub mod state;
pub mod logic;
pub mod routes;

pub use config::AppConfig;
pub use state::AppState;
