//! Application state: the two backend clients plus prompt templates.
//!
//! Built once at startup and shared behind an `Arc`; request handlers hold
//! no other mutable state.

use tracing::{info, instrument};

use crate::config::{load_prompts_from_env, AppConfig, Prompts};
use crate::gemini::GeminiClient;
use crate::store::SupabaseStore;

#[derive(Clone)]
pub struct AppState {
    pub gemini: GeminiClient,
    pub store: SupabaseStore,
    pub prompts: Prompts,
}

impl AppState {
    /// Wire the clients up from an explicit config (tests point this at fake
    /// backends).
    pub fn new(config: &AppConfig, prompts: Prompts) -> Result<Self, String> {
        let gemini = GeminiClient::new(config)?;
        let store = SupabaseStore::new(config)?;
        Ok(Self { gemini, store, prompts })
    }

    /// Build state from env: required backend settings plus optional TOML
    /// prompt overrides.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self, String> {
        let config = AppConfig::from_env()?;
        let prompts = match load_prompts_from_env() {
            Some(p) => p,
            None => Prompts::default(),
        };
        info!(
            target: "mathsprout_backend",
            model = %config.google_model,
            api_version = %config.google_api_version,
            "Backends configured"
        );
        Self::new(&config, prompts)
    }
}
