//! Process settings, resolved once at startup from the environment.
//!
//! A `.env` file is honored when present (binaries call `dotenv` before
//! constructing `Settings`). Every field has a documented default so the
//! crate runs without configuration, falling back to keyword routing and
//! an unconfigured warehouse.

use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    /// API key for the OpenAI-compatible completion endpoint.
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,

    /// Warehouse query endpoint. `None` means the executor reports
    /// "not configured" on every call instead of failing at startup.
    pub warehouse_url: Option<String>,
    /// Fully qualified dataset prefix used in generated table references.
    pub dataset: String,

    // Per-handler sampling temperatures
    pub router_temperature: f32,
    pub sql_temperature: f32,
    pub synthesis_temperature: f32,
    pub general_temperature: f32,

    // Per-handler history windows (turn counts, not pairs)
    pub sql_history_window: usize,
    pub general_history_window: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_api_key: None,
            llm_base_url: "https://api.openai.com/v1".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            warehouse_url: None,
            dataset: "coldchain-prod.mart".to_string(),
            router_temperature: 0.0,
            sql_temperature: 0.0,
            synthesis_temperature: 0.0,
            general_temperature: 0.7,
            sql_history_window: 6,
            general_history_window: 10,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        Self {
            llm_api_key: env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_base_url: env::var("LLM_BASE_URL").unwrap_or(defaults.llm_base_url),
            llm_model: env::var("LLM_MODEL").unwrap_or(defaults.llm_model),
            warehouse_url: env::var("WAREHOUSE_URL").ok().filter(|u| !u.is_empty()),
            dataset: env::var("WAREHOUSE_DATASET").unwrap_or(defaults.dataset),
            router_temperature: parse_env("ROUTER_TEMPERATURE", defaults.router_temperature),
            sql_temperature: parse_env("SQL_TEMPERATURE", defaults.sql_temperature),
            synthesis_temperature: parse_env("SYNTHESIS_TEMPERATURE", defaults.synthesis_temperature),
            general_temperature: parse_env("GENERAL_TEMPERATURE", defaults.general_temperature),
            sql_history_window: parse_env("SQL_HISTORY_WINDOW", defaults.sql_history_window),
            general_history_window: parse_env("GENERAL_HISTORY_WINDOW", defaults.general_history_window),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
