//! Environment-driven configuration.
//!
//! Everything is optional except the port: missing Firestore credentials
//! fall back to the in-memory store, a missing Gemini key disables AI
//! enhancement. Secrets are wrapped so they never end up in logs.

use std::time::Duration;

use secrecy::SecretString;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ENHANCE_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub ncbi_api_key: Option<String>,
    pub gemini_api_key: Option<SecretString>,
    pub gemini_model: String,
    pub firestore_project_id: Option<String>,
    pub firestore_bearer_token: Option<SecretString>,
    pub source_timeout: Duration,
    pub enhance_timeout: Duration,
}

impl Config {
    /// Read configuration from the process environment. Call after
    /// `dotenvy::dotenv()` so a local `.env` file is honored.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            port: match std::env::var("PORT") {
                Ok(v) => v
                    .parse()
                    .map_err(|_| anyhow::anyhow!("PORT must be a number, got {v:?}"))?,
                Err(_) => DEFAULT_PORT,
            },
            ncbi_api_key: non_empty_var("NCBI_API_KEY"),
            gemini_api_key: non_empty_var("GEMINI_API_KEY").map(SecretString::from),
            gemini_model: non_empty_var("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            firestore_project_id: non_empty_var("FIRESTORE_PROJECT_ID"),
            firestore_bearer_token: non_empty_var("FIRESTORE_BEARER_TOKEN")
                .map(SecretString::from),
            source_timeout: duration_var("SOURCE_TIMEOUT_SECS", DEFAULT_SOURCE_TIMEOUT_SECS)?,
            enhance_timeout: duration_var("ENHANCE_TIMEOUT_SECS", DEFAULT_ENHANCE_TIMEOUT_SECS)?,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn duration_var(name: &str, default_secs: u64) -> anyhow::Result<Duration> {
    let secs = match std::env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} must be a number of seconds, got {v:?}"))?,
        Err(_) => default_secs,
    };
    Ok(Duration::from_secs(secs))
}
