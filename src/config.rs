//! Application configuration loaded from environment variables.
//!
//! The field registry falls back to the simulated implementation unless
//! both EOSDA settings are present.

use std::env;

/// Default upload limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Delay used by the simulated registry, matching the dashboard's mock.
pub const DEFAULT_REGISTRATION_DELAY_MS: u64 = 2000;

/// Idle time before an upload session is evicted.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

/// Upload sessions one user may hold at once.
pub const DEFAULT_MAX_SESSIONS_PER_USER: usize = 8;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Largest accepted upload body in bytes
    pub max_upload_bytes: usize,
    /// Delay for the simulated registry
    pub registration_delay_ms: u64,
    /// Seconds an untouched upload session survives
    pub session_idle_secs: u64,
    /// Upload sessions kept per user before the oldest is evicted
    pub max_sessions_per_user: usize,
    /// EOSDA API base URL (e.g. https://api-connect.eos.com)
    pub eosda_api_url: Option<String>,
    /// EOSDA API key
    pub eosda_api_key: Option<String>,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Config for tests and local tooling.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            registration_delay_ms: 0,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
            max_sessions_per_user: DEFAULT_MAX_SESSIONS_PER_USER,
            eosda_api_url: None,
            eosda_api_key: None,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: parse_var("PORT", 8080)?,
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            registration_delay_ms: parse_var(
                "REGISTRATION_DELAY_MS",
                DEFAULT_REGISTRATION_DELAY_MS,
            )?,
            session_idle_secs: parse_var("SESSION_IDLE_SECS", DEFAULT_SESSION_IDLE_SECS)?,
            max_sessions_per_user: parse_var(
                "MAX_SESSIONS_PER_USER",
                DEFAULT_MAX_SESSIONS_PER_USER,
            )?,
            eosda_api_url: optional_var("EOSDA_API_URL"),
            eosda_api_key: optional_var("EOSDA_API_KEY"),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// EOSDA credentials, if both are configured.
    pub fn eosda(&self) -> Option<(&str, &str)> {
        match (&self.eosda_api_url, &self.eosda_api_key) {
            (Some(url), Some(key)) => Some((url.as_str(), key.as_str())),
            _ => None,
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
