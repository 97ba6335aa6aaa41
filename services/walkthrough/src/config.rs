use reqwest::Url;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

pub const DEFAULT_OPENING_INSTRUCTION: &str =
    "Please begin the walkthrough of this algorithm from the top.";

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Backend endpoint that mints short-lived session tokens.
    pub credential_url: Url,
    /// Remote signaling endpoint for the offer/answer exchange.
    pub signaling_url: Url,
    pub realtime_model: String,
    pub lessons_path: PathBuf,
    /// Sent once the session opens to start the walkthrough.
    pub opening_instruction: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let credential_url = url_var("CREDENTIAL_URL", "http://127.0.0.1:5001/api/session")?;
        let signaling_url =
            url_var("REALTIME_SIGNALING_URL", "https://api.openai.com/v1/realtime")?;

        let realtime_model = std::env::var("REALTIME_MODEL")
            .unwrap_or_else(|_| "gpt-4o-realtime-preview".to_string());
        if realtime_model.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "REALTIME_MODEL".to_string(),
                "model name must not be empty".to_string(),
            ));
        }

        let lessons_path = std::env::var("LESSONS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./algorithms"));

        let opening_instruction = std::env::var("OPENING_INSTRUCTION")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPENING_INSTRUCTION.to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            credential_url,
            signaling_url,
            realtime_model,
            lessons_path,
            opening_instruction,
            log_level,
        })
    }
}

fn url_var(name: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    let url = Url::parse(&raw)
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not an http(s) URL", raw),
        ));
    }
    Ok(url)
}
