//! Application Configuration Module
//!
//! Settings for the terminal client, loaded from environment variables.

use std::time::Duration;
use tracing::Level;

// --- Application Constants ---

/// The number of frames per audio chunk read from the microphone.
pub const INPUT_CHUNK_SIZE: usize = 1024;
/// Minimum fuzzy-match score for resolving a typed role name.
pub const ROLE_MATCH_THRESHOLD: i64 = 20;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub submission_timeout: Duration,
    pub read_aloud_wpm: u32,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `INTERVIEW_API_URL`: (Optional) Base URL of the interview API. Defaults to "http://127.0.0.1:8000".
    // *   `SUBMISSION_TIMEOUT_SECS`: (Optional) Seconds a transcribe/respond/skip call may take. Defaults to 60.
    // *   `READ_ALOUD_WPM`: (Optional) Pace of the console read-aloud in words per minute. 0 prints instantly.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "WARN" so logs do not drown the interview.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("INTERVIEW_API_URL")
            .unwrap_or_else(|| "http://127.0.0.1:8000".to_string())
            .trim_end_matches('/')
            .to_string();
        if api_url.is_empty() {
            return Err(ConfigError::MissingVar("INTERVIEW_API_URL".to_string()));
        }

        let submission_timeout = match lookup("SUBMISSION_TIMEOUT_SECS") {
            Some(secs) => secs
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "SUBMISSION_TIMEOUT_SECS".to_string(),
                        format!("'{}' is not a positive number of seconds", secs),
                    )
                })?,
            None => Duration::from_secs(60),
        };

        let read_aloud_wpm = match lookup("READ_ALOUD_WPM") {
            Some(wpm) => wpm.trim().parse::<u32>().map_err(|e| {
                ConfigError::InvalidValue("READ_ALOUD_WPM".to_string(), e.to_string())
            })?,
            None => 0,
        };

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "WARN".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_url,
            submission_timeout,
            read_aloud_wpm,
            log_level,
        })
    }
}
