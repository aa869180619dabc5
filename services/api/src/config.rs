use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub llm_api_key: SecretString,
    pub llm_base_url: String,
    pub llm_model: String,
    pub stt_model: String,
    pub results_csv: PathBuf,
    pub prompts_dir: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// This function will look for a `.env` file in the current directory
    /// and load the following variables:
    ///
    /// *   `BIND_ADDRESS`: The address and port to bind the server to. Defaults to "0.0.0.0:8000".
    /// *   `LLM_API_KEY`: Secret key for the OpenAI-compatible provider. Required.
    /// *   `LLM_BASE_URL`: (Optional) Provider base URL. Defaults to Groq's OpenAI-compatible endpoint.
    /// *   `LLM_MODEL`: (Optional) Chat model. Defaults to "llama-3.1-8b-instant".
    /// *   `STT_MODEL`: (Optional) Transcription model. Defaults to "whisper-large-v3".
    /// *   `RESULTS_CSV`: (Optional) Where finished interviews are appended. Defaults to "interview_results.csv".
    /// *   `PROMPTS_DIR`: (Optional) Directory of `.md` templates overriding the built-in prompts.
    /// *   `ALLOWED_ORIGINS`: (Optional) Comma separated CORS origins. Defaults to the local dev frontend.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let llm_api_key = lookup("LLM_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingVar("LLM_API_KEY".to_string()))?;

        let llm_base_url = lookup("LLM_BASE_URL")
            .unwrap_or_else(|| "https://api.groq.com/openai/v1".to_string())
            .trim_end_matches('/')
            .to_string();
        let llm_model = lookup("LLM_MODEL").unwrap_or_else(|| "llama-3.1-8b-instant".to_string());
        let stt_model = lookup("STT_MODEL").unwrap_or_else(|| "whisper-large-v3".to_string());

        let results_csv = lookup("RESULTS_CSV")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("interview_results.csv"));
        let prompts_dir = lookup("PROMPTS_DIR").map(PathBuf::from);

        let allowed_origins: Vec<String> = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173,http://127.0.0.1:5173".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        for origin in &allowed_origins {
            if axum::http::HeaderValue::from_str(origin).is_err() {
                return Err(ConfigError::InvalidValue(
                    "ALLOWED_ORIGINS".to_string(),
                    format!("'{}' is not a valid origin", origin),
                ));
            }
        }

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            llm_api_key,
            llm_base_url,
            llm_model,
            stt_model,
            results_csv,
            prompts_dir,
            allowed_origins,
            log_level,
        })
    }
}
