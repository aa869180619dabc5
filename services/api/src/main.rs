use anyhow::{Context, Result};
use axum::http::HeaderValue;
use interview_api::config::Config;
use interview_api::interviewer::Interviewer;
use interview_api::llm::LlmClient;
use interview_api::prompt_loader;
use interview_api::prompts::Prompts;
use interview_api::routes::{AppState, create_router};
use interview_api::store::ResultStore;
use interview_api::transcriber::SttClient;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    tracing::info!("Configuration loaded successfully. Starting interview API...");

    // --- 3. Load Prompts ---
    let mut prompts = Prompts::default();
    if let Some(dir) = &config.prompts_dir {
        let overrides =
            prompt_loader::load_prompts(dir).context("Failed to load prompt overrides")?;
        tracing::info!("Loaded {} prompt overrides from {}", overrides.len(), dir.display());
        prompts = prompts.with_overrides(overrides);
    }

    // --- 4. Initialize API Clients ---
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")?;
    let model = Arc::new(LlmClient::new(
        http.clone(),
        config.llm_api_key.clone(),
        config.llm_base_url.clone(),
        config.llm_model.clone(),
    ));
    let transcriber = Arc::new(SttClient::new(
        http,
        config.llm_api_key.clone(),
        config.llm_base_url.clone(),
        config.stt_model.clone(),
    ));

    let state = AppState {
        interviewer: Arc::new(Interviewer::new(model, prompts)),
        transcriber,
        store: Arc::new(ResultStore::new(config.results_csv.clone())),
    };
    tracing::info!("Results are appended to {}", config.results_csv.display());

    // --- 5. Serve ---
    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid CORS origin")?;
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state, cors);
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    tracing::info!("Listening on {}", config.bind_address);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
