use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    /// The LLM or transcription provider failed or replied with something unusable.
    #[error("Upstream service failed: {0}")]
    Upstream(String),
    #[error("Failed to persist result: {0}")]
    Persistence(String),
}

impl ApiError {
    pub fn upstream(error: anyhow::Error) -> Self {
        ApiError::Upstream(format!("{error:#}"))
    }

    pub fn persistence(error: anyhow::Error) -> Self {
        ApiError::Persistence(format!("{error:#}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::BadRequest(msg) => tracing::debug!("Bad request: {}", msg),
            ApiError::Upstream(_) => tracing::warn!("{}", self),
            ApiError::Persistence(_) => tracing::error!("{}", self),
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}
