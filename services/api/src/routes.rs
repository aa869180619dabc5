use crate::error::ApiError;
use crate::interviewer::Interviewer;
use crate::resume;
use crate::store::ResultStore;
use crate::transcriber::Transcriber;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use interview_core::backend::{
    EvaluateRequest, GenerateQuestionsRequest, GenerateQuestionsResponse, ResumeSummaryResponse,
    RespondRequest, RolesResponse, SaveResultRequest, SaveResultResponse, SkipRequest,
    TranscriptionResponse,
};
use interview_core::question::default_roles;
use interview_core::record::{Evaluation, TurnFeedback};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Uploads (audio clips, resumes) may be larger than axum's default body limit.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub interviewer: Arc<Interviewer>,
    pub transcriber: Arc<dyn Transcriber>,
    pub store: Arc<ResultStore>,
}

/// Create the application router
pub fn create_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/api/roles", get(roles))
        .route("/api/generate-questions", post(generate_questions))
        .route("/api/transcribe", post(transcribe))
        .route("/api/respond", post(respond))
        .route("/api/skip", post(skip))
        .route("/api/evaluate", post(evaluate))
        .route("/api/save-result", post(save_result))
        .route("/api/resume-summary", post(resume_summary))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn require(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("'{field}' must not be empty")));
    }
    Ok(())
}

struct UploadedFile {
    name: String,
    bytes: Vec<u8>,
}

/// Reads a multipart form into its `file` part and its text fields.
async fn read_form(
    mut multipart: Multipart,
) -> Result<(Option<UploadedFile>, HashMap<String, String>), ApiError> {
    let mut file = None;
    let mut fields = HashMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;
            file = Some(UploadedFile {
                name: file_name,
                bytes: bytes.to_vec(),
            });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read field '{name}': {e}")))?;
            fields.insert(name, text);
        }
    }
    Ok((file, fields))
}

async fn roles() -> Json<RolesResponse> {
    Json(RolesResponse {
        roles: default_roles(),
    })
}

async fn generate_questions(
    State(state): State<AppState>,
    Json(request): Json<GenerateQuestionsRequest>,
) -> Result<Json<GenerateQuestionsResponse>, ApiError> {
    require(&request.role, "role")?;
    let questions = state
        .interviewer
        .generate_questions(&request)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(GenerateQuestionsResponse {
        role: request.role,
        questions,
    }))
}

async fn transcribe(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let (file, _) = read_form(multipart).await?;
    let file = file
        .filter(|f| !f.bytes.is_empty())
        .ok_or_else(|| ApiError::BadRequest("An audio 'file' is required".to_string()))?;
    let text = state
        .transcriber
        .transcribe(file.bytes, file.name)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(TranscriptionResponse { text }))
}

async fn respond(
    State(state): State<AppState>,
    Json(request): Json<RespondRequest>,
) -> Result<Json<TurnFeedback>, ApiError> {
    require(&request.question, "question")?;
    require(&request.candidate_answer, "candidate_answer")?;
    let feedback = state
        .interviewer
        .respond(&request)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(feedback))
}

async fn skip(
    State(state): State<AppState>,
    Json(request): Json<SkipRequest>,
) -> Result<Json<TurnFeedback>, ApiError> {
    require(&request.question, "question")?;
    let feedback = state
        .interviewer
        .skip(&request)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(feedback))
}

async fn evaluate(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<Evaluation>, ApiError> {
    if request.qa.is_empty() {
        return Err(ApiError::BadRequest("Nothing to evaluate".to_string()));
    }
    let evaluation = state
        .interviewer
        .evaluate(&request)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(evaluation))
}

async fn save_result(
    State(state): State<AppState>,
    Json(request): Json<SaveResultRequest>,
) -> Result<Json<SaveResultResponse>, ApiError> {
    state
        .store
        .append(&request)
        .await
        .map_err(ApiError::persistence)?;
    Ok(Json(SaveResultResponse { saved: true }))
}

async fn resume_summary(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ResumeSummaryResponse>, ApiError> {
    let (file, fields) = read_form(multipart).await?;
    let file = file.ok_or_else(|| ApiError::BadRequest("A PDF 'file' is required".to_string()))?;
    let role = fields.get("role").cloned().unwrap_or_default();
    require(&role, "role")?;

    let text = resume::extract_text(&file.bytes)
        .map_err(|e| ApiError::BadRequest(format!("{e:#}")))?;
    if text.is_empty() {
        return Err(ApiError::BadRequest(
            "No text could be extracted from the resume".to_string(),
        ));
    }
    let summary = state
        .interviewer
        .summarize_resume(&text, &role)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(ResumeSummaryResponse { summary }))
}
