use crate::question::{Question, Role};
use crate::record::{Evaluation, Feedback, QaRecord, Scores, TurnFeedback};
use crate::recorder::AudioClip;
use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolesResponse {
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateQuestionsRequest {
    pub role: String,
    #[serde(default)]
    pub resume_summary: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateQuestionsResponse {
    pub role: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RespondRequest {
    pub role: String,
    pub question: String,
    pub candidate_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRequest {
    pub role: String,
    pub question: String,
    /// Ask for a nudge instead of closing the question.
    #[serde(default)]
    pub hint: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub role: String,
    pub qa: Vec<QaRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveResultRequest {
    pub role: String,
    #[serde(default)]
    pub resume_summary: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub qa: Vec<QaRecord>,
    pub scores: Scores,
    pub feedback: Feedback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveResultResponse {
    pub saved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeSummaryResponse {
    pub summary: String,
}

// The `InterviewBackend` trait is the contract for every external collaborator the
// interview core depends on: question generation, transcription, per-question scoring,
// final evaluation and persistence. The session and orchestrator only ever talk to
// this trait, so tests drive them with `mockall`'s `MockInterviewBackend`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InterviewBackend: Send + Sync {
    async fn roles(&self) -> Result<Vec<Role>>;

    async fn generate_questions(&self, request: &GenerateQuestionsRequest)
    -> Result<Vec<Question>>;

    async fn transcribe(&self, clip: &AudioClip) -> Result<String>;

    async fn respond(&self, request: &RespondRequest) -> Result<TurnFeedback>;

    async fn skip(&self, request: &SkipRequest) -> Result<TurnFeedback>;

    async fn evaluate(&self, request: &EvaluateRequest) -> Result<Evaluation>;

    async fn save_result(&self, request: &SaveResultRequest) -> Result<()>;

    async fn resume_summary(&self, pdf: Vec<u8>, role: &str) -> Result<String>;
}

/// HTTP client for the interview API server.
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Request to /api/{path} failed"))?
            .error_for_status()
            .with_context(|| format!("/api/{path} returned an error status"))?
            .json::<Resp>()
            .await
            .with_context(|| format!("Failed to decode /api/{path} response"))?;
        Ok(resp)
    }

    async fn post_form<Resp: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<Resp> {
        let resp = self
            .client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Upload to /api/{path} failed"))?
            .error_for_status()
            .with_context(|| format!("/api/{path} returned an error status"))?
            .json::<Resp>()
            .await
            .with_context(|| format!("Failed to decode /api/{path} response"))?;
        Ok(resp)
    }
}

#[async_trait]
impl InterviewBackend for BackendClient {
    async fn roles(&self) -> Result<Vec<Role>> {
        let resp = self
            .client
            .get(self.url("roles"))
            .send()
            .await
            .context("Request to /api/roles failed")?
            .error_for_status()?
            .json::<RolesResponse>()
            .await?;
        Ok(resp.roles)
    }

    async fn generate_questions(
        &self,
        request: &GenerateQuestionsRequest,
    ) -> Result<Vec<Question>> {
        let resp: GenerateQuestionsResponse =
            self.post_json("generate-questions", request).await?;
        Ok(resp.questions)
    }

    async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
        let wav = clip.to_wav().context("Failed to encode recording as WAV")?;
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("answer.wav")
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let resp: TranscriptionResponse = self.post_form("transcribe", form).await?;
        Ok(resp.text)
    }

    async fn respond(&self, request: &RespondRequest) -> Result<TurnFeedback> {
        self.post_json("respond", request).await
    }

    async fn skip(&self, request: &SkipRequest) -> Result<TurnFeedback> {
        self.post_json("skip", request).await
    }

    async fn evaluate(&self, request: &EvaluateRequest) -> Result<Evaluation> {
        self.post_json("evaluate", request).await
    }

    async fn save_result(&self, request: &SaveResultRequest) -> Result<()> {
        let resp: SaveResultResponse = self.post_json("save-result", request).await?;
        if !resp.saved {
            return Err(anyhow::anyhow!("Server did not persist the result"));
        }
        Ok(())
    }

    async fn resume_summary(&self, pdf: Vec<u8>, role: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(pdf)
            .file_name("resume.pdf")
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("role", role.to_string());
        let resp: ResumeSummaryResponse = self.post_form("resume-summary", form).await?;
        Ok(resp.summary)
    }
}
