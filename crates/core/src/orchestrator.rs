use crate::backend::{EvaluateRequest, GenerateQuestionsRequest, InterviewBackend, SaveResultRequest};
use crate::error::TurnError;
use crate::question::{INTERVIEW_LENGTH, Question, Role};
use crate::record::{Evaluation, QaRecord};
use crate::session_state::InterviewSession;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Everything the candidate sees once the interview is over.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalReport {
    pub role: String,
    pub evaluation: Evaluation,
    pub records: Vec<QaRecord>,
    /// Set when the results were computed but could not be saved.
    pub persistence_error: Option<TurnError>,
}

/// Drives everything around the turn cycle: question generation before the
/// interview, and evaluation plus persistence after it.
pub struct Orchestrator {
    backend: Arc<dyn InterviewBackend>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn InterviewBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> Arc<dyn InterviewBackend> {
        self.backend.clone()
    }

    pub async fn roles(&self) -> Result<Vec<Role>> {
        self.backend.roles().await.context("Failed to fetch roles")
    }

    pub async fn summarize_resume(&self, pdf: Vec<u8>, role: &str) -> Result<String> {
        self.backend
            .resume_summary(pdf, role)
            .await
            .context("Failed to summarize resume")
    }

    /// Generates a fresh question set and installs it for editing. This resets
    /// every result of a previous run in `session`.
    pub async fn generate_questions(
        &self,
        session: &mut InterviewSession,
        role: &str,
        resume_summary: Option<String>,
        topics: Vec<String>,
    ) -> Result<Vec<Question>> {
        let request = GenerateQuestionsRequest {
            role: role.to_string(),
            resume_summary: resume_summary.clone(),
            topics: topics.clone(),
        };
        let questions = self
            .backend
            .generate_questions(&request)
            .await
            .context("Failed to generate questions")?;
        if questions.len() != INTERVIEW_LENGTH {
            tracing::warn!(
                "Expected {} questions, received {}; edit the set before starting",
                INTERVIEW_LENGTH,
                questions.len()
            );
        }

        session.load_questions(role, questions.clone());
        session.set_context(resume_summary, topics);
        Ok(questions)
    }

    pub fn start_interview(&self, session: &mut InterviewSession) -> Result<(), TurnError> {
        session.start_interview()
    }

    /// Scores the whole interview and saves it.
    ///
    /// An evaluation failure is returned so the caller can retry. A save failure
    /// is logged and reported in the [`FinalReport`]; the scores are kept.
    pub async fn finish_interview(
        &self,
        session: &mut InterviewSession,
        records: Vec<QaRecord>,
    ) -> Result<FinalReport, TurnError> {
        let role = session.role_id().to_string();
        let evaluation = self
            .backend
            .evaluate(&EvaluateRequest {
                role: role.clone(),
                qa: records.clone(),
            })
            .await
            .map_err(|e| TurnError::RecoverableNetwork(format!("Evaluation failed: {e:#}")))?
            .clamped();
        session.record_evaluation(evaluation.clone());
        tracing::info!("Interview evaluated, overall {:.1}", evaluation.scores.overall);

        let save = SaveResultRequest {
            role: role.clone(),
            resume_summary: session.resume_summary().map(str::to_string),
            topics: session.topics().to_vec(),
            qa: records.clone(),
            scores: evaluation.scores.clone(),
            feedback: evaluation.feedback.clone(),
        };
        let persistence_error = match self.backend.save_result(&save).await {
            Ok(()) => None,
            Err(e) => {
                tracing::error!("Failed to save interview result: {:#}", e);
                Some(TurnError::Persistence(format!("{e:#}")))
            }
        };

        Ok(FinalReport {
            role,
            evaluation,
            records,
            persistence_error,
        })
    }
}
