use crate::llm::ChatModel;
use crate::prompts::{self, Prompts};
use anyhow::{Context, Result};
use interview_core::backend::{EvaluateRequest, GenerateQuestionsRequest, RespondRequest, SkipRequest};
use interview_core::question::{INTERVIEW_LENGTH, Question};
use interview_core::record::{Evaluation, QaRecord, TurnFeedback};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct GeneratedQuestions {
    questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
struct ResumeSummary {
    summary: String,
}

/// Renders a finished interview the way the evaluation prompt expects it.
pub fn render_transcript(qa: &[QaRecord]) -> String {
    let mut parts = Vec::new();
    for (i, record) in qa.iter().enumerate() {
        parts.push(format!("Question {}: {}", i + 1, record.question_text));
        for turn in &record.conversation {
            parts.push(format!("{}: {}", turn.sender.label(), turn.text));
        }
        parts.push(String::new());
    }
    parts.join("\n")
}

/// The interviewer persona: every LLM-backed collaborator call lives here.
pub struct Interviewer {
    model: Arc<dyn ChatModel>,
    prompts: Prompts,
}

impl Interviewer {
    pub fn new(model: Arc<dyn ChatModel>, prompts: Prompts) -> Self {
        Self { model, prompts }
    }

    pub async fn generate_questions(&self, request: &GenerateQuestionsRequest) -> Result<Vec<Question>> {
        let resume_summary = request
            .resume_summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("Not provided.");
        let topics = if request.topics.is_empty() {
            "None.".to_string()
        } else {
            request.topics.join(", ")
        };
        let prompt = self.prompts.render(
            prompts::GENERATE_QUESTIONS,
            &[
                ("role", request.role.as_str()),
                ("resume_summary", resume_summary),
                ("topics", topics.as_str()),
            ],
        )?;

        let value = self
            .model
            .complete_json(&prompt, "questions: list of 3 objects with id, type, text")
            .await?;
        let generated: GeneratedQuestions =
            serde_json::from_value(value).context("LLM returned malformed questions")?;
        if generated.questions.len() != INTERVIEW_LENGTH {
            anyhow::bail!(
                "LLM returned {} questions, expected {}",
                generated.questions.len(),
                INTERVIEW_LENGTH
            );
        }

        let questions = generated
            .questions
            .into_iter()
            .zip(1..)
            .map(|(q, id)| Question { id, ..q })
            .collect();
        tracing::info!("Generated questions for role '{}'", request.role);
        Ok(questions)
    }

    pub async fn respond(&self, request: &RespondRequest) -> Result<TurnFeedback> {
        let prompt = self.prompts.render(
            prompts::RESPOND,
            &[
                ("role", request.role.as_str()),
                ("question", request.question.as_str()),
                ("answer", request.candidate_answer.as_str()),
            ],
        )?;
        let value = self
            .model
            .complete_json(&prompt, "reply: string, summary: string, remarks: string, score: number 0-10")
            .await?;
        let feedback: TurnFeedback =
            serde_json::from_value(value).context("LLM returned a malformed reply")?;
        Ok(feedback.clamped())
    }

    /// A terminal skip, or a hint when `request.hint` is set. Hints never score.
    pub async fn skip(&self, request: &SkipRequest) -> Result<TurnFeedback> {
        let template = if request.hint {
            prompts::HINT
        } else {
            prompts::SKIP
        };
        let prompt = self.prompts.render(
            template,
            &[("role", request.role.as_str()), ("question", request.question.as_str())],
        )?;
        let value = self
            .model
            .complete_json(&prompt, "reply: string, summary: string, remarks: string, score: number")
            .await?;
        let mut feedback: TurnFeedback =
            serde_json::from_value(value).context("LLM returned a malformed skip reply")?;
        if request.hint {
            feedback.score = 0.0;
        }
        Ok(feedback.clamped())
    }

    pub async fn evaluate(&self, request: &EvaluateRequest) -> Result<Evaluation> {
        let transcript = render_transcript(&request.qa);
        let prompt = self.prompts.render(
            prompts::EVALUATE,
            &[("role", request.role.as_str()), ("transcript", transcript.as_str())],
        )?;
        let value = self
            .model
            .complete_json(&prompt, "scores + feedback as described")
            .await?;
        let evaluation: Evaluation =
            serde_json::from_value(value).context("LLM returned a malformed evaluation")?;
        Ok(evaluation.clamped())
    }

    pub async fn summarize_resume(&self, resume_text: &str, role: &str) -> Result<String> {
        let prompt = self.prompts.render(
            prompts::RESUME_SUMMARY,
            &[("role", role), ("resume", resume_text)],
        )?;
        let value = self.model.complete_json(&prompt, "summary: string").await?;
        let summary: ResumeSummary =
            serde_json::from_value(value).context("LLM returned a malformed resume summary")?;
        Ok(summary.summary.trim().to_string())
    }
}
