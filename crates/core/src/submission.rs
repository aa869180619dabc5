//! Answer submission pipeline.
//!
//! A submission is one attempt at resolving the current question: a typed answer,
//! a recorded answer that still needs transcribing, or a skip. The session keeps the
//! in-flight submission as a [`PendingSubmission`]; the runtime executes the
//! collaborator calls with the functions below and feeds the results back as [`Input`]s.

use crate::Input;
use crate::backend::{InterviewBackend, RespondRequest, SkipRequest};
use crate::question::Question;
use crate::record::{AnswerSource, ConversationTurn, QaMeta, QaRecord, SKIPPED_MARKER, TurnFeedback};
use crate::recorder::AudioClip;
use crate::session_state::Generation;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Answer(AnswerSource),
    /// `hint` is the first stage of a two-stage skip and never closes the question.
    Skip { hint: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingSubmission {
    pub generation: Generation,
    pub question: Question,
    pub kind: SubmissionKind,
    /// Known once typed, or once the recording has been transcribed.
    pub answer: Option<String>,
}

impl PendingSubmission {
    pub fn respond_request(&self, role: &str) -> Option<RespondRequest> {
        let answer = self.answer.as_ref()?;
        Some(RespondRequest {
            role: role.to_string(),
            question: self.question.text.clone(),
            candidate_answer: answer.clone(),
        })
    }

    pub fn skip_request(&self, role: &str) -> SkipRequest {
        let hint = matches!(self.kind, SubmissionKind::Skip { hint: true });
        SkipRequest {
            role: role.to_string(),
            question: self.question.text.clone(),
            hint,
        }
    }

    pub fn is_hint(&self) -> bool {
        matches!(self.kind, SubmissionKind::Skip { hint: true })
    }
}

/// Folds a collaborator reply into the record for this question.
///
/// The conversation is always three turns: the question restated by the agent,
/// the candidate's answer (or the skip marker), and the agent's reply.
pub fn fold_reply(pending: PendingSubmission, feedback: TurnFeedback) -> QaRecord {
    let (candidate_text, source) = match pending.kind {
        SubmissionKind::Answer(source) => (pending.answer.unwrap_or_default(), source),
        SubmissionKind::Skip { .. } => (SKIPPED_MARKER.to_string(), AnswerSource::Skip),
    };
    let feedback = feedback.clamped();
    QaRecord {
        question_text: pending.question.text.clone(),
        conversation: vec![
            ConversationTurn::agent(pending.question.text),
            ConversationTurn::candidate(candidate_text),
            ConversationTurn::agent(feedback.reply),
        ],
        summary: feedback.summary,
        remarks: feedback.remarks,
        score: feedback.score,
        meta: QaMeta { source },
    }
}

pub async fn transcribe(
    backend: Arc<dyn InterviewBackend>,
    generation: Generation,
    clip: AudioClip,
) -> Input {
    let result = backend
        .transcribe(&clip)
        .await
        .map_err(|e| format!("{e:#}"));
    Input::Transcribed { generation, result }
}

pub async fn respond(
    backend: Arc<dyn InterviewBackend>,
    generation: Generation,
    request: RespondRequest,
) -> Input {
    let result = backend
        .respond(&request)
        .await
        .map_err(|e| format!("{e:#}"));
    Input::Replied { generation, result }
}

pub async fn skip(
    backend: Arc<dyn InterviewBackend>,
    generation: Generation,
    request: SkipRequest,
) -> Input {
    let result = backend.skip(&request).await.map_err(|e| format!("{e:#}"));
    Input::Replied { generation, result }
}
