use serde::{Deserialize, Serialize};

/// Placeholder candidate turn recorded for a skipped question.
pub const SKIPPED_MARKER: &str = "[SKIPPED]";

pub const MIN_SCORE: f32 = 0.0;
pub const MAX_SCORE: f32 = 10.0;

fn clamp_score(score: f32) -> f32 {
    if score.is_nan() {
        MIN_SCORE
    } else {
        score.clamp(MIN_SCORE, MAX_SCORE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Agent,
    Candidate,
}

impl Sender {
    pub fn label(&self) -> &'static str {
        match self {
            Sender::Agent => "AGENT",
            Sender::Candidate => "CANDIDATE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub sender: Sender,
    pub text: String,
}

impl ConversationTurn {
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Agent,
            text: text.into(),
        }
    }

    pub fn candidate(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Candidate,
            text: text.into(),
        }
    }
}

/// How the candidate resolved a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    Voice,
    Typed,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaMeta {
    pub source: AnswerSource,
}

/// The scored outcome of one question. Created once when the turn ends and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    #[serde(rename = "question")]
    pub question_text: String,
    pub conversation: Vec<ConversationTurn>,
    pub summary: String,
    pub remarks: String,
    pub score: f32,
    pub meta: QaMeta,
}

/// Reply from the respond and skip collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnFeedback {
    pub reply: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub score: f32,
}

impl TurnFeedback {
    pub fn clamped(mut self) -> Self {
        self.score = clamp_score(self.score);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    #[serde(default)]
    pub communication: f32,
    #[serde(default)]
    pub technical: f32,
    #[serde(default, rename = "roleFit")]
    pub role_fit: f32,
    #[serde(default)]
    pub overall: f32,
}

impl Scores {
    pub fn clamped(self) -> Self {
        Self {
            communication: clamp_score(self.communication),
            technical: clamp_score(self.technical),
            role_fit: clamp_score(self.role_fit),
            overall: clamp_score(self.overall),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default, rename = "nextSteps")]
    pub next_steps: String,
}

/// Final result of a session as produced by the evaluate collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub scores: Scores,
    #[serde(default)]
    pub feedback: Feedback,
}

impl Evaluation {
    pub fn clamped(self) -> Self {
        Self {
            scores: self.scores.clamped(),
            feedback: self.feedback,
        }
    }
}
