pub mod backend;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod question;
pub mod record;
pub mod recorder;
pub mod session_state;
pub mod speech;
pub mod submission;

use crate::backend::{RespondRequest, SkipRequest};
use crate::error::TurnError;
use crate::record::{QaRecord, TurnFeedback};
use crate::recorder::{AudioClip, RecordingId};
use crate::session_state::{Generation, UtteranceId};

/// Represents commands that the core logic (`InterviewSession`) issues to the runtime.
///
/// This enum is the primary API for decoupling the session's decision-making
/// from the runtime's execution of side effects (speaking text, calling the backend).
/// Every command that starts asynchronous work carries the generation or utterance
/// id it was issued under, and the runtime hands that id back in the matching [`Input`].
#[derive(Debug, Clone)]
pub enum Command {
    /// Read the given text aloud. Completion is reported as `Input::SpeechFinished`.
    Speak { utterance: UtteranceId, text: String },
    /// Transcribe a finished recording.
    Transcribe {
        generation: Generation,
        clip: AudioClip,
    },
    /// Send the candidate's answer to the respond collaborator.
    Respond {
        generation: Generation,
        request: RespondRequest,
    },
    /// Send a skip to the skip collaborator.
    Skip {
        generation: Generation,
        request: SkipRequest,
    },
    /// Surface a recoverable error to the candidate.
    Notify(TurnError),
    /// All questions are scored; evaluate and persist the session.
    Finalize(Vec<QaRecord>),
}

/// External events the runtime feeds into the session.
#[derive(Debug)]
pub enum Input {
    SpeechFinished(UtteranceId),
    StartRecording,
    StopRecording,
    /// The recording ceiling armed for this recording elapsed.
    RecordingCeiling(RecordingId),
    TypedAnswer(String),
    Skip,
    /// Abandon the in-flight submission and return to listening.
    Cancel,
    Transcribed {
        generation: Generation,
        result: Result<String, String>,
    },
    Replied {
        generation: Generation,
        result: Result<TurnFeedback, String>,
    },
    SubmissionExpired(Generation),
    /// Re-run evaluation after it failed.
    RetryFinalize,
    Shutdown,
}
