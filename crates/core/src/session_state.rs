use crate::{
    Command,
    error::TurnError,
    question::{INTERVIEW_LENGTH, Question, QuestionKind},
    record::{AnswerSource, Evaluation, QaRecord, TurnFeedback},
    recorder::AudioClip,
    submission::{self, PendingSubmission, SubmissionKind},
};
use tokio::sync::mpsc;

/// Where the current question is in its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// The question (or a hint) is being read aloud.
    Asking,
    /// Waiting for exactly one typed answer, recording, or skip.
    Listening,
    /// An answer or skip is in flight.
    Submitting,
    /// The reply is being read aloud; no input is accepted.
    Feedback,
    /// No interview is active.
    Done,
}

/// Identifies one submission. A result carrying an older generation is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

/// Identifies one read-aloud request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UtteranceId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    /// A skip closes the question at once.
    #[default]
    Immediate,
    /// The first skip on a question asks for a hint; the second one closes it.
    HintThenConfirm,
}

/// What an input did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Legal in this state but unusable (e.g. an empty answer); the candidate was told why.
    Rejected,
    /// Illegal in this state or stale; dropped silently.
    Ignored,
}

/// The whole state of one interview session.
///
/// Only the transition methods below mutate it. Side effects are never performed
/// here; they are issued as [`Command`]s on `command_tx` for the runtime to execute.
pub struct InterviewSession {
    role_id: String,
    resume_summary: Option<String>,
    topics: Vec<String>,
    editing_questions: Vec<Question>, // Pre-interview working copy
    questions: Vec<Question>,         // Frozen once the interview starts
    current_question_idx: usize,
    state: TurnState,
    records: Vec<QaRecord>,
    generation: Generation,
    pending: Option<PendingSubmission>,
    last_utterance: UtteranceId,
    awaited_utterance: Option<UtteranceId>,
    hint_given: bool,
    skip_policy: SkipPolicy,
    finalizing: bool,
    evaluation: Option<Evaluation>,
    command_tx: mpsc::UnboundedSender<Command>,
}

impl InterviewSession {
    pub fn new(role_id: impl Into<String>, command_tx: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            role_id: role_id.into(),
            resume_summary: None,
            topics: vec![],
            editing_questions: vec![],
            questions: vec![],
            current_question_idx: 0,
            state: TurnState::Done,
            records: vec![],
            generation: Generation::default(),
            pending: None,
            last_utterance: UtteranceId::default(),
            awaited_utterance: None,
            hint_given: false,
            skip_policy: SkipPolicy::default(),
            finalizing: false,
            evaluation: None,
            command_tx,
        }
    }

    pub fn with_skip_policy(mut self, policy: SkipPolicy) -> Self {
        self.skip_policy = policy;
        self
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn role_id(&self) -> &str {
        &self.role_id
    }

    pub fn resume_summary(&self) -> Option<&str> {
        self.resume_summary.as_deref()
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn current_question_idx(&self) -> usize {
        self.current_question_idx
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_idx)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn editing_questions(&self) -> &[Question] {
        &self.editing_questions
    }

    pub fn records(&self) -> &[QaRecord] {
        &self.records
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    pub fn is_in_progress(&self) -> bool {
        !self.questions.is_empty() && !self.finalizing
    }

    pub fn is_finalizing(&self) -> bool {
        self.finalizing
    }

    fn emit(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            tracing::warn!("Command receiver dropped; runtime is no longer listening");
        }
    }

    fn speak(&mut self, text: String) {
        self.last_utterance = UtteranceId(self.last_utterance.0 + 1);
        self.awaited_utterance = Some(self.last_utterance);
        self.emit(Command::Speak {
            utterance: self.last_utterance,
            text,
        });
    }

    // --- Pre-interview ---

    pub fn set_context(&mut self, resume_summary: Option<String>, topics: Vec<String>) {
        self.resume_summary = resume_summary;
        self.topics = topics;
    }

    /// Installs a freshly generated question set. This is a hard reset: records,
    /// results and any in-flight submission from the previous set are dropped.
    pub fn load_questions(&mut self, role_id: impl Into<String>, questions: Vec<Question>) {
        self.role_id = role_id.into();
        self.editing_questions = questions;
        self.questions.clear();
        self.records.clear();
        self.current_question_idx = 0;
        self.state = TurnState::Done;
        self.generation = self.generation.next();
        self.pending = None;
        self.awaited_utterance = None;
        self.hint_given = false;
        self.finalizing = false;
        self.evaluation = None;
        tracing::info!(
            "Loaded {} questions for role '{}'",
            self.editing_questions.len(),
            self.role_id
        );
    }

    fn ensure_editable(&self) -> Result<(), TurnError> {
        if !self.questions.is_empty() {
            return Err(TurnError::Validation(
                "questions cannot be edited once the interview has started".to_string(),
            ));
        }
        Ok(())
    }

    pub fn edit_question(&mut self, index: usize, text: impl Into<String>) -> Result<(), TurnError> {
        self.ensure_editable()?;
        let text = text.into();
        if text.trim().is_empty() {
            return Err(TurnError::Validation("question text cannot be empty".to_string()));
        }
        let question = self
            .editing_questions
            .get_mut(index)
            .ok_or_else(|| TurnError::Validation(format!("no question at position {}", index + 1)))?;
        question.text = text.trim().to_string();
        Ok(())
    }

    pub fn remove_question(&mut self, index: usize) -> Result<Question, TurnError> {
        self.ensure_editable()?;
        if index >= self.editing_questions.len() {
            return Err(TurnError::Validation(format!(
                "no question at position {}",
                index + 1
            )));
        }
        Ok(self.editing_questions.remove(index))
    }

    pub fn add_question(&mut self, kind: QuestionKind, text: impl Into<String>) -> Result<(), TurnError> {
        self.ensure_editable()?;
        let text = text.into();
        if text.trim().is_empty() {
            return Err(TurnError::Validation("question text cannot be empty".to_string()));
        }
        let id = self.editing_questions.iter().map(|q| q.id).max().unwrap_or(0) + 1;
        self.editing_questions
            .push(Question::new(id, kind, text.trim()));
        Ok(())
    }

    /// Freezes the edited questions and asks the first one.
    /// Fails without touching any state unless exactly three questions are ready.
    pub fn start_interview(&mut self) -> Result<(), TurnError> {
        self.ensure_editable()?;
        if self.editing_questions.len() != INTERVIEW_LENGTH {
            return Err(TurnError::Validation(format!(
                "an interview needs exactly {} questions, found {}",
                INTERVIEW_LENGTH,
                self.editing_questions.len()
            )));
        }
        if self.editing_questions.iter().any(|q| q.text.trim().is_empty()) {
            return Err(TurnError::Validation("question text cannot be empty".to_string()));
        }

        self.questions = self.editing_questions.clone();
        self.current_question_idx = 0;
        self.records.clear();
        self.finalizing = false;
        self.evaluation = None;
        tracing::info!("Interview started for role '{}'", self.role_id);
        self.ask_current();
        Ok(())
    }

    // --- Turn cycle ---

    // Entering a question forgets everything about the previous one.
    fn ask_current(&mut self) {
        let Some(question) = self.current_question().cloned() else {
            return;
        };
        self.state = TurnState::Asking;
        self.pending = None;
        self.hint_given = false;
        tracing::info!(
            "Asking question {}/{}",
            self.current_question_idx + 1,
            self.questions.len()
        );
        self.speak(question.text);
    }

    /// Playback of `utterance` completed. Drives `Asking -> Listening` and
    /// `Feedback -> Asking | Done`.
    pub fn speech_finished(&mut self, utterance: UtteranceId) -> Outcome {
        if self.awaited_utterance != Some(utterance) {
            tracing::debug!("Ignoring completion of superseded utterance {:?}", utterance);
            return Outcome::Ignored;
        }
        self.awaited_utterance = None;

        match self.state {
            TurnState::Asking => {
                self.state = TurnState::Listening;
                Outcome::Applied
            }
            TurnState::Feedback => {
                if self.current_question_idx < self.questions.len() {
                    self.ask_current();
                } else {
                    self.finalize();
                }
                Outcome::Applied
            }
            _ => Outcome::Ignored,
        }
    }

    fn finalize(&mut self) {
        self.state = TurnState::Done;
        self.finalizing = true;
        tracing::info!("All {} questions scored, finalizing", self.records.len());
        self.emit(Command::Finalize(self.records.clone()));
    }

    fn begin_submission(&mut self, kind: SubmissionKind, answer: Option<String>) -> Option<Generation> {
        let question = self.current_question()?.clone();
        self.generation = self.generation.next();
        self.state = TurnState::Submitting;
        self.pending = Some(PendingSubmission {
            generation: self.generation,
            question,
            kind,
            answer,
        });
        tracing::debug!("Submission {:?} started: {:?}", self.generation, kind);
        Some(self.generation)
    }

    fn emit_respond(&self) {
        if let Some(pending) = &self.pending {
            if let Some(request) = pending.respond_request(&self.role_id) {
                self.emit(Command::Respond {
                    generation: pending.generation,
                    request,
                });
            }
        }
    }

    pub fn submit_typed(&mut self, text: impl Into<String>) -> Outcome {
        if self.state != TurnState::Listening {
            tracing::debug!("Ignoring typed answer in {:?}", self.state);
            return Outcome::Ignored;
        }
        let text = text.into();
        let text = text.trim();
        if text.is_empty() {
            self.emit(Command::Notify(TurnError::RecoverableInput(
                "Please type an answer before submitting.".to_string(),
            )));
            return Outcome::Rejected;
        }
        if self
            .begin_submission(SubmissionKind::Answer(AnswerSource::Typed), Some(text.to_string()))
            .is_none()
        {
            return Outcome::Ignored;
        }
        self.emit_respond();
        Outcome::Applied
    }

    pub fn submit_voice(&mut self, clip: AudioClip) -> Outcome {
        if self.state != TurnState::Listening {
            tracing::debug!("Ignoring recording in {:?}", self.state);
            return Outcome::Ignored;
        }
        if clip.is_empty() {
            self.emit(Command::Notify(TurnError::RecoverableInput(
                "No audio was captured. Please try recording again.".to_string(),
            )));
            return Outcome::Rejected;
        }
        let Some(generation) = self.begin_submission(SubmissionKind::Answer(AnswerSource::Voice), None)
        else {
            return Outcome::Ignored;
        };
        self.emit(Command::Transcribe { generation, clip });
        Outcome::Applied
    }

    pub fn skip(&mut self) -> Outcome {
        if self.state != TurnState::Listening {
            tracing::debug!("Ignoring skip in {:?}", self.state);
            return Outcome::Ignored;
        }
        let hint = self.skip_policy == SkipPolicy::HintThenConfirm && !self.hint_given;
        if self.begin_submission(SubmissionKind::Skip { hint }, None).is_none() {
            return Outcome::Ignored;
        }
        if let Some(pending) = &self.pending {
            self.emit(Command::Skip {
                generation: pending.generation,
                request: pending.skip_request(&self.role_id),
            });
        }
        Outcome::Applied
    }

    fn is_current(&self, generation: Generation) -> bool {
        self.state == TurnState::Submitting
            && self
                .pending
                .as_ref()
                .is_some_and(|p| p.generation == generation)
    }

    fn recover(&mut self, error: TurnError) {
        tracing::warn!("Submission failed, back to listening: {}", error);
        self.pending = None;
        self.state = TurnState::Listening;
        self.emit(Command::Notify(error));
    }

    pub fn transcription_resolved(
        &mut self,
        generation: Generation,
        result: Result<String, String>,
    ) -> Outcome {
        if !self.is_current(generation) {
            tracing::debug!("Dropping stale transcription for {:?}", generation);
            return Outcome::Ignored;
        }
        match result {
            Err(e) => {
                self.recover(TurnError::RecoverableNetwork(format!("Transcription failed: {e}")));
            }
            Ok(text) if text.trim().is_empty() => {
                self.recover(TurnError::RecoverableInput(
                    "No speech detected. Please try again.".to_string(),
                ));
            }
            Ok(text) => {
                tracing::info!("Candidate said: \"{}\"", text.trim());
                if let Some(pending) = self.pending.as_mut() {
                    pending.answer = Some(text.trim().to_string());
                }
                self.emit_respond();
            }
        }
        Outcome::Applied
    }

    pub fn reply_resolved(
        &mut self,
        generation: Generation,
        result: Result<TurnFeedback, String>,
    ) -> Outcome {
        if !self.is_current(generation) {
            tracing::debug!("Dropping stale reply for {:?}", generation);
            return Outcome::Ignored;
        }
        let feedback = match result {
            Ok(feedback) => feedback,
            Err(e) => {
                self.recover(TurnError::RecoverableNetwork(e));
                return Outcome::Applied;
            }
        };
        let Some(pending) = self.pending.take() else {
            return Outcome::Ignored;
        };

        if pending.is_hint() {
            self.hint_given = true;
            self.state = TurnState::Asking;
            self.speak(feedback.reply);
            return Outcome::Applied;
        }

        let record = submission::fold_reply(pending, feedback);
        let reply = record
            .conversation
            .last()
            .map(|turn| turn.text.clone())
            .unwrap_or_default();
        tracing::info!(
            "Question {} scored {:.1} ({:?})",
            self.current_question_idx + 1,
            record.score,
            record.meta.source
        );
        self.records.push(record);
        self.current_question_idx += 1;
        self.state = TurnState::Feedback;
        self.speak(reply);
        Outcome::Applied
    }

    /// The candidate abandons the in-flight submission.
    pub fn cancel_submission(&mut self) -> Outcome {
        if self.state != TurnState::Submitting {
            return Outcome::Ignored;
        }
        self.generation = self.generation.next();
        self.pending = None;
        self.state = TurnState::Listening;
        tracing::info!("Submission cancelled, now at {:?}", self.generation);
        Outcome::Applied
    }

    /// The submission issued under `generation` took too long. Supersedes it so a
    /// late result is discarded.
    pub fn expire_submission(&mut self, generation: Generation) -> Outcome {
        if !self.is_current(generation) {
            return Outcome::Ignored;
        }
        self.generation = self.generation.next();
        self.recover(TurnError::RecoverableNetwork(
            "The server took too long to respond. Please try again.".to_string(),
        ));
        Outcome::Applied
    }

    pub fn record_evaluation(&mut self, evaluation: Evaluation) -> Outcome {
        if !self.finalizing {
            return Outcome::Ignored;
        }
        self.evaluation = Some(evaluation.clamped());
        Outcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RespondRequest;
    use crate::record::{SKIPPED_MARKER, Scores};

    fn questions() -> Vec<Question> {
        vec![
            Question::new(1, QuestionKind::Technical, "How does a hash map work?"),
            Question::new(2, QuestionKind::Project, "Tell me about a recent project."),
            Question::new(3, QuestionKind::Behavioral, "Describe a conflict you resolved."),
        ]
    }

    fn feedback(reply: &str, score: f32) -> TurnFeedback {
        TurnFeedback {
            reply: reply.to_string(),
            summary: format!("summary of {reply}"),
            remarks: "ok".to_string(),
            score,
        }
    }

    fn new_session() -> (InterviewSession, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = InterviewSession::new("sde", tx);
        session.load_questions("sde", questions());
        (session, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Command>) -> Vec<Command> {
        let mut commands = vec![];
        while let Ok(command) = rx.try_recv() {
            commands.push(command);
        }
        commands
    }

    fn last_utterance(commands: &[Command]) -> UtteranceId {
        commands
            .iter()
            .rev()
            .find_map(|c| match c {
                Command::Speak { utterance, .. } => Some(*utterance),
                _ => None,
            })
            .expect("a Speak command should have been issued")
    }

    fn respond_generation(commands: &[Command]) -> (Generation, RespondRequest) {
        commands
            .iter()
            .find_map(|c| match c {
                Command::Respond {
                    generation,
                    request,
                } => Some((*generation, request.clone())),
                _ => None,
            })
            .expect("a Respond command should have been issued")
    }

    fn assert_invariant(session: &InterviewSession) {
        if session.is_in_progress() {
            assert_eq!(session.records().len(), session.current_question_idx());
        }
    }

    /// Starts the interview and lets the first question finish playing.
    fn listening_session() -> (InterviewSession, mpsc::UnboundedReceiver<Command>) {
        let (mut session, mut rx) = new_session();
        session.start_interview().unwrap();
        let utterance = last_utterance(&drain(&mut rx));
        assert_eq!(session.speech_finished(utterance), Outcome::Applied);
        assert_eq!(session.state(), TurnState::Listening);
        (session, rx)
    }

    /// Plays the feedback utterance and the next question through to listening.
    fn finish_feedback(session: &mut InterviewSession, rx: &mut mpsc::UnboundedReceiver<Command>) {
        let utterance = last_utterance(&drain(rx));
        session.speech_finished(utterance);
        if session.state() == TurnState::Asking {
            let utterance = last_utterance(&drain(rx));
            session.speech_finished(utterance);
        }
    }

    #[test]
    fn start_requires_exactly_three_questions() {
        let (mut session, mut rx) = new_session();
        session.remove_question(2).unwrap();

        let err = session.start_interview().unwrap_err();
        assert!(matches!(err, TurnError::Validation(_)));
        assert_eq!(session.state(), TurnState::Done);
        assert_eq!(session.current_question_idx(), 0);
        assert!(session.records().is_empty());
        assert!(session.questions().is_empty());
        assert!(drain(&mut rx).is_empty(), "no command on a failed start");

        session
            .add_question(QuestionKind::Behavioral, "Tell me about a failure.")
            .unwrap();
        session.start_interview().unwrap();
        assert_eq!(session.state(), TurnState::Asking);
        assert_eq!(session.editing_questions()[2].id, 3);
    }

    #[test]
    fn questions_are_locked_after_start() {
        let (mut session, _rx) = new_session();
        session.edit_question(0, "  Explain open addressing.  ").unwrap();
        assert_eq!(session.editing_questions()[0].text, "Explain open addressing.");

        session.start_interview().unwrap();
        assert!(session.edit_question(0, "Anything").is_err());
        assert!(session.remove_question(0).is_err());
        assert!(session.start_interview().is_err());
    }

    #[test]
    fn cannot_answer_while_question_is_being_asked() {
        let (mut session, mut rx) = new_session();
        session.start_interview().unwrap();
        drain(&mut rx);

        assert_eq!(session.submit_typed("early answer"), Outcome::Ignored);
        assert_eq!(session.skip(), Outcome::Ignored);
        assert_eq!(session.state(), TurnState::Asking);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn typed_answer_produces_one_record() {
        let (mut session, mut rx) = listening_session();

        assert_eq!(session.submit_typed("I used a hash map..."), Outcome::Applied);
        assert_eq!(session.state(), TurnState::Submitting);
        let (generation, request) = respond_generation(&drain(&mut rx));
        assert_eq!(request.candidate_answer, "I used a hash map...");
        assert_eq!(request.question, "How does a hash map work?");

        // A second fire while submitting is rejected outright.
        assert_eq!(session.submit_typed("again"), Outcome::Ignored);
        assert_eq!(session.skip(), Outcome::Ignored);
        assert!(drain(&mut rx).is_empty());

        assert_eq!(
            session.reply_resolved(generation, Ok(feedback("Nice.", 7.0))),
            Outcome::Applied
        );
        assert_eq!(session.state(), TurnState::Feedback);
        assert_eq!(session.records().len(), 1);
        assert_eq!(session.records()[0].meta.source, AnswerSource::Typed);
        assert_invariant(&session);

        // A duplicate resolution can never score the question twice.
        assert_eq!(
            session.reply_resolved(generation, Ok(feedback("Nice.", 7.0))),
            Outcome::Ignored
        );
        assert_eq!(session.records().len(), 1);

        let commands = drain(&mut rx);
        assert!(matches!(commands.last(), Some(Command::Speak { text, .. }) if text == "Nice."));
    }

    #[test]
    fn feedback_blocks_input_until_read_aloud_completes() {
        let (mut session, mut rx) = listening_session();
        session.submit_typed("answer");
        let (generation, _) = respond_generation(&drain(&mut rx));
        session.reply_resolved(generation, Ok(feedback("Thanks.", 5.0)));
        let feedback_utterance = last_utterance(&drain(&mut rx));

        assert_eq!(session.submit_typed("too soon"), Outcome::Ignored);
        assert_eq!(session.state(), TurnState::Feedback);

        assert_eq!(session.speech_finished(feedback_utterance), Outcome::Applied);
        assert_eq!(session.state(), TurnState::Asking);
        assert_eq!(
            session.current_question().unwrap().text,
            "Tell me about a recent project."
        );
    }

    #[test]
    fn empty_typed_answer_is_recoverable() {
        let (mut session, mut rx) = listening_session();
        assert_eq!(session.submit_typed("   "), Outcome::Rejected);
        assert_eq!(session.state(), TurnState::Listening);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [Command::Notify(TurnError::RecoverableInput(_))]
        ));
    }

    #[test]
    fn empty_transcript_returns_to_listening_then_retry_succeeds() {
        let (mut session, mut rx) = listening_session();
        let clip = AudioClip {
            samples: vec![0.0; 1600],
            sample_rate: 16_000,
        };

        assert_eq!(session.submit_voice(clip.clone()), Outcome::Applied);
        let generation = match drain(&mut rx).as_slice() {
            [Command::Transcribe { generation, .. }] => *generation,
            other => panic!("Expected a Transcribe command, got {:?}", other),
        };
        session.transcription_resolved(generation, Ok("  ".to_string()));
        assert_eq!(session.state(), TurnState::Listening);
        assert!(session.records().is_empty());
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [Command::Notify(TurnError::RecoverableInput(_))]
        ));

        session.submit_voice(clip);
        let generation = match drain(&mut rx).as_slice() {
            [Command::Transcribe { generation, .. }] => *generation,
            other => panic!("Expected a Transcribe command, got {:?}", other),
        };
        session.transcription_resolved(generation, Ok("A hash map buckets keys.".to_string()));
        let (respond_gen, request) = respond_generation(&drain(&mut rx));
        assert_eq!(respond_gen, generation);
        assert_eq!(request.candidate_answer, "A hash map buckets keys.");

        session.reply_resolved(generation, Ok(feedback("Good.", 8.0)));
        assert_eq!(session.records().len(), 1);
        assert_eq!(session.records()[0].meta.source, AnswerSource::Voice);
        assert_eq!(
            session.records()[0].conversation[1].text,
            "A hash map buckets keys."
        );
    }

    #[test]
    fn network_failure_returns_to_listening() {
        let (mut session, mut rx) = listening_session();
        session.submit_typed("answer");
        let (generation, _) = respond_generation(&drain(&mut rx));

        session.reply_resolved(generation, Err("connection refused".to_string()));
        assert_eq!(session.state(), TurnState::Listening);
        assert!(session.records().is_empty());
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [Command::Notify(TurnError::RecoverableNetwork(msg))] if msg.contains("connection refused")
        ));

        // The discarded attempt leaves nothing behind; a fresh submission works.
        assert_eq!(session.submit_typed("second try"), Outcome::Applied);
    }

    #[test]
    fn superseded_submission_never_mutates_state() {
        let (mut session, mut rx) = listening_session();

        // Submission A goes out and stalls.
        session.submit_typed("answer A");
        let (generation_a, _) = respond_generation(&drain(&mut rx));
        assert_eq!(session.expire_submission(generation_a), Outcome::Applied);
        assert_eq!(session.state(), TurnState::Listening);
        drain(&mut rx);

        // The candidate skips instead.
        assert_eq!(session.skip(), Outcome::Applied);
        let generation_skip = match drain(&mut rx).as_slice() {
            [Command::Skip { generation, request }] => {
                assert!(!request.hint);
                *generation
            }
            other => panic!("Expected a Skip command, got {:?}", other),
        };
        assert!(generation_skip > generation_a);
        session.reply_resolved(generation_skip, Ok(feedback("Moving on.", 0.0)));
        assert_eq!(session.records().len(), 1);

        // A finally resolves: nothing changes.
        let state_before = session.state();
        let idx_before = session.current_question_idx();
        assert_eq!(
            session.reply_resolved(generation_a, Ok(feedback("Late!", 9.0))),
            Outcome::Ignored
        );
        assert_eq!(
            session.transcription_resolved(generation_a, Ok("late".to_string())),
            Outcome::Ignored
        );
        assert_eq!(session.state(), state_before);
        assert_eq!(session.current_question_idx(), idx_before);
        assert_eq!(session.records().len(), 1);
        assert_eq!(session.records()[0].meta.source, AnswerSource::Skip);
        assert_eq!(session.expire_submission(generation_a), Outcome::Ignored);
    }

    #[test]
    fn cancelled_submission_is_discarded() {
        let (mut session, mut rx) = listening_session();
        session.submit_typed("answer A");
        let (generation, _) = respond_generation(&drain(&mut rx));

        assert_eq!(session.cancel_submission(), Outcome::Applied);
        assert_eq!(session.state(), TurnState::Listening);
        assert_eq!(
            session.reply_resolved(generation, Ok(feedback("Late", 3.0))),
            Outcome::Ignored
        );
        assert!(session.records().is_empty());
        assert_eq!(session.cancel_submission(), Outcome::Ignored);
    }

    #[test]
    fn skip_on_second_question_records_marker() {
        let (mut session, mut rx) = listening_session();
        session.submit_typed("I used a hash map...");
        let (generation, _) = respond_generation(&drain(&mut rx));
        session.reply_resolved(generation, Ok(feedback("Good.", 8.0)));
        finish_feedback(&mut session, &mut rx);
        assert_eq!(session.state(), TurnState::Listening);
        assert_eq!(session.current_question_idx(), 1);

        session.skip();
        let generation = match drain(&mut rx).as_slice() {
            [Command::Skip { generation, .. }] => *generation,
            other => panic!("Expected a Skip command, got {:?}", other),
        };
        session.reply_resolved(generation, Ok(feedback("No problem.", 0.0)));

        let record = &session.records()[1];
        assert_eq!(record.conversation[1].text, SKIPPED_MARKER);
        assert_eq!(record.meta.source, AnswerSource::Skip);
        assert_eq!(record.question_text, "Tell me about a recent project.");
        assert_invariant(&session);
    }

    #[test]
    fn two_stage_skip_gives_a_hint_first() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session =
            InterviewSession::new("sde", tx).with_skip_policy(SkipPolicy::HintThenConfirm);
        session.load_questions("sde", questions());
        session.start_interview().unwrap();
        let utterance = last_utterance(&drain(&mut rx));
        session.speech_finished(utterance);

        session.skip();
        let generation = match drain(&mut rx).as_slice() {
            [Command::Skip { generation, request }] => {
                assert!(request.hint);
                *generation
            }
            other => panic!("Expected a hint Skip command, got {:?}", other),
        };
        session.reply_resolved(generation, Ok(feedback("Think about buckets.", 0.0)));
        assert!(session.records().is_empty());
        assert_eq!(session.state(), TurnState::Asking);
        let hint_utterance = last_utterance(&drain(&mut rx));
        session.speech_finished(hint_utterance);
        assert_eq!(session.state(), TurnState::Listening);

        session.skip();
        let generation = match drain(&mut rx).as_slice() {
            [Command::Skip { generation, request }] => {
                assert!(!request.hint);
                *generation
            }
            other => panic!("Expected a terminal Skip command, got {:?}", other),
        };
        session.reply_resolved(generation, Ok(feedback("Moving on.", 0.0)));
        assert_eq!(session.records().len(), 1);
        assert_eq!(session.records()[0].meta.source, AnswerSource::Skip);
    }

    #[test]
    fn stale_speech_completion_is_ignored() {
        let (mut session, mut rx) = new_session();
        session.start_interview().unwrap();
        let first = last_utterance(&drain(&mut rx));

        assert_eq!(session.speech_finished(UtteranceId(first.0 + 7)), Outcome::Ignored);
        assert_eq!(session.state(), TurnState::Asking);
        assert_eq!(session.speech_finished(first), Outcome::Applied);
        assert_eq!(session.speech_finished(first), Outcome::Ignored);
    }

    #[test]
    fn full_interview_finalizes_with_records_in_order() {
        let (mut session, mut rx) = listening_session();
        let answers = ["I used a hash map...", "I built a cache.", "We talked it out."];

        for (i, answer) in answers.iter().enumerate() {
            assert_eq!(session.current_question_idx(), i);
            assert_invariant(&session);
            session.submit_typed(*answer);
            let (generation, _) = respond_generation(&drain(&mut rx));
            session.reply_resolved(generation, Ok(feedback("Thanks.", 6.0)));
            assert_invariant(&session);
            if i + 1 < answers.len() {
                finish_feedback(&mut session, &mut rx);
            }
        }

        let utterance = last_utterance(&drain(&mut rx));
        session.speech_finished(utterance);
        assert_eq!(session.state(), TurnState::Done);
        assert!(session.is_finalizing());

        let records = match drain(&mut rx).as_slice() {
            [Command::Finalize(records)] => records.clone(),
            other => panic!("Expected a Finalize command, got {:?}", other),
        };
        assert_eq!(records.len(), 3);
        for (record, answer) in records.iter().zip(answers) {
            assert_eq!(record.conversation[1].text, answer);
        }

        let outcome = session.record_evaluation(Evaluation {
            scores: Scores {
                overall: 12.0,
                ..Default::default()
            },
            feedback: Default::default(),
        });
        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(session.evaluation().unwrap().scores.overall, 10.0);
    }

    #[test]
    fn loading_new_questions_is_a_hard_reset() {
        let (mut session, mut rx) = listening_session();
        session.submit_typed("answer");
        let (generation, _) = respond_generation(&drain(&mut rx));

        session.load_questions("sales", questions());
        assert_eq!(session.state(), TurnState::Done);
        assert_eq!(session.role_id(), "sales");
        assert!(session.records().is_empty());
        assert!(session.questions().is_empty());
        assert!(session.evaluation().is_none());
        assert_eq!(
            session.reply_resolved(generation, Ok(feedback("Late", 5.0))),
            Outcome::Ignored
        );
    }

    #[test]
    fn evaluation_is_only_recorded_when_finalizing() {
        let (mut session, _rx) = listening_session();
        assert_eq!(
            session.record_evaluation(Evaluation::default()),
            Outcome::Ignored
        );
        assert!(session.evaluation().is_none());
    }
}
