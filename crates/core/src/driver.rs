use crate::backend::InterviewBackend;
use crate::error::TurnError;
use crate::orchestrator::{FinalReport, Orchestrator};
use crate::question::Question;
use crate::record::QaRecord;
use crate::recorder::{AudioClip, Recorder};
use crate::session_state::{Generation, InterviewSession, Outcome, SkipPolicy, TurnState};
use crate::speech::Speaker;
use crate::{Command, Input, submission};
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What the driver reports to whoever renders the interview.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged { state: TurnState, question_idx: usize },
    Notice(TurnError),
    RecordingStarted,
    RecordingStopped,
    TurnScored(QaRecord),
    Finished(FinalReport),
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// How long a transcribe/respond/skip call may run before it is superseded.
    pub submission_timeout: Duration,
    pub skip_policy: SkipPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            submission_timeout: Duration::from_secs(60),
            skip_policy: SkipPolicy::default(),
        }
    }
}

/// Runs one interview session.
///
/// The driver is the only owner of the session and the recorder. It consumes
/// [`Input`]s one at a time, lets the session decide, and executes the resulting
/// [`Command`]s. Every collaborator call and every utterance runs in its own task
/// and reports back through the input channel.
pub struct InterviewDriver {
    session: InterviewSession,
    recorder: Recorder,
    orchestrator: Orchestrator,
    speaker: Arc<dyn Speaker>,
    config: DriverConfig,
    input_tx: mpsc::UnboundedSender<Input>,
    input_rx: mpsc::UnboundedReceiver<Input>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    unfinished: Option<Vec<QaRecord>>, // Records waiting for a successful evaluation
    report: Option<FinalReport>,
}

impl InterviewDriver {
    pub fn new(
        role_id: impl Into<String>,
        backend: Arc<dyn InterviewBackend>,
        speaker: Arc<dyn Speaker>,
        recorder: Recorder,
        config: DriverConfig,
    ) -> (
        Self,
        mpsc::UnboundedSender<Input>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let session = InterviewSession::new(role_id, command_tx).with_skip_policy(config.skip_policy);

        let driver = Self {
            session,
            recorder,
            orchestrator: Orchestrator::new(backend),
            speaker,
            config,
            input_tx: input_tx.clone(),
            input_rx,
            command_rx,
            event_tx,
            unfinished: None,
            report: None,
        };
        (driver, input_tx, event_rx)
    }

    pub fn session(&self) -> &InterviewSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut InterviewSession {
        &mut self.session
    }

    pub async fn generate_questions(
        &mut self,
        resume_summary: Option<String>,
        topics: Vec<String>,
    ) -> Result<Vec<Question>> {
        let role = self.session.role_id().to_string();
        self.orchestrator
            .generate_questions(&mut self.session, &role, resume_summary, topics)
            .await
    }

    pub fn start(&mut self) -> Result<(), TurnError> {
        self.orchestrator.start_interview(&mut self.session)
    }

    fn emit(&self, event: SessionEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::debug!("Session event receiver dropped");
        }
    }

    fn emit_state(&self) {
        self.emit(SessionEvent::StateChanged {
            state: self.session.state(),
            question_idx: self.session.current_question_idx(),
        });
    }

    /// Runs until the interview is evaluated or `Input::Shutdown` arrives.
    /// Returns the final report when the interview completed.
    pub async fn run(mut self) -> Result<Option<FinalReport>> {
        self.dispatch_commands().await;
        self.emit_state();

        while let Some(input) = self.input_rx.recv().await {
            if matches!(input, Input::Shutdown) {
                tracing::info!("Driver shutting down");
                break;
            }
            let before = (self.session.state(), self.session.current_question_idx());
            self.handle_input(input).await;
            self.dispatch_commands().await;
            if before != (self.session.state(), self.session.current_question_idx()) {
                self.emit_state();
            }
            if self.report.is_some() {
                break;
            }
        }

        self.recorder.discard();
        self.speaker.cancel().await;
        Ok(self.report.take())
    }

    async fn handle_input(&mut self, input: Input) {
        match input {
            Input::SpeechFinished(utterance) => {
                self.session.speech_finished(utterance);
            }
            Input::StartRecording => self.start_recording(),
            Input::StopRecording => {
                if let Some(clip) = self.recorder.stop() {
                    self.emit(SessionEvent::RecordingStopped);
                    self.submit_clip(clip);
                }
            }
            Input::RecordingCeiling(id) => {
                if let Some(clip) = self.recorder.stop_expired(id) {
                    self.emit(SessionEvent::RecordingStopped);
                    self.submit_clip(clip);
                }
            }
            Input::TypedAnswer(text) => {
                if self.session.submit_typed(text) == Outcome::Applied {
                    self.discard_recording();
                }
            }
            Input::Skip => {
                if self.session.skip() == Outcome::Applied {
                    self.discard_recording();
                }
            }
            Input::Cancel => {
                self.session.cancel_submission();
            }
            Input::Transcribed { generation, result } => {
                self.session.transcription_resolved(generation, result);
            }
            Input::Replied { generation, result } => {
                let scored = self.session.records().len();
                self.session.reply_resolved(generation, result);
                if self.session.records().len() > scored {
                    if let Some(record) = self.session.records().last() {
                        self.emit(SessionEvent::TurnScored(record.clone()));
                    }
                }
            }
            Input::SubmissionExpired(generation) => {
                self.session.expire_submission(generation);
            }
            Input::RetryFinalize => match self.unfinished.take() {
                Some(records) => self.finalize(records).await,
                None => tracing::debug!("Nothing to retry"),
            },
            Input::Shutdown => {}
        }
    }

    fn start_recording(&mut self) {
        if self.session.state() != TurnState::Listening {
            tracing::debug!("Not listening, ignoring record request");
            return;
        }
        match self.recorder.start() {
            Ok(Some(id)) => {
                let tx = self.input_tx.clone();
                let ceiling = self.recorder.ceiling();
                tokio::spawn(async move {
                    tokio::time::sleep(ceiling).await;
                    let _ = tx.send(Input::RecordingCeiling(id));
                });
                self.emit(SessionEvent::RecordingStarted);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Failed to start recording: {}", e);
                self.emit(SessionEvent::Notice(TurnError::RecoverableInput(e.to_string())));
            }
        }
    }

    // Every stop path ends here. Audio that arrives after the turn moved on is dropped.
    fn submit_clip(&mut self, clip: AudioClip) {
        if self.session.state() != TurnState::Listening {
            tracing::debug!("Dropping recording captured outside of listening");
            return;
        }
        self.session.submit_voice(clip);
    }

    fn discard_recording(&mut self) {
        if self.recorder.is_recording() {
            self.recorder.discard();
            self.emit(SessionEvent::RecordingStopped);
        }
    }

    async fn dispatch_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                Command::Speak { utterance, text } => {
                    let speaker = self.speaker.clone();
                    let tx = self.input_tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = speaker.speak(&text).await {
                            tracing::warn!("Read-aloud failed: {:#}", e);
                        }
                        let _ = tx.send(Input::SpeechFinished(utterance));
                    });
                }
                Command::Transcribe { generation, clip } => {
                    let backend = self.orchestrator.backend();
                    self.spawn_submission(generation, submission::transcribe(backend, generation, clip));
                }
                Command::Respond {
                    generation,
                    request,
                } => {
                    let backend = self.orchestrator.backend();
                    self.spawn_submission(generation, submission::respond(backend, generation, request));
                }
                Command::Skip {
                    generation,
                    request,
                } => {
                    let backend = self.orchestrator.backend();
                    self.spawn_submission(generation, submission::skip(backend, generation, request));
                }
                Command::Notify(error) => {
                    self.emit(SessionEvent::Notice(error));
                }
                Command::Finalize(records) => {
                    self.finalize(records).await;
                }
            }
        }
    }

    fn spawn_submission<F>(&self, generation: Generation, call: F)
    where
        F: Future<Output = Input> + Send + 'static,
    {
        let tx = self.input_tx.clone();
        let timeout = self.config.submission_timeout;
        tokio::spawn(async move {
            let input = match tokio::time::timeout(timeout, call).await {
                Ok(input) => input,
                Err(_) => {
                    tracing::warn!("Submission {:?} timed out after {:?}", generation, timeout);
                    Input::SubmissionExpired(generation)
                }
            };
            let _ = tx.send(input);
        });
    }

    async fn finalize(&mut self, records: Vec<QaRecord>) {
        match self
            .orchestrator
            .finish_interview(&mut self.session, records.clone())
            .await
        {
            Ok(report) => {
                if let Some(error) = &report.persistence_error {
                    self.emit(SessionEvent::Notice(error.clone()));
                }
                self.emit(SessionEvent::Finished(report.clone()));
                self.report = Some(report);
            }
            Err(error) => {
                tracing::warn!("Final evaluation failed: {}", error);
                self.unfinished = Some(records);
                self.emit(SessionEvent::Notice(error));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockInterviewBackend;
    use crate::question::QuestionKind;
    use crate::record::{AnswerSource, Evaluation, Scores, TurnFeedback};
    use crate::recorder::tests::FakeDevice;
    use crate::speech::MockSpeaker;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn questions() -> Vec<Question> {
        vec![
            Question::new(1, QuestionKind::Technical, "How would you find duplicates in a list?"),
            Question::new(2, QuestionKind::Project, "Walk me through a project you led."),
            Question::new(3, QuestionKind::Behavioral, "Tell me about a missed deadline."),
        ]
    }

    fn turn_feedback() -> TurnFeedback {
        TurnFeedback {
            reply: "Thanks, noted.".to_string(),
            summary: "Reasonable answer".to_string(),
            remarks: "Add more detail".to_string(),
            score: 7.0,
        }
    }

    fn quiet_speaker() -> Arc<dyn Speaker> {
        let mut speaker = MockSpeaker::new();
        speaker.expect_speak().returning(|_| Ok(()));
        speaker.expect_cancel().returning(|| ());
        Arc::new(speaker)
    }

    fn backend_with_questions() -> MockInterviewBackend {
        let mut backend = MockInterviewBackend::new();
        backend
            .expect_generate_questions()
            .times(1)
            .returning(|_| Ok(questions()));
        backend
    }

    #[tokio::test]
    async fn typed_interview_end_to_end() {
        let mut backend = backend_with_questions();
        backend
            .expect_respond()
            .times(3)
            .returning(|_| Ok(turn_feedback()));
        backend
            .expect_evaluate()
            .withf(|req| {
                req.role == "sde"
                    && req.qa.len() == 3
                    && req.qa.iter().all(|r| r.meta.source == AnswerSource::Typed)
                    && req.qa[0].conversation[1].text == "I used a hash map..."
                    && req.qa[2].question_text == "Tell me about a missed deadline."
            })
            .times(1)
            .returning(|_| {
                Ok(Evaluation {
                    scores: Scores {
                        communication: 8.0,
                        technical: 7.0,
                        role_fit: 9.0,
                        overall: 8.0,
                    },
                    feedback: Default::default(),
                })
            });
        backend.expect_save_result().times(1).returning(|_| Ok(()));

        let recorder = Recorder::new(Box::new(FakeDevice::default()));
        let (mut driver, input_tx, mut events) = InterviewDriver::new(
            "sde",
            Arc::new(backend),
            quiet_speaker(),
            recorder,
            DriverConfig::default(),
        );
        driver.generate_questions(None, vec![]).await.unwrap();
        driver.start().unwrap();
        let run = tokio::spawn(driver.run());

        let answers = ["I used a hash map...", "I led a migration.", "I renegotiated scope."];
        let mut scored = vec![];
        let mut finished = None;
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::StateChanged {
                    state: TurnState::Listening,
                    question_idx,
                } => {
                    input_tx
                        .send(Input::TypedAnswer(answers[question_idx].to_string()))
                        .unwrap();
                }
                SessionEvent::TurnScored(record) => scored.push(record),
                SessionEvent::Finished(report) => {
                    finished = Some(report);
                    break;
                }
                _ => {}
            }
        }

        let report = finished.expect("interview should finish");
        assert_eq!(scored.len(), 3);
        assert_eq!(report.records, scored);
        assert!((0.0..=10.0).contains(&report.evaluation.scores.overall));
        assert!(report.persistence_error.is_none());

        let returned = run.await.unwrap().unwrap();
        assert_eq!(returned, Some(report));
    }

    #[tokio::test(start_paused = true)]
    async fn recording_stops_at_the_ceiling_and_submits() {
        let mut backend = backend_with_questions();
        backend
            .expect_transcribe()
            .times(1)
            .returning(|_| Ok("I would use a trie".to_string()));
        backend
            .expect_respond()
            .withf(|req| req.candidate_answer == "I would use a trie")
            .times(1)
            .returning(|_| Ok(turn_feedback()));

        let device = FakeDevice {
            chunk: vec![0.1; 1600],
            ..Default::default()
        };
        let released = device.released.clone();
        let (mut driver, input_tx, mut events) = InterviewDriver::new(
            "sde",
            Arc::new(backend),
            quiet_speaker(),
            Recorder::new(Box::new(device)),
            DriverConfig::default(),
        );
        driver.generate_questions(None, vec![]).await.unwrap();
        driver.start().unwrap();
        let run = tokio::spawn(driver.run());

        let mut started_at = None;
        let mut stopped_at = None;
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::StateChanged {
                    state: TurnState::Listening,
                    question_idx: 0,
                } if started_at.is_none() => {
                    input_tx.send(Input::StartRecording).unwrap();
                }
                SessionEvent::RecordingStarted => started_at = Some(tokio::time::Instant::now()),
                SessionEvent::RecordingStopped => stopped_at = Some(tokio::time::Instant::now()),
                SessionEvent::TurnScored(record) => {
                    assert_eq!(record.meta.source, AnswerSource::Voice);
                    assert_eq!(record.conversation[1].text, "I would use a trie");
                    break;
                }
                _ => {}
            }
        }

        let elapsed = stopped_at.unwrap() - started_at.unwrap();
        assert!(elapsed >= Duration::from_secs(45));
        assert_eq!(released.load(Ordering::SeqCst), 1);

        input_tx.send(Input::Shutdown).unwrap();
        assert_eq!(run.await.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn typed_answer_while_recording_releases_the_device() {
        let mut backend = backend_with_questions();
        backend
            .expect_respond()
            .times(1)
            .returning(|_| Ok(turn_feedback()));
        backend.expect_transcribe().never();

        let device = FakeDevice::default();
        let released = device.released.clone();
        let (mut driver, input_tx, mut events) = InterviewDriver::new(
            "sde",
            Arc::new(backend),
            quiet_speaker(),
            Recorder::new(Box::new(device)),
            DriverConfig::default(),
        );
        driver.generate_questions(None, vec![]).await.unwrap();
        driver.start().unwrap();
        let run = tokio::spawn(driver.run());

        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::StateChanged {
                    state: TurnState::Listening,
                    question_idx: 0,
                } => input_tx.send(Input::StartRecording).unwrap(),
                SessionEvent::RecordingStarted => {
                    input_tx
                        .send(Input::TypedAnswer("A sorted set".to_string()))
                        .unwrap();
                }
                SessionEvent::TurnScored(record) => {
                    assert_eq!(record.meta.source, AnswerSource::Typed);
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);

        input_tx.send(Input::Shutdown).unwrap();
        run.await.unwrap().unwrap();
    }

    /// Backend whose first reply takes longer than any sane submission timeout.
    struct SlowFirstReply {
        replies: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl InterviewBackend for SlowFirstReply {
        async fn roles(&self) -> Result<Vec<crate::question::Role>> {
            Ok(crate::question::default_roles())
        }

        async fn generate_questions(
            &self,
            _request: &crate::backend::GenerateQuestionsRequest,
        ) -> Result<Vec<Question>> {
            Ok(questions())
        }

        async fn transcribe(&self, _clip: &AudioClip) -> Result<String> {
            Ok(String::new())
        }

        async fn respond(&self, request: &crate::backend::RespondRequest) -> Result<TurnFeedback> {
            if self.replies.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(TurnFeedback {
                reply: format!("You said {}", request.candidate_answer),
                ..turn_feedback()
            })
        }

        async fn skip(&self, _request: &crate::backend::SkipRequest) -> Result<TurnFeedback> {
            Ok(turn_feedback())
        }

        async fn evaluate(&self, _request: &crate::backend::EvaluateRequest) -> Result<Evaluation> {
            Ok(Evaluation::default())
        }

        async fn save_result(&self, _request: &crate::backend::SaveResultRequest) -> Result<()> {
            Ok(())
        }

        async fn resume_summary(&self, _pdf: Vec<u8>, _role: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_reply_expires_and_the_candidate_can_retry() {
        let backend = Arc::new(SlowFirstReply {
            replies: AtomicUsize::new(0),
        });
        let config = DriverConfig {
            submission_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let (mut driver, input_tx, mut events) = InterviewDriver::new(
            "sde",
            backend.clone(),
            quiet_speaker(),
            Recorder::new(Box::new(FakeDevice::default())),
            config,
        );
        driver.generate_questions(None, vec![]).await.unwrap();
        driver.start().unwrap();
        let run = tokio::spawn(driver.run());

        let answers = ["first", "second"];
        let mut attempt = 0;
        let mut expired = false;
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::StateChanged {
                    state: TurnState::Listening,
                    question_idx: 0,
                } => {
                    input_tx
                        .send(Input::TypedAnswer(answers[attempt].to_string()))
                        .unwrap();
                    attempt += 1;
                }
                SessionEvent::Notice(TurnError::RecoverableNetwork(_)) => expired = true,
                SessionEvent::TurnScored(record) => {
                    assert_eq!(record.conversation[1].text, "second");
                    assert_eq!(record.conversation[2].text, "You said second");
                    break;
                }
                _ => {}
            }
        }
        assert!(expired);
        assert_eq!(backend.replies.load(Ordering::SeqCst), 2);

        input_tx.send(Input::Shutdown).unwrap();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failed_evaluation_can_be_retried() {
        let mut backend = backend_with_questions();
        backend
            .expect_skip()
            .times(3)
            .returning(|_| Ok(turn_feedback()));
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        backend.expect_evaluate().times(2).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(anyhow::anyhow!("model overloaded"))
            } else {
                Ok(Evaluation::default())
            }
        });
        backend.expect_save_result().times(1).returning(|_| Ok(()));

        let (mut driver, input_tx, mut events) = InterviewDriver::new(
            "sde",
            Arc::new(backend),
            quiet_speaker(),
            Recorder::new(Box::new(FakeDevice::default())),
            DriverConfig::default(),
        );
        driver.generate_questions(None, vec![]).await.unwrap();
        driver.start().unwrap();
        let run = tokio::spawn(driver.run());

        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::StateChanged {
                    state: TurnState::Listening,
                    ..
                } => input_tx.send(Input::Skip).unwrap(),
                SessionEvent::Notice(TurnError::RecoverableNetwork(msg))
                    if msg.contains("model overloaded") =>
                {
                    input_tx.send(Input::RetryFinalize).unwrap();
                }
                SessionEvent::Finished(report) => {
                    assert_eq!(report.records.len(), 3);
                    assert!(
                        report
                            .records
                            .iter()
                            .all(|r| r.meta.source == AnswerSource::Skip)
                    );
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(run.await.unwrap().unwrap().is_some());
    }
}
