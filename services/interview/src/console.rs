use interview_core::Input;
use interview_core::driver::SessionEvent;
use interview_core::orchestrator::FinalReport;
use interview_core::question::Question;
use interview_core::session_state::TurnState;
use std::fmt::Write;
use tokio::sync::mpsc;

pub const HELP: &str = "Type your answer and press enter, or use a command:
  /record   start a voice answer (needs --voice)
  /stop     stop recording and submit
  /skip     skip the current question
  /cancel   abandon the answer being scored
  /retry    retry a failed evaluation
  /quit     end the session";

/// One line typed by the candidate.
#[derive(Debug)]
pub enum ConsoleLine {
    Send(Input),
    Help,
    Unknown(String),
    Blank,
}

pub fn parse_line(line: &str) -> ConsoleLine {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleLine::Blank;
    }
    if !line.starts_with('/') {
        return ConsoleLine::Send(Input::TypedAnswer(line.to_string()));
    }
    match line.to_lowercase().as_str() {
        "/record" => ConsoleLine::Send(Input::StartRecording),
        "/stop" => ConsoleLine::Send(Input::StopRecording),
        "/skip" => ConsoleLine::Send(Input::Skip),
        "/cancel" => ConsoleLine::Send(Input::Cancel),
        "/retry" => ConsoleLine::Send(Input::RetryFinalize),
        "/quit" | "/exit" => ConsoleLine::Send(Input::Shutdown),
        "/help" | "/?" => ConsoleLine::Help,
        _ => ConsoleLine::Unknown(line.to_string()),
    }
}

/// Reads stdin lines on a plain thread so a pending read never holds up runtime shutdown.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

pub fn describe_question(position: usize, question: &Question) -> String {
    format!("Q{} [{}] {}", position + 1, question.kind, question.text)
}

/// The line printed for a session event, if any.
pub fn describe_event(event: &SessionEvent, question_count: usize) -> Option<String> {
    match event {
        SessionEvent::StateChanged { state, question_idx } => match state {
            TurnState::Asking => Some(format!(
                "--- Question {} of {} ---",
                question_idx + 1,
                question_count
            )),
            TurnState::Listening => Some("Your answer (/help for commands):".to_string()),
            TurnState::Submitting => Some("Thinking...".to_string()),
            TurnState::Feedback => None,
            TurnState::Done => Some("Evaluating your interview...".to_string()),
        },
        SessionEvent::Notice(error) => Some(format!("! {}", error)),
        SessionEvent::RecordingStarted => {
            Some("Recording. Type /stop when you are done.".to_string())
        }
        SessionEvent::RecordingStopped => Some("Recording stopped.".to_string()),
        SessionEvent::TurnScored(record) => Some(format!("Score: {:.1}/10", record.score)),
        SessionEvent::Finished(_) => None,
    }
}

pub fn render_report(report: &FinalReport) -> String {
    let scores = &report.evaluation.scores;
    let feedback = &report.evaluation.feedback;
    let mut out = String::new();

    let _ = writeln!(out, "===== Interview results ({}) =====", report.role);
    let _ = writeln!(out, "Overall:       {:.1}/10", scores.overall);
    let _ = writeln!(out, "Communication: {:.1}/10", scores.communication);
    let _ = writeln!(out, "Technical:     {:.1}/10", scores.technical);
    let _ = writeln!(out, "Role fit:      {:.1}/10", scores.role_fit);

    if !feedback.summary.is_empty() {
        let _ = writeln!(out, "\n{}", feedback.summary);
    }
    for (title, items) in [
        ("Strengths", &feedback.strengths),
        ("To improve", &feedback.improvements),
    ] {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}:", title);
        for item in items {
            let _ = writeln!(out, "  - {}", item);
        }
    }
    if !feedback.next_steps.is_empty() {
        let _ = writeln!(out, "\nNext steps: {}", feedback.next_steps);
    }

    let _ = writeln!(out, "\nPer question:");
    for (i, record) in report.records.iter().enumerate() {
        let _ = writeln!(out, "  {}. {:.1}/10  {}", i + 1, record.score, record.question_text);
        if !record.remarks.is_empty() {
            let _ = writeln!(out, "     {}", record.remarks);
        }
    }

    if let Some(error) = &report.persistence_error {
        let _ = writeln!(out, "\nWarning: {}", error);
    }
    out
}
