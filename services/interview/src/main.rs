use anyhow::{Context, Result};
use clap::Parser;
use interview_core::Input;
use interview_core::backend::{BackendClient, InterviewBackend};
use interview_core::driver::{DriverConfig, InterviewDriver};
use interview_core::question::{RoleCatalog, default_roles};
use interview_core::recorder::{AudioDevice, Recorder};
use interview_core::session_state::SkipPolicy;
use interview_service::capture::{CpalDevice, DisabledDevice};
use interview_service::config::{Config, ROLE_MATCH_THRESHOLD};
use interview_service::console::{self, ConsoleLine, HELP};
use interview_service::speaker::ConsoleSpeaker;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Practice a three-question mock interview in the terminal")]
struct Cli {
    /// Role to interview for, by id ("sde") or name ("software engineer")
    #[arg(long, required_unless_present = "list_devices")]
    role: Option<String>,
    /// PDF resume used to tailor the questions
    #[arg(long)]
    resume: Option<PathBuf>,
    /// Topic to practice; repeat for several
    #[arg(long = "topic")]
    topics: Vec<String>,
    /// Answer by voice with /record and /stop
    #[arg(long)]
    voice: bool,
    /// Input device name; defaults to the system input
    #[arg(long)]
    device: Option<String>,
    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,
    /// Review and replace the generated questions before starting
    #[arg(long)]
    edit: bool,
    /// The first /skip on a question asks for a hint instead of skipping
    #[arg(long)]
    hints: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    // stdout belongs to the interview itself.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    if args.list_devices {
        println!("{}", interview_native_utils::device::get_available_inputs()?);
        return Ok(());
    }

    // --- 4. Initialize the API Client ---
    let backend: Arc<dyn InterviewBackend> = Arc::new(
        BackendClient::new(config.api_url.clone(), config.submission_timeout)
            .context("Failed to create interview API client")?,
    );
    tracing::info!("Using interview API at {}", config.api_url);

    let roles = match backend.roles().await {
        Ok(roles) => roles,
        Err(e) => {
            tracing::warn!("Falling back to built-in roles: {:#}", e);
            default_roles()
        }
    };
    let catalog = RoleCatalog::new(roles);
    let role_query = args.role.clone().context("--role is required")?;
    let role_id = match catalog.find(&role_query, ROLE_MATCH_THRESHOLD) {
        Some(role) => {
            println!("Interviewing for: {}", role.name);
            role.id.clone()
        }
        None => {
            tracing::warn!("'{}' is not a known role, using it as given", role_query);
            role_query
        }
    };

    let resume_summary = match &args.resume {
        Some(path) => summarize_resume(backend.as_ref(), path, &role_id).await,
        None => None,
    };

    // --- 5. Session Setup ---
    let device: Box<dyn AudioDevice> = if args.voice {
        Box::new(CpalDevice::new(args.device.clone()))
    } else {
        Box::new(DisabledDevice)
    };
    let driver_config = DriverConfig {
        submission_timeout: config.submission_timeout,
        skip_policy: if args.hints {
            SkipPolicy::HintThenConfirm
        } else {
            SkipPolicy::Immediate
        },
    };
    let (mut driver, input_tx, mut events) = InterviewDriver::new(
        role_id,
        backend,
        Arc::new(ConsoleSpeaker::new(config.read_aloud_wpm)),
        Recorder::new(device),
        driver_config,
    );

    println!("Preparing your questions...");
    let questions = driver
        .generate_questions(resume_summary, args.topics.clone())
        .await
        .context("Failed to generate interview questions")?;

    let mut lines = console::spawn_stdin_reader();
    if args.edit {
        edit_questions(&mut driver, &mut lines).await?;
    } else {
        for (i, question) in questions.iter().enumerate() {
            println!("{}", console::describe_question(i, question));
        }
    }

    driver.start().context("Failed to start the interview")?;
    let question_count = driver.session().questions().len();
    println!("\n{}\n", HELP);

    // --- 6. Run ---
    let reader = tokio::spawn(forward_lines(lines, input_tx));
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some(line) = console::describe_event(&event, question_count) {
                println!("{}", line);
            }
        }
    });

    let report = driver.run().await?;
    reader.abort();
    if let Err(e) = printer.await {
        tracing::warn!("Event printer failed: {}", e);
    }

    match report {
        Some(report) => println!("\n{}", console::render_report(&report)),
        None => println!("Interview ended before it was evaluated."),
    }
    Ok(())
}

async fn summarize_resume(
    backend: &dyn InterviewBackend,
    path: &Path,
    role_id: &str,
) -> Option<String> {
    let pdf = match tokio::fs::read(path).await {
        Ok(pdf) => pdf,
        Err(e) => {
            println!("Could not read {}: {}. Continuing without a resume.", path.display(), e);
            return None;
        }
    };
    println!("Reading your resume...");
    match backend.resume_summary(pdf, role_id).await {
        Ok(summary) => {
            tracing::debug!("Resume summary: {}", summary);
            Some(summary)
        }
        Err(e) => {
            println!("Could not summarize the resume: {:#}. Continuing without it.", e);
            None
        }
    }
}

async fn edit_questions(
    driver: &mut InterviewDriver,
    lines: &mut mpsc::UnboundedReceiver<String>,
) -> Result<()> {
    let questions = driver.session().editing_questions().to_vec();
    for (i, question) in questions.iter().enumerate() {
        println!("{}", console::describe_question(i, question));
        println!("New text (enter to keep):");
        let Some(line) = lines.recv().await else {
            anyhow::bail!("stdin closed while editing questions");
        };
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = driver.session_mut().edit_question(i, line) {
            println!("! {}", e);
        }
    }
    Ok(())
}

async fn forward_lines(
    mut lines: mpsc::UnboundedReceiver<String>,
    input_tx: mpsc::UnboundedSender<Input>,
) {
    while let Some(line) = lines.recv().await {
        let input = match console::parse_line(&line) {
            ConsoleLine::Send(input) => input,
            ConsoleLine::Help => {
                println!("{}", HELP);
                continue;
            }
            ConsoleLine::Unknown(command) => {
                println!("Unknown command {}. Type /help for the list.", command);
                continue;
            }
            ConsoleLine::Blank => continue,
        };
        if input_tx.send(input).is_err() {
            return;
        }
    }
    // End of input ends the session.
    let _ = input_tx.send(Input::Shutdown);
}
