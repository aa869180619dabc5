use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use interview_core::backend::SaveResultRequest;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const HEADER: [&str; 11] = [
    "timestamp",
    "role",
    "resume_summary",
    "topics",
    "overall",
    "communication",
    "technical",
    "role_fit",
    "feedback_summary",
    "qa_json",
    "feedback_json",
];

/// Append-only CSV file holding one row per finished interview.
pub struct ResultStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, result: &SaveResultRequest) -> Result<()> {
        let row = to_row(result, Utc::now())?;
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_row(&path, &row))
            .await
            .context("CSV writer task panicked")??;
        tracing::info!("Saved interview result for role '{}'", result.role);
        Ok(())
    }
}

fn to_row(result: &SaveResultRequest, at: DateTime<Utc>) -> Result<Vec<String>> {
    Ok(vec![
        at.to_rfc3339(),
        result.role.clone(),
        result.resume_summary.clone().unwrap_or_default(),
        result.topics.join(";"),
        result.scores.overall.to_string(),
        result.scores.communication.to_string(),
        result.scores.technical.to_string(),
        result.scores.role_fit.to_string(),
        result.feedback.summary.clone(),
        serde_json::to_string(&result.qa).context("Failed to serialize QA records")?,
        serde_json::to_string(&result.feedback).context("Failed to serialize feedback")?,
    ])
}

fn write_row(path: &Path, row: &[String]) -> Result<()> {
    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if is_new {
        writer.write_record(HEADER)?;
    }
    writer.write_record(row)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::record::{
        AnswerSource, ConversationTurn, Feedback, QaMeta, QaRecord, Scores,
    };
    use tempfile::tempdir;

    fn result() -> SaveResultRequest {
        SaveResultRequest {
            role: "sde".to_string(),
            resume_summary: Some("Backend engineer, \"Rust\" fan".to_string()),
            topics: vec!["caching".to_string(), "queues".to_string()],
            qa: vec![QaRecord {
                question_text: "Q1".to_string(),
                conversation: vec![
                    ConversationTurn::agent("Q1"),
                    ConversationTurn::candidate("A1, with a comma"),
                    ConversationTurn::agent("Thanks"),
                ],
                summary: "s".to_string(),
                remarks: "r".to_string(),
                score: 6.0,
                meta: QaMeta {
                    source: AnswerSource::Typed,
                },
            }],
            scores: Scores {
                communication: 7.0,
                technical: 6.0,
                role_fit: 8.0,
                overall: 7.0,
            },
            feedback: Feedback {
                summary: "Good".to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn header_is_written_once() -> Result<()> {
        let dir = tempdir()?;
        let store = ResultStore::new(dir.path().join("results.csv"));

        store.append(&result()).await?;
        store.append(&result()).await?;

        let mut reader = csv::Reader::from_path(store.path())?;
        let headers = reader.headers()?.clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), HEADER.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "sde");
        assert_eq!(&rows[0][2], "Backend engineer, \"Rust\" fan");
        assert_eq!(&rows[0][3], "caching;queues");
        assert_eq!(&rows[0][4], "7");

        let qa: Vec<QaRecord> = serde_json::from_str(&rows[1][9])?;
        assert_eq!(qa[0].conversation[1].text, "A1, with a comma");
        Ok(())
    }

    #[tokio::test]
    async fn unwritable_path_is_an_error() {
        let dir = tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("missing").join("results.csv"));
        assert!(store.append(&result()).await.is_err());
    }
}
