use anyhow::Result;
use async_trait::async_trait;
use interview_core::speech::Speaker;
use std::time::Duration;
use tokio::sync::watch;

/// Reads interviewer lines "aloud" by printing them to the terminal and holding
/// the output slot for as long as reading them would take.
///
/// Each `speak` or `cancel` advances the slot's turn; an utterance still playing
/// sees the change and returns early.
pub struct ConsoleSpeaker {
    words_per_minute: u32,
    slot: watch::Sender<u64>,
}

impl ConsoleSpeaker {
    /// `words_per_minute == 0` prints instantly.
    pub fn new(words_per_minute: u32) -> Self {
        let (slot, _) = watch::channel(0);
        Self {
            words_per_minute,
            slot,
        }
    }

    pub fn reading_time(&self, text: &str) -> Duration {
        if self.words_per_minute == 0 {
            return Duration::ZERO;
        }
        let words = text.split_whitespace().count() as f64;
        Duration::from_secs_f64(words * 60.0 / self.words_per_minute as f64)
    }
}

#[async_trait]
impl Speaker for ConsoleSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        self.slot.send_modify(|turn| *turn += 1);
        let mut slot = self.slot.subscribe();

        println!("\nInterviewer: {}\n", text);

        let duration = self.reading_time(text);
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = slot.changed() => {
                tracing::debug!("Utterance interrupted");
            }
        }
        Ok(())
    }

    async fn cancel(&self) {
        self.slot.send_modify(|turn| *turn += 1);
    }
}
