use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// A trait abstracting the read-aloud output.
///
/// There is a single output slot: calling `speak` while an earlier utterance is
/// still playing interrupts it, and the interrupted call returns early.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Speaker: Send + Sync {
    /// Reads `text` aloud and resolves when playback ends or is interrupted.
    async fn speak(&self, text: &str) -> Result<()>;

    /// Silences whatever is playing.
    async fn cancel(&self);
}
