/// Errors surfaced by the interview turn cycle.
///
/// None of these are fatal: input and network errors return the turn to
/// listening so the candidate can retry, validation errors block a transition
/// without touching state, and persistence errors are reported alongside
/// results that were already computed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TurnError {
    #[error("{0}")]
    RecoverableInput(String),
    #[error("Network error: {0}")]
    RecoverableNetwork(String),
    #[error("Invalid interview setup: {0}")]
    Validation(String),
    #[error("Failed to save interview result: {0}")]
    Persistence(String),
}

impl TurnError {
    /// True when the candidate can retry within the same question.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TurnError::RecoverableInput(_) | TurnError::RecoverableNetwork(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("Audio capture device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Audio capture failed: {0}")]
    Capture(String),
}
