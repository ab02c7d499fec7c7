/// Local validation failures of a composition. Surfaced to the caller as-is;
/// nothing here is retried.
#[derive(uniffi::Error, Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    #[error("limit of {limit} reached")]
    CapacityExceeded { limit: u32 },
    #[error("polls and media attachments cannot be combined")]
    ModeConflict,
    #[error("invalid poll: {reason}")]
    InvalidPoll { reason: String },
}

impl ComposeError {
    /// Short text for the composer toast.
    pub fn user_visible_message(&self) -> String {
        match self {
            ComposeError::CapacityExceeded { limit } => format!("You can add up to {limit}"),
            ComposeError::ModeConflict => "Remove the poll or the media first".to_string(),
            ComposeError::InvalidPoll { reason } => format!("Poll: {reason}"),
        }
    }
}
