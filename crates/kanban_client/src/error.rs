use thiserror::Error;

pub const REASON_REQUIRED: &str = "reason is required";
pub const TRANSITION_REASON_FAILED: &str = "failed to add transition reason";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("{0}")]
    ValidationFailed(String),
    #[error("failed to move card: {0}")]
    TransitionMoveFailed(String),
    #[error("failed to add transition reason: {0}")]
    TransitionCommentFailed(String),
    #[error("failed to add transition reason: {comment}; rollback to Review failed: {rollback}")]
    RollbackFailed { comment: String, rollback: String },
    #[error("project stream failed: {0}")]
    NotificationStream(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BoardError {
    pub fn remote(context: impl std::fmt::Display, err: anyhow::Error) -> Self {
        Self::RemoteUnavailable(format!("{context}: {err:#}"))
    }

    /// Text shown to the user. Comment failures keep a fixed message whether
    /// or not the compensating move succeeded.
    pub fn user_message(&self) -> String {
        match self {
            Self::TransitionCommentFailed(_) | Self::RollbackFailed { .. } => {
                TRANSITION_REASON_FAILED.to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type BoardResult<T> = std::result::Result<T, BoardError>;
