/// Result type for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Everything a core operation can refuse with. All variants except
/// `Storage` describe caller mistakes and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Wrong participant count, duplicate or unknown users
    #[error("{0}")]
    InvalidParticipants(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    /// The caller has no threads at all
    #[error("{0}")]
    NoAccess(String),

    #[error("{0}")]
    Conflict(String),

    #[error("invalid username or password")]
    Unauthorized,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_participants(msg: impl Into<String>) -> Self {
        Self::InvalidParticipants(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
