//! Error taxonomy shared by the store, the status aggregator and the reset controller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    /// Malformed or missing input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A lookup or bulk match affected zero rows.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already closed: {0}")]
    AlreadyClosed(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StateError {
    /// Short title used in API error bodies.
    pub fn title(&self) -> &'static str {
        match self {
            StateError::Validation(_) => "Invalid request",
            StateError::NotFound(_) => "Not found",
            StateError::AlreadyClosed(_) => "Already closed",
            StateError::InvalidDuration(_) => "Invalid duration format",
            StateError::Persistence(_) | StateError::Io(_) => "Storage failure",
        }
    }

    /// True for failures the caller cannot fix by changing the request.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, StateError::Persistence(_) | StateError::Io(_))
    }
}

pub type StateResult<T> = Result<T, StateError>;
