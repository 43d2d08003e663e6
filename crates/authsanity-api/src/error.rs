//! Error types.

use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by the orchestrator and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// Setup is incomplete: a collaborator is missing, a secret is absent,
    /// or an option did not parse.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The verification backend refused a principal or ticket.
    #[error("validation error: {0}")]
    Validation(String),

    /// Any other failure raised by a verification backend.
    #[error("verification backend error: {0}")]
    Backend(String),

    /// The session facility could not be used.
    #[error("session error: {0}")]
    Session(String),

    /// JSON encoding error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
