//! Error types for the story engine.

use thiserror::Error;

/// Errors that abort a turn.
#[derive(Debug, Error)]
pub enum StoryError {
    /// Model reply content was missing or not text.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Textual reply did not decode into the expected story shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Failures talking to the model or image backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Client error: {0}")]
    Client(#[from] openai::Error),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Failures of a storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Refusing to persist a segment without an id")]
    PendingId,

    #[error("Game instructions were already saved")]
    InstructionsAlreadySaved,

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Result type for turn operations.
pub type StoryResult<T> = std::result::Result<T, StoryError>;
