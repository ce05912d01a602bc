//! Error types shared by the API client, the aggregator and the task poller.

use thiserror::Error;

/// Errors returned by requests against the platform services.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, body read).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    /// The service rejected the bearer token; the stored session was cleared.
    #[error("session expired, run `campusctl login` again")]
    SessionExpired,

    /// The response body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Local file system failure while saving a download.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The artifact reference cannot be turned into a safe file name.
    #[error("invalid artifact name: {0:?}")]
    InvalidArtifact(String),
}

impl ApiError {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) | ApiError::Decode(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::SessionExpired | ApiError::Io(_) | ApiError::InvalidArtifact(_) => false,
        }
    }
}

/// The job could not be created; no polling takes place.
#[derive(Debug, Error)]
#[error("failed to start job: {0}")]
pub struct StartError(#[from] pub ApiError);
