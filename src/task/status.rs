//! Task identity and status types for long-running server jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A server-side job, identified by the id returned from its start call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    id: String,
    created_at: DateTime<Utc>,
}

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Answer of a start call.
#[derive(Debug, Clone, Deserialize)]
pub struct StartResponse {
    pub task_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Server-side state names as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireState {
    Pending,
    Processing,
    Completed,
    Error,
}

/// Status document as returned by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: WireState,
    #[serde(default)]
    pub progress: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Observed status of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskStatus {
    Pending {
        progress: u8,
        message: String,
    },
    Processing {
        progress: u8,
        message: String,
    },
    Completed {
        message: String,
        /// Reference to the produced artifact, e.g. `/uploads/enrollment/x.xlsx`.
        artifact: Option<String>,
    },
    Error {
        message: String,
        error: String,
    },
}

impl TaskStatus {
    /// `completed` and `error` end the job; nothing is polled after them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed { .. } | TaskStatus::Error { .. })
    }

    /// Progress percentage. Terminal states report 100 (completed) or 0 (error).
    pub fn progress(&self) -> u8 {
        match self {
            TaskStatus::Pending { progress, .. } | TaskStatus::Processing { progress, .. } => {
                *progress
            }
            TaskStatus::Completed { .. } => 100,
            TaskStatus::Error { .. } => 0,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            TaskStatus::Pending { message, .. }
            | TaskStatus::Processing { message, .. }
            | TaskStatus::Completed { message, .. }
            | TaskStatus::Error { message, .. } => message,
        }
    }

    pub fn artifact(&self) -> Option<&str> {
        match self {
            TaskStatus::Completed { artifact, .. } => artifact.as_deref(),
            _ => None,
        }
    }

    /// Same status with progress raised to at least `floor`. Only affects
    /// non-terminal states.
    pub(crate) fn with_progress_floor(self, floor: u8) -> Self {
        match self {
            TaskStatus::Pending { progress, message } => TaskStatus::Pending {
                progress: progress.max(floor),
                message,
            },
            TaskStatus::Processing { progress, message } => TaskStatus::Processing {
                progress: progress.max(floor),
                message,
            },
            terminal => terminal,
        }
    }
}

impl From<StatusResponse> for TaskStatus {
    fn from(resp: StatusResponse) -> Self {
        let progress = resp.progress.clamp(0, 100) as u8;
        match resp.status {
            WireState::Pending => TaskStatus::Pending {
                progress,
                message: resp.message,
            },
            WireState::Processing => TaskStatus::Processing {
                progress,
                message: resp.message,
            },
            WireState::Completed => TaskStatus::Completed {
                message: resp.message,
                artifact: resp.file_path.filter(|p| !p.is_empty()),
            },
            WireState::Error => TaskStatus::Error {
                error: resp
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| resp.message.clone()),
                message: resp.message,
            },
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending { progress, message } => {
                write!(f, "pending ({}%): {}", progress, message)
            }
            TaskStatus::Processing { progress, message } => {
                write!(f, "processing ({}%): {}", progress, message)
            }
            TaskStatus::Completed { message, artifact } => match artifact {
                Some(path) => write!(f, "completed: {} [{}]", message, path),
                None => write!(f, "completed: {}", message),
            },
            TaskStatus::Error { error, .. } => write!(f, "error: {}", error),
        }
    }
}
