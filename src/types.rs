//! Core types for upload tasks, progress and batch outcomes.
//!
//! These are the values callers observe: the progress list they render,
//! the results handed to the success callback, and the events broadcast
//! while a batch runs.

use crate::error::UploadError;
use std::path::Path;
use std::sync::Arc;

/// A payload submitted for upload, identified by a caller-chosen key
#[derive(Debug, Clone)]
pub struct FileToUpload {
    pub key: String,
    pub filename: String,
    pub payload: Arc<[u8]>,
}

impl FileToUpload {
    pub fn new(key: impl Into<String>, filename: impl Into<String>, payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            key: key.into(),
            filename: filename.into(),
            payload: payload.into(),
        }
    }

    /// Read a file from disk, using its file name as the upload filename
    pub async fn from_path(key: impl Into<String>, path: &Path) -> Result<Self, UploadError> {
        let filename = path.file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UploadError::Config(format!("Invalid filename: {}", path.display())))?
            .to_string();

        let contents = tokio::fs::read(path).await?;
        Ok(Self::new(key, filename, contents))
    }

    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// Terminal status tokens of the progress contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Pending,
    Complete,
    Error,
}

/// Either a 0-100 percentage or a status token
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ProgressValue {
    Percent(u8),
    Status(UploadStatus),
}

/// Progress entry for one task, keyed the same way as the submitted file
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UploadProgress {
    pub key: String,
    pub progress: ProgressValue,
}

/// Per-task state within one submission
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    InProgress { percent: u8 },
    Complete { url: String },
    Error { message: String },
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Complete { .. } | TaskState::Error { .. })
    }

    pub fn to_progress(&self) -> ProgressValue {
        match self {
            TaskState::Pending => ProgressValue::Status(UploadStatus::Pending),
            TaskState::InProgress { percent } => ProgressValue::Percent(*percent),
            TaskState::Complete { .. } => ProgressValue::Status(UploadStatus::Complete),
            TaskState::Error { .. } => ProgressValue::Status(UploadStatus::Error),
        }
    }
}

/// A completed upload handed to the success callback
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UploadResult {
    pub key: String,
    pub url: String,
    pub filename: String,
}

/// How a single task ended for this submission.
///
/// Cancellation is kept apart from failure: a cancelled task goes back to
/// `Pending` and may be resubmitted with the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Complete(UploadResult),
    Failed(String),
    Cancelled,
}

/// Aggregate result of one `submit_batch` call
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    Empty,
    AllSucceeded,
    PartialFailure { succeeded: usize, failed: usize },
    AllFailed,
    Cancelled { succeeded: usize, cancelled: usize },
    Rejected { reason: String },
    Faulted,
}

impl BatchOutcome {
    pub fn from_outcomes(outcomes: &[TaskOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|o| matches!(o, TaskOutcome::Complete(_))).count();
        let failed = outcomes.iter().filter(|o| matches!(o, TaskOutcome::Failed(_))).count();
        let cancelled = outcomes.len() - succeeded - failed;

        if outcomes.is_empty() {
            BatchOutcome::Empty
        } else if failed > 0 && succeeded > 0 {
            BatchOutcome::PartialFailure { succeeded, failed }
        } else if failed > 0 {
            BatchOutcome::AllFailed
        } else if cancelled > 0 {
            BatchOutcome::Cancelled { succeeded, cancelled }
        } else {
            BatchOutcome::AllSucceeded
        }
    }
}

/// Events broadcast to subscribers while batches run
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UploadEvent {
    BatchStarted { count: usize },
    Progress { key: String, percent: u8, bytes_sent: u64, total_bytes: u64 },
    TaskCompleted { key: String, url: String },
    TaskFailed { key: String, error: String },
    TaskCancelled { key: String },
    BatchFinished { outcome: BatchOutcome, finished_at: String },
}

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CoordinatorSnapshot {
    pub progress: Vec<UploadProgress>,
    pub results: Vec<UploadResult>,
    pub is_uploading: bool,
    pub error: Option<String>,
}
