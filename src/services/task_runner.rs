//! Single-task upload service
//!
//! Drives one file from `Pending` to its outcome: registers the abort
//! handle, holds a preview while the upload runs, races the transport
//! against cancellation and applies every state transition. A panicking
//! transport fails only its own task.

use crate::error::UploadError;
use crate::preview::PreviewRegistry;
use crate::state::{lock_state, TrackingState};
use crate::transport::{ProgressFn, UploadTransport};
use crate::types::{FileToUpload, TaskOutcome, UploadEvent, UploadResult};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Integer percentage of `sent` over `total`, rounded to nearest
pub fn percent_of(sent: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let percent = ((sent as f64 * 100.0) / total as f64).round();
    Some(percent.clamp(0.0, 100.0) as u8)
}

/// Service for running individual uploads of a batch
#[derive(Clone)]
pub struct TaskRunner {
    transport: Arc<dyn UploadTransport>,
    state: Arc<Mutex<TrackingState>>,
    previews: Arc<PreviewRegistry>,
    events: broadcast::Sender<UploadEvent>,
}

impl TaskRunner {
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        state: Arc<Mutex<TrackingState>>,
        previews: Arc<PreviewRegistry>,
        events: broadcast::Sender<UploadEvent>,
    ) -> Self {
        Self {
            transport,
            state,
            previews,
            events,
        }
    }

    /// Upload one file for the submission identified by `task_id`
    pub async fn run(&self, file: FileToUpload, task_id: Uuid) -> TaskOutcome {
        let token = CancellationToken::new();
        lock_state(&self.state).register_abort(&file.key, task_id, token.clone());
        let preview = self.previews.create(&file);

        tracing::debug!(key = %file.key, filename = %file.filename, bytes = file.size(), "Starting upload");

        let reporter = self.progress_reporter(&file.key, task_id);
        let upload = AssertUnwindSafe(self.transport.upload(&file, reporter)).catch_unwind();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(UploadError::Cancelled),
            result = upload => result.unwrap_or_else(|payload| Err(UploadError::from_panic(payload))),
        };

        match result {
            Ok(url) => self.handle_success(&file, task_id, url, &preview),
            Err(e) if e.is_cancellation() => self.handle_cancellation(&file, task_id),
            Err(e) => self.handle_failure(&file, task_id, e),
        }
    }

    fn progress_reporter(&self, key: &str, task_id: Uuid) -> ProgressFn {
        let state = self.state.clone();
        let events = self.events.clone();
        let key = key.to_string();

        Arc::new(move |sent, total| {
            let Some(percent) = percent_of(sent, total) else {
                return;
            };
            if lock_state(&state).set_progress(task_id, percent) {
                tracing::debug!(key = %key, percent, sent, total, "Upload progress");
                let _ = events.send(UploadEvent::Progress {
                    key: key.clone(),
                    percent,
                    bytes_sent: sent,
                    total_bytes: total,
                });
            }
        })
    }

    fn handle_success(&self, file: &FileToUpload, task_id: Uuid, url: String, preview: &str) -> TaskOutcome {
        let result = UploadResult {
            key: file.key.clone(),
            url,
            filename: file.filename.clone(),
        };

        if !lock_state(&self.state).complete(task_id, result.clone()) {
            // cancel_all or a newer submission took over this key
            tracing::debug!(key = %file.key, "Discarding result of superseded upload");
            return TaskOutcome::Cancelled;
        }

        self.previews.release(preview);
        tracing::info!(key = %file.key, url = %result.url, "Upload complete");
        let _ = self.events.send(UploadEvent::TaskCompleted {
            key: result.key.clone(),
            url: result.url.clone(),
        });

        TaskOutcome::Complete(result)
    }

    fn handle_cancellation(&self, file: &FileToUpload, task_id: Uuid) -> TaskOutcome {
        lock_state(&self.state).mark_cancelled(task_id);
        tracing::warn!(key = %file.key, filename = %file.filename, "Upload cancelled");
        let _ = self.events.send(UploadEvent::TaskCancelled { key: file.key.clone() });
        TaskOutcome::Cancelled
    }

    fn handle_failure(&self, file: &FileToUpload, task_id: Uuid, error: UploadError) -> TaskOutcome {
        let message = error.to_string();

        if !lock_state(&self.state).fail(task_id, &message) {
            tracing::debug!(key = %file.key, error = %message, "Ignoring failure of superseded upload");
            return TaskOutcome::Cancelled;
        }

        tracing::warn!(key = %file.key, filename = %file.filename, error = %message, "Upload failed");
        let _ = self.events.send(UploadEvent::TaskFailed {
            key: file.key.clone(),
            error: message.clone(),
        });

        TaskOutcome::Failed(message)
    }
}
