use crate::config_utils::UploaderConfig;
use crate::error::UploadError;
use crate::preview::PreviewRegistry;
use crate::services::TaskRunner;
use crate::state::{lock_state, TrackingState};
use crate::transport::{CloudinaryTransport, UploadTransport};
use crate::types::{
    BatchOutcome, CoordinatorSnapshot, FileToUpload, TaskOutcome, TaskState, UploadEvent,
    UploadProgress, UploadResult,
};
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Message passed to the error callback when any task of a batch failed
pub const BATCH_FAILURE_MESSAGE: &str = "One or more files failed to upload.";

/// Message passed to the error callback when the batch itself blew up
pub const UNEXPECTED_FAULT_MESSAGE: &str =
    "An unexpected error occurred during the multiple file upload process.";

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub type SuccessCallback = Box<dyn Fn(Vec<UploadResult>) + Send + Sync>;
pub type ErrorCallback = Box<dyn Fn(String) + Send + Sync>;

/// Uploads batches of files concurrently and tracks their progress.
///
/// Results reach the caller through the success and error callbacks; both
/// fire for a batch that partially failed. `submit_batch` never returns an
/// error of its own.
pub struct UploadCoordinator {
    transport: Arc<dyn UploadTransport>,
    state: Arc<Mutex<TrackingState>>,
    previews: Arc<PreviewRegistry>,
    events: broadcast::Sender<UploadEvent>,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
}

impl UploadCoordinator {
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport,
            state: Arc::new(Mutex::new(TrackingState::new())),
            previews: Arc::new(PreviewRegistry::new()),
            events,
            on_success: None,
            on_error: None,
        }
    }

    /// Coordinator backed by the HTTP upload endpoint in `config`
    pub fn from_config(config: UploaderConfig) -> Result<Self, UploadError> {
        Ok(Self::new(Arc::new(CloudinaryTransport::new(config)?)))
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(Vec<UploadResult>) + Send + Sync + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Receive progress and completion events for all future batches
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    /// Upload every file concurrently and wait for all of them to finish
    pub async fn submit_batch(&self, files: Vec<FileToUpload>) -> BatchOutcome {
        if files.is_empty() {
            tracing::debug!("Empty batch submitted, nothing to upload");
            return BatchOutcome::Empty;
        }

        if let Some(key) = find_duplicate_key(&files) {
            let reason = UploadError::DuplicateKey(key).to_string();
            tracing::warn!(error = %reason, "Rejecting batch");
            lock_state(&self.state).set_error(reason.clone());
            self.emit_error(reason.clone());
            return BatchOutcome::Rejected { reason };
        }

        let tasks: Vec<(FileToUpload, Uuid)> = files
            .into_iter()
            .map(|file| (file, Uuid::new_v4()))
            .collect();
        let task_ids: Vec<Uuid> = tasks.iter().map(|(_, id)| *id).collect();
        let batch_id = Uuid::new_v4();

        lock_state(&self.state).begin_batch(batch_id, tasks.iter().map(|(file, id)| (file.key.clone(), *id)));

        tracing::info!(count = tasks.len(), "Uploading batch");
        let _ = self.events.send(UploadEvent::BatchStarted { count: tasks.len() });

        let runner = TaskRunner::new(
            self.transport.clone(),
            self.state.clone(),
            self.previews.clone(),
            self.events.clone(),
        );

        let batch = async {
            let uploads = tasks.into_iter().map(|(file, id)| runner.run(file, id));
            let outcomes = futures::future::join_all(uploads).await;
            self.finish_batch(batch_id, &task_ids, outcomes)
        };

        let outcome = match AssertUnwindSafe(batch).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!("Batch upload aborted by an unexpected fault");
                {
                    let mut state = lock_state(&self.state);
                    state.fail_unsettled(&task_ids, UNEXPECTED_FAULT_MESSAGE);
                    state.finish_batch(batch_id, &task_ids, Some(UNEXPECTED_FAULT_MESSAGE.to_string()));
                }
                self.emit_error(UNEXPECTED_FAULT_MESSAGE.to_string());
                BatchOutcome::Faulted
            }
        };

        let _ = self.events.send(UploadEvent::BatchFinished {
            outcome: outcome.clone(),
            finished_at: chrono::Utc::now().to_rfc3339(),
        });

        outcome
    }

    fn finish_batch(&self, batch_id: Uuid, task_ids: &[Uuid], outcomes: Vec<TaskOutcome>) -> BatchOutcome {
        let outcome = BatchOutcome::from_outcomes(&outcomes);

        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, TaskOutcome::Failed(_)))
            .count();
        let successful: Vec<UploadResult> = outcomes
            .into_iter()
            .filter_map(|o| match o {
                TaskOutcome::Complete(result) => Some(result),
                _ => None,
            })
            .collect();

        let error = (failed > 0).then(|| BATCH_FAILURE_MESSAGE.to_string());
        lock_state(&self.state).finish_batch(batch_id, task_ids, error.clone());

        tracing::info!(
            succeeded = successful.len(),
            failed,
            outcome = ?outcome,
            "Batch upload finished"
        );

        if !successful.is_empty() {
            if let Some(callback) = &self.on_success {
                callback(successful);
            }
        }

        if let Some(message) = error {
            self.emit_error(message);
        }

        outcome
    }

    fn emit_error(&self, message: String) {
        if let Some(callback) = &self.on_error {
            callback(message);
        }
    }

    /// Abort every in-flight upload and clear all tracking
    pub fn cancel_all(&self) {
        let cancelled = lock_state(&self.state).cancel_all();
        let released = self.previews.release_all();
        if cancelled > 0 || released > 0 {
            tracing::info!(cancelled, released, "Cancelled all uploads");
        }
    }

    /// Abort one in-flight upload; it goes back to `Pending`
    pub fn cancel_upload(&self, key: &str) -> bool {
        let cancelled = lock_state(&self.state).cancel(key);
        if cancelled {
            tracing::info!(key, "Cancelling upload");
        }
        cancelled
    }

    /// Clear tracking without signalling cancellation.
    ///
    /// Previews still held by failed tasks are released as well.
    pub fn reset(&self) {
        lock_state(&self.state).reset();
        let released = self.previews.release_all();
        tracing::debug!(released, "Upload tracking reset");
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        lock_state(&self.state).snapshot()
    }

    pub fn progress(&self) -> Vec<UploadProgress> {
        lock_state(&self.state).progress()
    }

    pub fn task_state(&self, key: &str) -> Option<TaskState> {
        lock_state(&self.state).task_state(key)
    }

    /// Results accumulated across batches since the last reset
    pub fn results(&self) -> Vec<UploadResult> {
        lock_state(&self.state).results().to_vec()
    }

    pub fn is_uploading(&self) -> bool {
        lock_state(&self.state).is_uploading()
    }

    pub fn error(&self) -> Option<String> {
        lock_state(&self.state).error().map(str::to_string)
    }

    /// Number of uploads holding an abort handle
    pub fn in_flight(&self) -> usize {
        lock_state(&self.state).in_flight()
    }

    pub fn pending_previews(&self) -> usize {
        self.previews.pending()
    }
}

impl Drop for UploadCoordinator {
    fn drop(&mut self) {
        self.previews.release_all();
    }
}

fn find_duplicate_key(files: &[FileToUpload]) -> Option<String> {
    let mut seen = HashSet::new();
    files
        .iter()
        .find(|f| !seen.insert(f.key.as_str()))
        .map(|f| f.key.clone())
}
