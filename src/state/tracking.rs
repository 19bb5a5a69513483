//! Task list, accumulated results and abort handles for the coordinator.
//!
//! Every mutation is addressed by the submission id of the task, not its key.
//! A key can be resubmitted while an older submission is still winding down,
//! and the older one must not touch the newer task's state. Batches may
//! overlap: starting a batch only supersedes earlier tasks with the same key
//! or tasks that already settled.

use crate::types::{CoordinatorSnapshot, TaskState, UploadProgress, UploadResult};
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct TrackedTask {
    key: String,
    task_id: Uuid,
    state: TaskState,
    /// Set once the submission has an outcome, including cancellation
    settled: bool,
}

#[derive(Debug)]
struct AbortEntry {
    key: String,
    token: CancellationToken,
}

#[derive(Debug, Default)]
pub struct TrackingState {
    tasks: Vec<TrackedTask>,
    results: Vec<UploadResult>,
    abort_handles: HashMap<Uuid, AbortEntry>,
    active_batches: HashSet<Uuid>,
    error: Option<String>,
}

impl TrackingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a batch with one `Pending` entry per submitted task.
    ///
    /// Settled entries from earlier batches are dropped, as are entries whose
    /// key is resubmitted here. Unsettled tasks of other running batches stay.
    pub fn begin_batch<I>(&mut self, batch_id: Uuid, tasks: I)
    where
        I: IntoIterator<Item = (String, Uuid)>,
    {
        let incoming: Vec<TrackedTask> = tasks
            .into_iter()
            .map(|(key, task_id)| TrackedTask {
                key,
                task_id,
                state: TaskState::Pending,
                settled: false,
            })
            .collect();

        let keys: HashSet<&str> = incoming.iter().map(|t| t.key.as_str()).collect();
        self.tasks.retain(|t| !t.settled && !keys.contains(t.key.as_str()));
        self.tasks.extend(incoming);

        self.active_batches.insert(batch_id);
        self.error = None;
    }

    pub fn register_abort(&mut self, key: &str, task_id: Uuid, token: CancellationToken) {
        self.abort_handles.insert(task_id, AbortEntry { key: key.to_string(), token });
    }

    /// The task for `task_id`, if it is still tracked and has no outcome yet
    fn open_task(&mut self, task_id: Uuid) -> Option<&mut TrackedTask> {
        self.tasks
            .iter_mut()
            .find(|t| t.task_id == task_id && !t.settled)
    }

    /// Apply a progress percentage. Never moves a task backwards and never
    /// touches a task that already settled.
    pub fn set_progress(&mut self, task_id: Uuid, percent: u8) -> bool {
        let percent = percent.min(100);
        let Some(task) = self.open_task(task_id) else {
            return false;
        };

        match task.state {
            TaskState::Pending => {}
            TaskState::InProgress { percent: current } if percent > current => {}
            _ => return false,
        }
        task.state = TaskState::InProgress { percent };
        true
    }

    /// Mark a task complete and record its result.
    ///
    /// Returns false if the task is no longer tracked (cancelled or superseded).
    pub fn complete(&mut self, task_id: Uuid, result: UploadResult) -> bool {
        let Some(task) = self.open_task(task_id) else {
            return false;
        };

        task.state = TaskState::Complete { url: result.url.clone() };
        task.settled = true;
        self.results.push(result);
        self.abort_handles.remove(&task_id);
        true
    }

    pub fn fail(&mut self, task_id: Uuid, message: &str) -> bool {
        let Some(task) = self.open_task(task_id) else {
            return false;
        };

        task.state = TaskState::Error { message: message.to_string() };
        task.settled = true;
        self.abort_handles.remove(&task_id);
        true
    }

    /// Put a cancelled task back to `Pending` so it can be resubmitted
    pub fn mark_cancelled(&mut self, task_id: Uuid) -> bool {
        let Some(task) = self.open_task(task_id) else {
            return false;
        };

        task.state = TaskState::Pending;
        task.settled = true;
        self.abort_handles.remove(&task_id);
        true
    }

    /// Fail every task of a batch that has no outcome yet.
    ///
    /// Returns how many tasks were failed.
    pub fn fail_unsettled(&mut self, task_ids: &[Uuid], message: &str) -> usize {
        task_ids
            .iter()
            .filter(|id| self.fail(**id, message))
            .count()
    }

    /// Close out a batch: drop its leftover abort handles and record the error
    pub fn finish_batch(&mut self, batch_id: Uuid, task_ids: &[Uuid], error: Option<String>) {
        self.abort_handles.retain(|task_id, _| !task_ids.contains(task_id));
        self.active_batches.remove(&batch_id);
        if error.is_some() {
            self.error = error;
        }
    }

    /// Record an error that doesn't belong to a running batch
    pub fn set_error(&mut self, error: String) {
        self.error = Some(error);
    }

    /// Signal every abort handle and clear all tracking.
    ///
    /// Returns the number of handles that were signalled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.abort_handles.len();
        for (_, entry) in self.abort_handles.drain() {
            entry.token.cancel();
        }
        self.reset();
        count
    }

    /// Signal the abort handles of every running submission of `key`
    pub fn cancel(&mut self, key: &str) -> bool {
        let mut found = false;
        for entry in self.abort_handles.values().filter(|e| e.key == key) {
            entry.token.cancel();
            found = true;
        }
        found
    }

    /// Clear tasks, results and error without signalling anything.
    ///
    /// Running uploads keep their abort handles but their outcomes are no
    /// longer recorded.
    pub fn reset(&mut self) {
        self.tasks.clear();
        self.results.clear();
        self.active_batches.clear();
        self.error = None;
    }

    pub fn task_state(&self, key: &str) -> Option<TaskState> {
        self.tasks
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.state.clone())
    }

    pub fn progress(&self) -> Vec<UploadProgress> {
        self.tasks
            .iter()
            .map(|t| UploadProgress {
                key: t.key.clone(),
                progress: t.state.to_progress(),
            })
            .collect()
    }

    pub fn results(&self) -> &[UploadResult] {
        &self.results
    }

    pub fn in_flight(&self) -> usize {
        self.abort_handles.len()
    }

    /// True while any batch started since the last reset is still running
    pub fn is_uploading(&self) -> bool {
        !self.active_batches.is_empty()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            progress: self.progress(),
            results: self.results.clone(),
            is_uploading: self.is_uploading(),
            error: self.error.clone(),
        }
    }
}
