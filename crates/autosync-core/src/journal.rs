use std::sync::Arc;

use autosync_model::{Artifacts, RowCount, RunId, TaskCode};
use autosync_store::{HeartbeatLevel, JournalStore, StoreError};
use tracing::{debug, instrument};

use crate::{retry::RetryPolicy, system};

/// Longest error text sent to `task_fail`, in characters.
///
/// Matches the store column width so that recording a failure cannot fail on length.
pub const ERROR_MESSAGE_LIMIT: usize = 4000;

/// Cut `message` to at most `limit` characters, on a character boundary.
pub fn truncate_message(message: &str, limit: usize) -> &str {
    match message.char_indices().nth(limit) {
        Some((idx, _)) => &message[..idx],
        None => message,
    }
}

/// Typed client for the task journal.
///
/// Every call is a single round-trip with no caching or batching: a transition is durable
/// before the caller moves on. Only the `enabled` flag read goes through the retry policy.
#[derive(Clone)]
pub struct TaskJournal {
    store: Arc<dyn JournalStore>,
    retry: RetryPolicy,
    pid: String,
    host: String,
}

impl TaskJournal {
    pub fn new(store: Arc<dyn JournalStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            pid: system::pid(),
            host: system::host().to_string(),
        }
    }

    /// Override the pid/host recorded on runs.
    pub fn with_identity(mut self, pid: impl Into<String>, host: impl Into<String>) -> Self {
        self.pid = pid.into();
        self.host = host.into();
        self
    }

    /// Register a `RUNNING` run for `task_code` under this process's pid and host.
    #[instrument(level = "debug", skip(self), fields(pid = %self.pid, host = %self.host), err)]
    pub async fn start(
        &self,
        task_code: &TaskCode,
        note: Option<&str>,
    ) -> Result<RunId, StoreError> {
        let run_id = self
            .store
            .task_start(task_code, &self.pid, &self.host, note)
            .await?;
        debug!(%run_id, "run started");
        Ok(run_id)
    }

    /// Append a marker to a running run. The caller decides whether a failure matters.
    pub async fn heartbeat(
        &self,
        run_id: RunId,
        level: HeartbeatLevel,
        message: &str,
    ) -> Result<(), StoreError> {
        self.store.task_heartbeat(run_id, level, message).await
    }

    /// `RUNNING -> SUCCEEDED`. Must be the last call on the run.
    #[instrument(level = "debug", skip(self, artifacts), err)]
    pub async fn finish(
        &self,
        run_id: RunId,
        note: Option<&str>,
        rows_read: Option<RowCount>,
        artifacts: &Artifacts,
    ) -> Result<(), StoreError> {
        self.store
            .task_finish(run_id, note, rows_read, artifacts)
            .await
    }

    /// `RUNNING -> FAILED`, with the message cut to [`ERROR_MESSAGE_LIMIT`].
    #[instrument(level = "debug", skip(self, error_message), err)]
    pub async fn fail(&self, run_id: RunId, error_message: &str) -> Result<(), StoreError> {
        let message = truncate_message(error_message, ERROR_MESSAGE_LIMIT);
        self.store.task_fail(run_id, message).await
    }

    /// Read a task definition's `enabled` flag, retrying transient faults.
    pub async fn is_enabled(&self, task_code: &TaskCode) -> Result<Option<bool>, StoreError> {
        self.retry
            .run(
                || self.store.task_enabled(task_code),
                StoreError::is_transient,
            )
            .await
    }
}
