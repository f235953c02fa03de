use std::fmt;

use async_trait::async_trait;
use autosync_model::{Artifacts, RowCount, RunId, TaskCode};

use crate::error::StoreError;

/// Severity attached to a heartbeat marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeartbeatLevel {
    Info,
    Warn,
}

impl HeartbeatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeartbeatLevel::Info => "INFO",
            HeartbeatLevel::Warn => "WARN",
        }
    }
}

impl fmt::Display for HeartbeatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task-audit journal kept by the store.
///
/// Every method is one round-trip and must be durable when it returns.
#[async_trait]
pub trait JournalStore: Send + Sync + 'static {
    /// Register a new `RUNNING` run and return its id.
    async fn task_start(
        &self,
        task_code: &TaskCode,
        pid: &str,
        host: &str,
        note: Option<&str>,
    ) -> Result<RunId, StoreError>;

    /// Append a liveness/log marker to a running run.
    async fn task_heartbeat(
        &self,
        run_id: RunId,
        level: HeartbeatLevel,
        message: &str,
    ) -> Result<(), StoreError>;

    /// Close a run as `SUCCEEDED`.
    async fn task_finish(
        &self,
        run_id: RunId,
        note: Option<&str>,
        rows_read: Option<RowCount>,
        artifacts: &Artifacts,
    ) -> Result<(), StoreError>;

    /// Close a run as `FAILED`.
    async fn task_fail(&self, run_id: RunId, error_message: &str) -> Result<(), StoreError>;

    /// Read the `enabled` flag of a task definition; `None` when the task is not registered.
    async fn task_enabled(&self, task_code: &TaskCode) -> Result<Option<bool>, StoreError>;
}

/// Store-side sync and reconciliation routines.
#[async_trait]
pub trait SyncStore: Send + Sync + 'static {
    /// Export the change-tracking window past the store's watermark, tagging rows with `task_run_id`.
    ///
    /// Returns the processed-row count when the store reports one.
    async fn export_delta(&self, task_run_id: RunId) -> Result<Option<RowCount>, StoreError>;

    /// Reconcile the last `days_back` days; fails on any detected inconsistency.
    async fn parity_check(&self, days_back: u32) -> Result<(), StoreError>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<(), StoreError>;
}
