use std::{fmt, str::FromStr, time::Duration};

use tracing::{error, info};

use crate::{
    error::CoreError,
    shutdown::Shutdown,
    worker::{CycleOutcome, Job, Worker},
};

/// One-shot mode requested through `TASK_OVERRIDE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOverride {
    ParityCheck,
    ExportOnce,
    SyncOnce,
}

impl TaskOverride {
    /// Parse a raw `TASK_OVERRIDE` value: trimmed, case-insensitive, blank means none.
    pub fn parse(raw: &str) -> Result<Option<Self>, CoreError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse().map(Some)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOverride::ParityCheck => "PARITY_CHECK",
            TaskOverride::ExportOnce => "EXPORT_ONCE",
            TaskOverride::SyncOnce => "SYNC_ONCE",
        }
    }
}

impl FromStr for TaskOverride {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PARITY_CHECK" => Ok(TaskOverride::ParityCheck),
            "EXPORT_ONCE" => Ok(TaskOverride::ExportOnce),
            "SYNC_ONCE" => Ok(TaskOverride::SyncOnce),
            _ => Err(CoreError::UnknownOverride(s.to_string())),
        }
    }
}

impl fmt::Display for TaskOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the process does, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Cycle until shutdown.
    Continuous { interval: Duration },
    ParityCheck { days_back: u32 },
    ExportOnce,
    SyncOnce,
}

impl Mode {
    pub fn select(task_override: Option<TaskOverride>, interval: Duration, days_back: u32) -> Self {
        match task_override {
            None => Mode::Continuous { interval },
            Some(TaskOverride::ParityCheck) => Mode::ParityCheck { days_back },
            Some(TaskOverride::ExportOnce) => Mode::ExportOnce,
            Some(TaskOverride::SyncOnce) => Mode::SyncOnce,
        }
    }

    /// The single job of a one-shot mode; `None` for the continuous loop.
    pub fn one_shot_job(&self) -> Option<Job> {
        match *self {
            Mode::Continuous { .. } => None,
            Mode::ParityCheck { days_back } => Some(Job::ParityCheck { days_back }),
            Mode::ExportOnce => Some(Job::ExportOnce),
            Mode::SyncOnce => Some(Job::SyncOnce),
        }
    }
}

/// Process exit status of a dispatched mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Graceful shutdown of the loop, or a successful one-shot run.
    Success,
    /// A one-shot run failed.
    OverrideFailed,
}

impl ExitStatus {
    pub fn code(&self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::OverrideFailed => 2,
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}

/// Run `mode` to completion.
///
/// The loop returns [`ExitStatus::Success`] once `shutdown` triggers. A one-shot mode runs its
/// job exactly once and maps a failed or skipped run to [`ExitStatus::OverrideFailed`].
pub async fn dispatch(worker: &Worker, mode: Mode, shutdown: &Shutdown) -> ExitStatus {
    let Some(job) = mode.one_shot_job() else {
        if let Mode::Continuous { interval } = mode {
            worker.run_loop(interval, shutdown).await;
        }
        return ExitStatus::Success;
    };

    info!(job = job.label(), "running one-shot override");
    match worker.run_job(job).await {
        CycleOutcome::Succeeded { .. } => ExitStatus::Success,
        CycleOutcome::Failed { error, .. } => {
            error!(job = job.label(), error = %error, "one-shot override failed");
            ExitStatus::OverrideFailed
        }
        CycleOutcome::Skipped => ExitStatus::OverrideFailed,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use autosync_model::{RunStatus, TaskCode};
    use autosync_store::{Failure, MemoryStore, StoreCall, StoreOp};
    use tokio::time::Instant;

    use super::*;
    use crate::{engine::SyncEngine, journal::TaskJournal, retry::RetryPolicy};

    fn worker(store: &MemoryStore) -> Worker {
        let retry = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(40));
        let shared = Arc::new(store.clone());
        Worker::new(
            TaskJournal::new(shared.clone(), retry).with_identity("4242", "test-host"),
            SyncEngine::new(shared, retry),
        )
    }

    #[test]
    fn override_parsing_is_lenient_about_case_and_space() {
        assert_eq!(TaskOverride::parse("").unwrap(), None);
        assert_eq!(TaskOverride::parse("   ").unwrap(), None);
        assert_eq!(
            TaskOverride::parse(" parity_check ").unwrap(),
            Some(TaskOverride::ParityCheck)
        );
        assert_eq!(
            TaskOverride::parse("Export_Once").unwrap(),
            Some(TaskOverride::ExportOnce)
        );
        assert_eq!(
            TaskOverride::parse("SYNC_ONCE").unwrap(),
            Some(TaskOverride::SyncOnce)
        );
    }

    #[test]
    fn unknown_override_is_an_error() {
        let err = TaskOverride::parse("REBUILD").unwrap_err();
        assert!(matches!(err, CoreError::UnknownOverride(ref v) if v == "REBUILD"));
    }

    #[test]
    fn mode_selection() {
        let interval = Duration::from_secs(60);
        assert_eq!(
            Mode::select(None, interval, 30),
            Mode::Continuous { interval }
        );
        assert_eq!(
            Mode::select(Some(TaskOverride::ParityCheck), interval, 7),
            Mode::ParityCheck { days_back: 7 }
        );
        assert_eq!(
            Mode::select(Some(TaskOverride::ExportOnce), interval, 7),
            Mode::ExportOnce
        );
    }

    #[test]
    fn exit_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::OverrideFailed.code(), 2);
    }

    #[tokio::test]
    async fn parity_override_succeeds_with_lookback_in_note() {
        let store = MemoryStore::new();
        let mode = Mode::select(Some(TaskOverride::ParityCheck), Duration::from_secs(60), 7);

        let status = dispatch(&worker(&store), mode, &Shutdown::new()).await;

        assert_eq!(status, ExitStatus::Success);
        let runs = store.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].task_code, TaskCode::parity_check());
        assert_eq!(runs[0].status, RunStatus::Succeeded);
        assert!(runs[0].note.as_deref().unwrap().contains("days_back=7"));
        assert!(store.calls().contains(&StoreCall::ParityCheck { days_back: 7 }));
    }

    #[tokio::test]
    async fn parity_override_failure_exits_two() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::ParityCheck, Failure::Rejected("mismatch on 2024-01-02".into()));

        let status = dispatch(&worker(&store), Mode::ParityCheck { days_back: 30 }, &Shutdown::new()).await;

        assert_eq!(status, ExitStatus::OverrideFailed);
        assert_eq!(store.runs()[0].status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn export_once_failure_exits_two() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::ExportDelta, Failure::Transient("connection reset".into()));

        let status = dispatch(&worker(&store), Mode::ExportOnce, &Shutdown::new()).await;

        assert_eq!(status, ExitStatus::OverrideFailed);
        assert_eq!(
            store.ops(),
            vec![StoreOp::TaskStart, StoreOp::ExportDelta, StoreOp::TaskFail]
        );
    }

    #[tokio::test]
    async fn export_once_success_reports_rows() {
        let store = MemoryStore::new().with_export_rows(Some(17));

        let status = dispatch(&worker(&store), Mode::ExportOnce, &Shutdown::new()).await;

        assert_eq!(status, ExitStatus::Success);
        assert_eq!(store.runs()[0].note.as_deref(), Some("export ok (17 rows)"));
    }

    #[tokio::test]
    async fn sync_once_runs_one_cycle_and_ignores_shutdown() {
        let store = MemoryStore::new();
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let status = dispatch(&worker(&store), Mode::SyncOnce, &shutdown).await;

        assert_eq!(status, ExitStatus::Success);
        assert_eq!(store.count(StoreOp::TaskStart), 1);
        assert_eq!(store.count(StoreOp::TaskFinish), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn continuous_mode_exits_zero_on_shutdown() {
        let store = MemoryStore::new();
        store.fail_always(StoreOp::ExportDelta, Failure::Rejected("bad window".into()));
        let shutdown = Shutdown::new();
        let worker = worker(&store);

        let handle = {
            let (worker, shutdown) = (worker.clone(), shutdown.clone());
            tokio::spawn(async move {
                let mode = Mode::Continuous {
                    interval: Duration::from_secs(2),
                };
                dispatch(&worker, mode, &shutdown).await
            })
        };
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let signalled = Instant::now();
        shutdown.trigger();

        assert_eq!(handle.await.unwrap(), ExitStatus::Success);
        assert!(signalled.elapsed() <= Duration::from_secs(1));
        assert_eq!(store.count(StoreOp::TaskStart), 2);
        assert_eq!(store.count(StoreOp::TaskFail), 2);
    }
}
