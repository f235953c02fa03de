use std::time::Duration;

use autosync_model::{Artifacts, RowCount, RunId, TaskCode};
use autosync_store::HeartbeatLevel;
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    engine::SyncEngine,
    error::CoreError,
    journal::{ERROR_MESSAGE_LIMIT, TaskJournal, truncate_message},
    shutdown::Shutdown,
};

/// One journaled unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// A continuous-loop cycle.
    LoopCycle,
    /// `EXPORT_ONCE` override.
    ExportOnce,
    /// `SYNC_ONCE` override.
    SyncOnce,
    /// `PARITY_CHECK` override.
    ParityCheck { days_back: u32 },
}

impl Job {
    pub fn task_code(&self) -> TaskCode {
        match self {
            Job::ParityCheck { .. } => TaskCode::parity_check(),
            _ => TaskCode::auto_sync_flat(),
        }
    }

    /// Value of `mode` in the run artifacts.
    pub fn label(&self) -> &'static str {
        match self {
            Job::LoopCycle => "loop",
            Job::ExportOnce => "export_once",
            Job::SyncOnce => "sync_once",
            Job::ParityCheck { .. } => "parity_check",
        }
    }

    pub fn start_note(&self) -> String {
        match self {
            Job::LoopCycle => "ct-cycle".to_string(),
            Job::ExportOnce => "one-shot export".to_string(),
            Job::SyncOnce => "single-cycle".to_string(),
            Job::ParityCheck { days_back } => format!("days_back={days_back}"),
        }
    }

    pub fn finish_note(&self, rows: Option<RowCount>) -> String {
        match (self, rows) {
            (Job::LoopCycle, _) => "cycle ok".to_string(),
            (Job::ExportOnce, Some(n)) => format!("export ok ({n} rows)"),
            (Job::ExportOnce, None) => "export ok".to_string(),
            (Job::SyncOnce, _) => "single-cycle ok".to_string(),
            (Job::ParityCheck { days_back }, _) => format!("parity ok (days_back={days_back})"),
        }
    }

    pub fn artifacts(&self, rows: Option<RowCount>) -> Artifacts {
        match self {
            Job::ParityCheck { days_back } => json!({
                "mode": self.label(),
                "rows_processed": rows,
                "days_back": days_back,
            }),
            _ => json!({
                "mode": self.label(),
                "rows_processed": rows,
            }),
        }
    }

    fn is_delta(&self) -> bool {
        !matches!(self, Job::ParityCheck { .. })
    }
}

/// How a job ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Work done and the run closed as `SUCCEEDED`.
    Succeeded {
        run_id: RunId,
        rows: Option<RowCount>,
    },
    /// The work, or a journal write, failed. `run_id` is `None` when `start` itself failed.
    Failed {
        run_id: Option<RunId>,
        error: CoreError,
    },
    /// The task definition is disabled; nothing was journaled.
    Skipped,
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Succeeded { .. })
    }
}

/// Runs jobs under the task journal, one at a time.
#[derive(Clone)]
pub struct Worker {
    journal: TaskJournal,
    engine: SyncEngine,
    cycle_timeout: Option<Duration>,
}

impl Worker {
    pub fn new(journal: TaskJournal, engine: SyncEngine) -> Self {
        Self {
            journal,
            engine,
            cycle_timeout: None,
        }
    }

    /// Bound the work of each job; `None` or zero waits indefinitely.
    pub fn with_cycle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.cycle_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// `start` → work → `finish`, or `fail` with the error text.
    ///
    /// Errors from the work are caught here exactly once. A failed `finish` or `fail` write is
    /// logged and never re-runs the work.
    pub async fn run_job(&self, job: Job) -> CycleOutcome {
        let task_code = job.task_code();
        let start_note = job.start_note();

        let run_id = match self.journal.start(&task_code, Some(&start_note)).await {
            Ok(run_id) => run_id,
            Err(e) => {
                error!(%task_code, job = job.label(), error = %e, "journal start failed, run skipped");
                return CycleOutcome::Failed {
                    run_id: None,
                    error: e.into(),
                };
            }
        };
        info!(%task_code, %run_id, job = job.label(), note = %start_note, "run started");

        match self.work(job, run_id).await {
            Ok(rows) => {
                if job.is_delta() {
                    self.report_rows(run_id, rows).await;
                }
                let note = job.finish_note(rows);
                let artifacts = job.artifacts(rows);
                match self
                    .journal
                    .finish(run_id, Some(&note), rows, &artifacts)
                    .await
                {
                    Ok(()) => {
                        info!(%task_code, %run_id, ?rows, note = %note, "run succeeded");
                        CycleOutcome::Succeeded { run_id, rows }
                    }
                    Err(e) => {
                        error!(%task_code, %run_id, error = %e, "journal finish failed after successful work");
                        CycleOutcome::Failed {
                            run_id: Some(run_id),
                            error: e.into(),
                        }
                    }
                }
            }
            Err(e) => {
                let message = e.to_string();
                error!(
                    %task_code,
                    %run_id,
                    error = truncate_message(&message, ERROR_MESSAGE_LIMIT),
                    "run failed"
                );
                if let Err(fail_err) = self.journal.fail(run_id, &message).await {
                    error!(%task_code, %run_id, error = %fail_err, "journal fail write failed");
                }
                CycleOutcome::Failed {
                    run_id: Some(run_id),
                    error: e,
                }
            }
        }
    }

    /// One continuous-loop cycle, skipped when the task definition is disabled.
    ///
    /// An unknown task or an unreadable flag runs the cycle anyway; `task_start` has the final say.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let task_code = TaskCode::auto_sync_flat();
        match self.journal.is_enabled(&task_code).await {
            Ok(Some(false)) => {
                info!(%task_code, "task disabled, cycle skipped");
                return CycleOutcome::Skipped;
            }
            Ok(_) => {}
            Err(e) => warn!(%task_code, error = %e, "could not read enabled flag, running cycle"),
        }
        self.run_job(Job::LoopCycle).await
    }

    /// Cycle every `interval` until `shutdown` triggers.
    ///
    /// A cycle in flight always completes; the flag is checked before each cycle and during the
    /// sleep. Cycle failures never end the loop.
    pub async fn run_loop(&self, interval: Duration, shutdown: &Shutdown) {
        info!(interval_secs = interval.as_secs(), "continuous sync loop started");
        while !shutdown.is_triggered() {
            self.run_cycle().await;
            if !shutdown.sleep(interval).await {
                break;
            }
        }
        info!("continuous sync loop stopped");
    }

    async fn work(&self, job: Job, run_id: RunId) -> Result<Option<RowCount>, CoreError> {
        let work = async {
            match job {
                Job::ParityCheck { days_back } => {
                    self.engine.run_parity_check(days_back).await.map(|()| None)
                }
                _ => self.engine.run_delta_cycle(run_id).await,
            }
        };

        match self.cycle_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(res) => Ok(res?),
                Err(_) => Err(CoreError::CycleTimeout(limit)),
            },
            None => Ok(work.await?),
        }
    }

    async fn report_rows(&self, run_id: RunId, rows: Option<RowCount>) {
        let (level, message) = match rows {
            Some(n) => (HeartbeatLevel::Info, format!("export returned {n} rows")),
            None => (HeartbeatLevel::Warn, "export returned no row count".to_string()),
        };
        if let Err(e) = self.journal.heartbeat(run_id, level, &message).await
        {
            warn!(%run_id, error = %e, "heartbeat failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use autosync_model::{RunStatus, TaskDefinition};
    use autosync_store::{Failure, MemoryStore, StoreCall, StoreOp};
    use tokio::time::Instant;

    use super::*;
    use crate::retry::RetryPolicy;

    fn worker(store: &MemoryStore) -> Worker {
        let retry = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(40));
        let shared = Arc::new(store.clone());
        Worker::new(
            TaskJournal::new(shared.clone(), retry).with_identity("4242", "test-host"),
            SyncEngine::new(shared, retry),
        )
    }

    /// Journal calls only, without the enabled-flag reads.
    fn journal_ops(store: &MemoryStore) -> Vec<StoreOp> {
        store
            .ops()
            .into_iter()
            .filter(|op| *op != StoreOp::TaskEnabled)
            .collect()
    }

    #[test]
    fn notes_follow_job_kind() {
        assert_eq!(Job::LoopCycle.start_note(), "ct-cycle");
        assert_eq!(Job::ExportOnce.start_note(), "one-shot export");
        assert_eq!(Job::SyncOnce.start_note(), "single-cycle");
        assert_eq!(Job::ParityCheck { days_back: 7 }.start_note(), "days_back=7");

        assert_eq!(Job::ExportOnce.finish_note(Some(12)), "export ok (12 rows)");
        assert_eq!(Job::ExportOnce.finish_note(None), "export ok");
        assert_eq!(Job::SyncOnce.finish_note(Some(1)), "single-cycle ok");
        assert_eq!(
            Job::ParityCheck { days_back: 7 }.finish_note(None),
            "parity ok (days_back=7)"
        );
    }

    #[test]
    fn parity_artifacts_carry_lookback() {
        let artifacts = Job::ParityCheck { days_back: 30 }.artifacts(None);
        assert_eq!(artifacts["mode"], "parity_check");
        assert_eq!(artifacts["days_back"], 30);
        assert!(artifacts["rows_processed"].is_null());

        let artifacts = Job::LoopCycle.artifacts(Some(5));
        assert_eq!(artifacts["rows_processed"], 5);
        assert!(artifacts.get("days_back").is_none());
    }

    #[tokio::test]
    async fn successful_cycle_starts_then_finishes() {
        let store = MemoryStore::new().with_export_rows(Some(5));
        let outcome = worker(&store).run_cycle().await;

        assert!(outcome.is_success());
        assert_eq!(
            journal_ops(&store),
            vec![
                StoreOp::TaskStart,
                StoreOp::ExportDelta,
                StoreOp::TaskHeartbeat,
                StoreOp::TaskFinish
            ]
        );
        assert_eq!(store.count(StoreOp::TaskFail), 0);

        let run = &store.runs()[0];
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.note.as_deref(), Some("cycle ok"));
        assert_eq!(run.rows_read, Some(5));
        assert!(store.calls().contains(&StoreCall::TaskHeartbeat {
            run_id: run.run_id,
            level: HeartbeatLevel::Info,
            message: "export returned 5 rows".to_string(),
        }));
        assert_eq!(
            store.status_history(run.run_id),
            vec![RunStatus::Running, RunStatus::Succeeded]
        );
    }

    #[tokio::test]
    async fn missing_row_count_is_a_warning_heartbeat() {
        let store = MemoryStore::new().with_export_rows(None);
        let outcome = worker(&store).run_cycle().await;

        assert!(outcome.is_success());
        let run_id = store.runs()[0].run_id;
        assert!(store.calls().contains(&StoreCall::TaskHeartbeat {
            run_id,
            level: HeartbeatLevel::Warn,
            message: "export returned no row count".to_string(),
        }));
    }

    #[tokio::test]
    async fn export_is_tagged_with_the_started_run() {
        let store = MemoryStore::new();
        let CycleOutcome::Succeeded { run_id, .. } = worker(&store).run_job(Job::SyncOnce).await
        else {
            panic!("expected success");
        };

        assert!(
            store
                .calls()
                .contains(&StoreCall::ExportDelta { run_id })
        );
        assert_eq!(
            store.run(run_id).unwrap().note.as_deref(),
            Some("single-cycle ok")
        );
    }

    #[tokio::test]
    async fn failed_export_fails_the_run() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::ExportDelta, Failure::Rejected("bad window".into()));

        let outcome = worker(&store).run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Failed { run_id: Some(_), .. }));
        assert_eq!(
            journal_ops(&store),
            vec![StoreOp::TaskStart, StoreOp::ExportDelta, StoreOp::TaskFail]
        );
        let run = &store.runs()[0];
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("store rejected call: bad window"));
    }

    #[tokio::test]
    async fn failed_start_skips_the_work() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::TaskStart, Failure::Transient("connection reset".into()));

        let outcome = worker(&store).run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Failed { run_id: None, .. }));
        assert_eq!(journal_ops(&store), vec![StoreOp::TaskStart]);
        assert!(store.runs().is_empty());
    }

    #[tokio::test]
    async fn failed_finish_does_not_fail_or_rerun() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::TaskFinish, Failure::Transient("connection reset".into()));

        let outcome = worker(&store).run_job(Job::ExportOnce).await;

        assert!(!outcome.is_success());
        assert_eq!(store.count(StoreOp::ExportDelta), 1);
        assert_eq!(store.count(StoreOp::TaskFail), 0);
        assert_eq!(store.runs()[0].status, RunStatus::Running);
    }

    #[tokio::test]
    async fn heartbeat_failure_does_not_fail_the_run() {
        let store = MemoryStore::new();
        store.fail_always(StoreOp::TaskHeartbeat, Failure::Transient("timeout".into()));

        let outcome = worker(&store).run_job(Job::ExportOnce).await;

        assert!(outcome.is_success());
        assert_eq!(store.runs()[0].status, RunStatus::Succeeded);
    }

    #[tokio::test]
    async fn long_errors_are_truncated_in_the_journal() {
        let store = MemoryStore::new();
        let long = "e".repeat(ERROR_MESSAGE_LIMIT * 2);
        store.fail_next(StoreOp::ExportDelta, Failure::Rejected(long));

        worker(&store).run_job(Job::ExportOnce).await;

        let message = store.runs()[0].error_message.clone().unwrap();
        assert_eq!(message.chars().count(), ERROR_MESSAGE_LIMIT);
    }

    #[tokio::test]
    async fn disabled_task_skips_cycle_without_journal_entry() {
        let store = MemoryStore::new().with_definition(
            TaskDefinition::new(TaskCode::auto_sync_flat(), "Auto sync").disabled(),
        );

        let outcome = worker(&store).run_cycle().await;

        assert!(matches!(outcome, CycleOutcome::Skipped));
        assert_eq!(store.ops(), vec![StoreOp::TaskEnabled]);
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_enabled_flag_still_runs_cycle() {
        let store = MemoryStore::new();
        store.fail_always(StoreOp::TaskEnabled, Failure::Transient("timeout".into()));

        let outcome = worker(&store).run_cycle().await;

        assert!(outcome.is_success());
        assert_eq!(store.count(StoreOp::TaskEnabled), 3);
        assert_eq!(store.count(StoreOp::TaskFinish), 1);
    }

    #[tokio::test]
    async fn parity_job_journals_under_its_own_code() {
        let store = MemoryStore::new();
        let outcome = worker(&store).run_job(Job::ParityCheck { days_back: 7 }).await;

        assert!(outcome.is_success());
        assert!(
            store
                .calls()
                .contains(&StoreCall::ParityCheck { days_back: 7 })
        );
        assert_eq!(store.count(StoreOp::TaskHeartbeat), 0);
        let run = &store.runs()[0];
        assert_eq!(run.task_code, TaskCode::parity_check());
        assert!(run.note.as_deref().unwrap().contains("days_back=7"));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_work_fails_on_timeout() {
        let store = MemoryStore::new().with_delay(StoreOp::ExportDelta, Duration::from_secs(600));
        let worker = worker(&store).with_cycle_timeout(Some(Duration::from_secs(5)));

        let outcome = worker.run_job(Job::LoopCycle).await;

        assert!(matches!(
            outcome,
            CycleOutcome::Failed {
                error: CoreError::CycleTimeout(_),
                ..
            }
        ));
        let run = &store.runs()[0];
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("cycle timed out after 5s"));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_failed_cycle() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::ExportDelta, Failure::Rejected("bad window".into()));
        let worker = worker(&store);
        let shutdown = Shutdown::new();

        let handle = {
            let (worker, shutdown) = (worker.clone(), shutdown.clone());
            tokio::spawn(async move { worker.run_loop(Duration::from_secs(2), &shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown.trigger();
        handle.await.unwrap();

        let statuses: Vec<RunStatus> = store.runs().iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![RunStatus::Failed, RunStatus::Succeeded]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_mid_sleep_stops_without_new_cycle() {
        let store = MemoryStore::new();
        let worker = worker(&store);
        let shutdown = Shutdown::new();

        let handle = {
            let (worker, shutdown) = (worker.clone(), shutdown.clone());
            tokio::spawn(async move { worker.run_loop(Duration::from_secs(2), &shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;

        let signalled = Instant::now();
        shutdown.trigger();
        handle.await.unwrap();

        assert!(signalled.elapsed() <= Duration::from_secs(1));
        assert_eq!(store.count(StoreOp::TaskStart), 1);
        assert_eq!(store.runs()[0].status, RunStatus::Succeeded);
    }

    #[tokio::test]
    async fn triggered_shutdown_prevents_first_cycle() {
        let store = MemoryStore::new();
        let shutdown = Shutdown::new();
        shutdown.trigger();

        worker(&store)
            .run_loop(Duration::from_secs(60), &shutdown)
            .await;

        assert!(store.calls().is_empty());
    }
}
