use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Arc, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use autosync_model::{
    Artifacts, RowCount, RunId, RunStatus, TaskCode, TaskDefinition, TaskRun,
};

use crate::{
    contract::{HeartbeatLevel, JournalStore, SyncStore},
    error::StoreError,
};

/// Store operation, used to script failures and to count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    TaskStart,
    TaskHeartbeat,
    TaskFinish,
    TaskFail,
    TaskEnabled,
    ExportDelta,
    ParityCheck,
    Ping,
}

/// One recorded store call, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    TaskStart {
        task_code: TaskCode,
        note: Option<String>,
    },
    TaskHeartbeat {
        run_id: RunId,
        level: HeartbeatLevel,
        message: String,
    },
    TaskFinish {
        run_id: RunId,
        note: Option<String>,
        rows_read: Option<RowCount>,
        artifacts: Artifacts,
    },
    TaskFail {
        run_id: RunId,
        error_message: String,
    },
    TaskEnabled {
        task_code: TaskCode,
    },
    ExportDelta {
        run_id: RunId,
    },
    ParityCheck {
        days_back: u32,
    },
    Ping,
}

impl StoreCall {
    pub fn op(&self) -> StoreOp {
        match self {
            StoreCall::TaskStart { .. } => StoreOp::TaskStart,
            StoreCall::TaskHeartbeat { .. } => StoreOp::TaskHeartbeat,
            StoreCall::TaskFinish { .. } => StoreOp::TaskFinish,
            StoreCall::TaskFail { .. } => StoreOp::TaskFail,
            StoreCall::TaskEnabled { .. } => StoreOp::TaskEnabled,
            StoreCall::ExportDelta { .. } => StoreOp::ExportDelta,
            StoreCall::ParityCheck { .. } => StoreOp::ParityCheck,
            StoreCall::Ping => StoreOp::Ping,
        }
    }
}

/// A scripted failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Surfaces as [`StoreError::Unavailable`] (transient).
    Transient(String),
    /// Surfaces as [`StoreError::Rejected`] (application error).
    Rejected(String),
}

impl Failure {
    fn into_error(self) -> StoreError {
        match self {
            Failure::Transient(msg) => StoreError::Unavailable(msg),
            Failure::Rejected(msg) => StoreError::Rejected(msg),
        }
    }
}

/// In-process store.
///
/// Journals runs with the same state machine the real store enforces, records every call,
/// and fails operations on demand.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    last_run_id: i64,
    runs: BTreeMap<RunId, TaskRun>,
    /// Every status a run has been in, in order.
    history: HashMap<RunId, Vec<RunStatus>>,
    definitions: HashMap<TaskCode, TaskDefinition>,
    calls: Vec<StoreCall>,
    /// One-shot failures, consumed front to back.
    queued: HashMap<StoreOp, VecDeque<Failure>>,
    /// Failures returned on every call.
    sticky: HashMap<StoreOp, Failure>,
    export_rows: Option<RowCount>,
    delays: HashMap<StoreOp, Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task definition; `task_start` rejects codes of disabled definitions.
    pub fn with_definition(self, definition: TaskDefinition) -> Self {
        self.inner
            .write()
            .unwrap()
            .definitions
            .insert(definition.task_code.clone(), definition);
        self
    }

    /// Row count reported by `export_delta`.
    pub fn with_export_rows(self, rows: Option<RowCount>) -> Self {
        self.inner.write().unwrap().export_rows = rows;
        self
    }

    /// Make `op` take `delay` before answering.
    pub fn with_delay(self, op: StoreOp, delay: Duration) -> Self {
        self.inner.write().unwrap().delays.insert(op, delay);
        self
    }

    /// Fail the next call of `op` once.
    pub fn fail_next(&self, op: StoreOp, failure: Failure) {
        self.inner
            .write()
            .unwrap()
            .queued
            .entry(op)
            .or_default()
            .push_back(failure);
    }

    /// Fail every call of `op` until [`MemoryStore::recover`].
    pub fn fail_always(&self, op: StoreOp, failure: Failure) {
        self.inner.write().unwrap().sticky.insert(op, failure);
    }

    /// Drop all scripted failures of `op`.
    pub fn recover(&self, op: StoreOp) {
        let mut inner = self.inner.write().unwrap();
        inner.sticky.remove(&op);
        inner.queued.remove(&op);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.read().unwrap().calls.clone()
    }

    /// Recorded operations in call order.
    pub fn ops(&self) -> Vec<StoreOp> {
        self.inner
            .read()
            .unwrap()
            .calls
            .iter()
            .map(StoreCall::op)
            .collect()
    }

    pub fn count(&self, op: StoreOp) -> usize {
        self.inner
            .read()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.op() == op)
            .count()
    }

    pub fn run(&self, run_id: RunId) -> Option<TaskRun> {
        self.inner.read().unwrap().runs.get(&run_id).cloned()
    }

    /// All runs ordered by id.
    pub fn runs(&self) -> Vec<TaskRun> {
        self.inner.read().unwrap().runs.values().cloned().collect()
    }

    /// Statuses a run went through, starting with `Running`.
    pub fn status_history(&self, run_id: RunId) -> Vec<RunStatus> {
        self.inner
            .read()
            .unwrap()
            .history
            .get(&run_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Record the call, wait out any configured delay, then apply scripted failures.
    async fn enter(&self, call: StoreCall) -> Result<(), StoreError> {
        let op = call.op();
        let delay = {
            let mut inner = self.inner.write().unwrap();
            inner.calls.push(call);
            inner.delays.get(&op).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.write().unwrap();
        if let Some(failure) = inner.queued.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(failure.into_error());
        }
        if let Some(failure) = inner.sticky.get(&op) {
            return Err(failure.clone().into_error());
        }
        Ok(())
    }

    fn close(
        &self,
        run_id: RunId,
        close: impl FnOnce(&mut TaskRun) -> Result<(), autosync_model::ModelError>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        let run = inner
            .runs
            .get_mut(&run_id)
            .ok_or(StoreError::UnknownRun(run_id))?;
        close(run).map_err(|source| StoreError::Transition { run_id, source })?;

        let status = run.status;
        inner.history.entry(run_id).or_default().push(status);
        Ok(())
    }
}

#[async_trait]
impl JournalStore for MemoryStore {
    async fn task_start(
        &self,
        task_code: &TaskCode,
        pid: &str,
        host: &str,
        note: Option<&str>,
    ) -> Result<RunId, StoreError> {
        self.enter(StoreCall::TaskStart {
            task_code: task_code.clone(),
            note: note.map(str::to_string),
        })
        .await?;

        let mut inner = self.inner.write().unwrap();
        if let Some(def) = inner.definitions.get(task_code)
            && !def.enabled
        {
            return Err(StoreError::Rejected(format!("task {task_code} is disabled")));
        }

        inner.last_run_id += 1;
        let run_id = RunId::new(inner.last_run_id);
        let run = TaskRun::start(
            run_id,
            task_code.clone(),
            pid,
            host,
            note.map(str::to_string),
        );
        inner.runs.insert(run_id, run);
        inner.history.insert(run_id, vec![RunStatus::Running]);
        Ok(run_id)
    }

    async fn task_heartbeat(
        &self,
        run_id: RunId,
        level: HeartbeatLevel,
        message: &str,
    ) -> Result<(), StoreError> {
        self.enter(StoreCall::TaskHeartbeat {
            run_id,
            level,
            message: message.to_string(),
        })
        .await?;

        let inner = self.inner.read().unwrap();
        match inner.runs.get(&run_id) {
            Some(run) if run.status == RunStatus::Running => Ok(()),
            Some(run) => Err(StoreError::Rejected(format!(
                "heartbeat on {} run {run_id}",
                run.status
            ))),
            None => Err(StoreError::UnknownRun(run_id)),
        }
    }

    async fn task_finish(
        &self,
        run_id: RunId,
        note: Option<&str>,
        rows_read: Option<RowCount>,
        artifacts: &Artifacts,
    ) -> Result<(), StoreError> {
        self.enter(StoreCall::TaskFinish {
            run_id,
            note: note.map(str::to_string),
            rows_read,
            artifacts: artifacts.clone(),
        })
        .await?;

        self.close(run_id, |run| {
            run.finish(note.map(str::to_string), rows_read, artifacts.clone())
        })
    }

    async fn task_fail(&self, run_id: RunId, error_message: &str) -> Result<(), StoreError> {
        self.enter(StoreCall::TaskFail {
            run_id,
            error_message: error_message.to_string(),
        })
        .await?;

        self.close(run_id, |run| run.fail(error_message))
    }

    async fn task_enabled(&self, task_code: &TaskCode) -> Result<Option<bool>, StoreError> {
        self.enter(StoreCall::TaskEnabled {
            task_code: task_code.clone(),
        })
        .await?;

        let inner = self.inner.read().unwrap();
        Ok(inner.definitions.get(task_code).map(|d| d.enabled))
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn export_delta(&self, task_run_id: RunId) -> Result<Option<RowCount>, StoreError> {
        self.enter(StoreCall::ExportDelta {
            run_id: task_run_id,
        })
        .await?;

        Ok(self.inner.read().unwrap().export_rows)
    }

    async fn parity_check(&self, days_back: u32) -> Result<(), StoreError> {
        self.enter(StoreCall::ParityCheck { days_back }).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.enter(StoreCall::Ping).await
    }
}
