mod conn;
pub use conn::PgStoreConfig;

use std::time::Duration;

use async_trait::async_trait;
use autosync_model::{Artifacts, RowCount, RunId, TaskCode};
use sqlx::{Row as _, postgres::{PgConnectOptions, PgRow}, types::Json};
use tracing::{instrument, trace};

use self::conn::DbConn;
use crate::{
    contract::{HeartbeatLevel, JournalStore, SyncStore},
    error::StoreError,
};

const SQL_TASK_START: &str = "SELECT system.sp_task_start($1, $2, $3, $4)";
const SQL_TASK_HEARTBEAT: &str = "SELECT system.sp_task_heartbeat($1, $2, $3)";
const SQL_TASK_FINISH: &str = "SELECT system.sp_task_finish($1, $2, $3, $4)";
const SQL_TASK_FAIL: &str = "SELECT system.sp_task_fail($1, $2)";
const SQL_TASK_ENABLED: &str = "SELECT enabled FROM system.task_definitions WHERE task_code = $1";
const SQL_EXPORT_DELTA: &str = "SELECT * FROM system.sp_task_export_flat_delta($1)";
const SQL_PARITY_CHECK: &str = "SELECT dbo.sp_parity_flat_vs_crosstab($1)";
const SQL_PING: &str = "SELECT 1";

/// Postgres-backed store.
///
/// Holds no connection between calls: each call opens its own connection, runs one statement and closes it.
#[derive(Clone)]
pub struct PgStore {
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl PgStore {
    pub fn new(cfg: &PgStoreConfig) -> Result<Self, StoreError> {
        Ok(Self {
            options: cfg.connect_options()?,
            connect_timeout: cfg.connect_timeout,
        })
    }

    async fn conn(&self) -> Result<DbConn, StoreError> {
        DbConn::connect(&self.options, self.connect_timeout).await
    }
}

#[async_trait]
impl JournalStore for PgStore {
    #[instrument(level = "debug", skip(self), err)]
    async fn task_start(
        &self,
        task_code: &TaskCode,
        pid: &str,
        host: &str,
        note: Option<&str>,
    ) -> Result<RunId, StoreError> {
        let mut conn = self.conn().await?;
        let row = sqlx::query(SQL_TASK_START)
            .bind(task_code.as_str())
            .bind(pid)
            .bind(host)
            .bind(note)
            .fetch_optional(&mut *conn)
            .await
            .map_err(StoreError::query("task_start"));
        conn.release().await;

        let row = row?.ok_or(StoreError::MissingRow { call: "task_start" })?;
        let run_id: Option<i64> = row
            .try_get(0)
            .map_err(StoreError::query("task_start"))?;
        run_id
            .map(RunId::new)
            .ok_or(StoreError::MissingRow { call: "task_start" })
    }

    #[instrument(level = "debug", skip(self, message), err)]
    async fn task_heartbeat(
        &self,
        run_id: RunId,
        level: HeartbeatLevel,
        message: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let res = sqlx::query(SQL_TASK_HEARTBEAT)
            .bind(run_id.get())
            .bind(level.as_str())
            .bind(message)
            .execute(&mut *conn)
            .await
            .map_err(StoreError::query("task_heartbeat"));
        conn.release().await;
        res.map(|_| ())
    }

    #[instrument(level = "debug", skip(self, artifacts), err)]
    async fn task_finish(
        &self,
        run_id: RunId,
        note: Option<&str>,
        rows_read: Option<RowCount>,
        artifacts: &Artifacts,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let res = sqlx::query(SQL_TASK_FINISH)
            .bind(run_id.get())
            .bind(note)
            .bind(rows_read)
            .bind(Json(artifacts))
            .execute(&mut *conn)
            .await
            .map_err(StoreError::query("task_finish"));
        conn.release().await;
        res.map(|_| ())
    }

    #[instrument(level = "debug", skip(self, error_message), err)]
    async fn task_fail(&self, run_id: RunId, error_message: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let res = sqlx::query(SQL_TASK_FAIL)
            .bind(run_id.get())
            .bind(error_message)
            .execute(&mut *conn)
            .await
            .map_err(StoreError::query("task_fail"));
        conn.release().await;
        res.map(|_| ())
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn task_enabled(&self, task_code: &TaskCode) -> Result<Option<bool>, StoreError> {
        let mut conn = self.conn().await?;
        let row = sqlx::query(SQL_TASK_ENABLED)
            .bind(task_code.as_str())
            .fetch_optional(&mut *conn)
            .await
            .map_err(StoreError::query("task_enabled"));
        conn.release().await;

        match row? {
            Some(row) => row
                .try_get::<Option<bool>, _>(0)
                .map_err(StoreError::query("task_enabled")),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SyncStore for PgStore {
    #[instrument(level = "debug", skip(self), err)]
    async fn export_delta(&self, task_run_id: RunId) -> Result<Option<RowCount>, StoreError> {
        let mut conn = self.conn().await?;
        let rows = sqlx::query(SQL_EXPORT_DELTA)
            .bind(task_run_id.get())
            .fetch_all(&mut *conn)
            .await
            .map_err(StoreError::query("export_delta"));
        conn.release().await;

        let rows = rows?;
        trace!(result_rows = rows.len(), "export_delta returned");
        Ok(rows.first().and_then(leading_count))
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn parity_check(&self, days_back: u32) -> Result<(), StoreError> {
        let days_back = i32::try_from(days_back)
            .map_err(|_| StoreError::InvalidConfig(format!("days_back {days_back} out of range")))?;

        let mut conn = self.conn().await?;
        let res = sqlx::query(SQL_PARITY_CHECK)
            .bind(days_back)
            .execute(&mut *conn)
            .await
            .map_err(StoreError::query("parity_check"));
        conn.release().await;
        res.map(|_| ())
    }

    #[instrument(level = "trace", skip(self), err)]
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let res = sqlx::query(SQL_PING)
            .execute(&mut *conn)
            .await
            .map_err(StoreError::query("ping"));
        conn.release().await;
        res.map(|_| ())
    }
}

/// Row count reported by the export routine: the first column of the first row, when it is an integer.
fn leading_count(row: &PgRow) -> Option<RowCount> {
    row.try_get::<Option<i64>, _>(0)
        .ok()
        .flatten()
        .or_else(|| row.try_get::<Option<i32>, _>(0).ok().flatten().map(i64::from))
}
