use std::time::Duration;

use autosync_model::{ModelError, RunId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("error connecting to store: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("timed out after {0:?} connecting to store")]
    ConnectTimeout(Duration),

    #[error("store call {call} failed: {source}")]
    Query {
        call: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("store call {call} returned no row")]
    MissingRow { call: &'static str },

    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected call: {0}")]
    Rejected(String),

    #[error("unknown run {0}")]
    UnknownRun(RunId),

    #[error("run {run_id}: {source}")]
    Transition {
        run_id: RunId,
        #[source]
        source: ModelError,
    },
}

impl StoreError {
    pub(crate) fn query(call: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| StoreError::Query { call, source }
    }

    /// Returns `true` if the error is likely a transient infrastructure fault.
    ///
    /// Only these are eligible for retry:
    /// - connect timeouts and connection-level failures (I/O, TLS, pool timeout/closed);
    /// - Postgres SQLSTATEs of the connection exception class (`08xxx`), `53300` (too many connections),
    ///   `57P01..57P03` (admin shutdown, crash shutdown, starting up) and the serialization/deadlock codes `40001`, `40P01`.
    ///
    /// Application errors raised by the store routines are never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::ConnectTimeout(_) | StoreError::Unavailable(_) => true,
            StoreError::Connect(e) => is_transient_sqlx(e),
            StoreError::Query { source, .. } => is_transient_sqlx(source),
            _ => false,
        }
    }
}

fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| {
            matches!(
                code.as_ref(),
                "08000" | "08001" | "08003" | "08004" | "08006"
                    | "53300"
                    | "57P01" | "57P02" | "57P03"
                    | "40001" | "40P01"
            )
        }),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_failures_are_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = StoreError::query("task_start")(sqlx::Error::Io(io));
        assert!(err.is_transient());
        assert!(err.to_string().contains("task_start"));
    }

    #[test]
    fn timeouts_are_transient() {
        assert!(StoreError::ConnectTimeout(Duration::from_secs(30)).is_transient());
        assert!(StoreError::Unavailable("reset".into()).is_transient());
    }

    #[test]
    fn application_errors_are_not_transient() {
        assert!(!StoreError::Rejected("parity mismatch".into()).is_transient());
        assert!(!StoreError::UnknownRun(RunId::new(1)).is_transient());
        assert!(!StoreError::query("export_delta")(sqlx::Error::RowNotFound).is_transient());
        assert!(!StoreError::MissingRow { call: "task_start" }.is_transient());
    }
}
