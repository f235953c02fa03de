use std::time::Duration;

use autosync_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cycle timed out after {0:?}")]
    CycleTimeout(Duration),

    #[error("unknown TASK_OVERRIDE '{0}' (expected PARITY_CHECK, EXPORT_ONCE or SYNC_ONCE)")]
    UnknownOverride(String),
}
