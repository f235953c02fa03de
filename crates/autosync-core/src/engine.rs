use std::sync::Arc;

use autosync_model::{RowCount, RunId};
use autosync_store::{StoreError, SyncStore};
use tracing::{debug, instrument};

use crate::retry::RetryPolicy;

/// Drives the store-side delta export and reconciliation.
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn SyncStore>,
    retry: RetryPolicy,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn SyncStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Export the pending change window, tagged with `run_id`.
    ///
    /// Single attempt: re-invoking the export could submit the same window twice, so the
    /// next cycle is the only retry.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn run_delta_cycle(&self, run_id: RunId) -> Result<Option<RowCount>, StoreError> {
        let rows = self.store.export_delta(run_id).await?;
        debug!(?rows, "delta export returned");
        Ok(rows)
    }

    /// Reconcile the last `days_back` days. Single attempt.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn run_parity_check(&self, days_back: u32) -> Result<(), StoreError> {
        self.store.parity_check(days_back).await
    }

    /// Connectivity probe, retried on transient faults.
    pub async fn probe(&self) -> Result<(), StoreError> {
        self.retry
            .run(|| self.store.ping(), StoreError::is_transient)
            .await
    }
}
