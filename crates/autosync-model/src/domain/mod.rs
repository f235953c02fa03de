mod canonical;
pub use canonical::normalize;

mod run_id;
pub use run_id::RunId;

mod run_status;
pub use run_status::RunStatus;

mod task_code;
pub use task_code::TaskCode;

mod task_definition;
pub use task_definition::TaskDefinition;

mod task_run;
pub use task_run::TaskRun;

/// Structured metadata attached to a run on `finish`.
pub type Artifacts = serde_json::Value;

/// Processed-row count as reported by the store.
pub type RowCount = i64;
