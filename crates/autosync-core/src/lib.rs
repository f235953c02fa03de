//! Worker core: journaled sync cycles, the continuous loop and one-shot override modes.
//!
//! Each unit of work is wrapped by the task journal: `start` → work → `finish` or `fail`.
//! Only small read helpers go through [`RetryPolicy`]; the delta export and the parity check run
//! exactly once per cycle.

mod dispatch;
pub use dispatch::{ExitStatus, Mode, TaskOverride, dispatch};

mod engine;
pub use engine::SyncEngine;

mod error;
pub use error::CoreError;

mod journal;
pub use journal::{ERROR_MESSAGE_LIMIT, TaskJournal, truncate_message};

mod retry;
pub use retry::RetryPolicy;

mod shutdown;
pub use shutdown::Shutdown;

pub mod system;

mod worker;
pub use worker::{CycleOutcome, Job, Worker};
