//! Boundary to the external transactional store.
//!
//! Two contracts are consumed by the worker:
//! - [`JournalStore`]: the task-audit journal (`task_start` / `task_heartbeat` / `task_finish` / `task_fail`).
//! - [`SyncStore`]: the windowed delta export and the reconciliation pass.
//!
//! [`PgStore`] talks to PostgreSQL, [`MemoryStore`] keeps everything in process and records every call.

mod contract;
pub use contract::{HeartbeatLevel, JournalStore, SyncStore};

mod error;
pub use error::StoreError;

mod memory;
pub use memory::{Failure, MemoryStore, StoreCall, StoreOp};

mod pg;
pub use pg::{PgStore, PgStoreConfig};
