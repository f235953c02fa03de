//! Data model shared by the autosync worker crates.
//!
//! Task definitions and task runs mirror the rows of the external task-audit store.
//! The worker never owns them: runs are created by the store on `start` and mutated by exactly one terminal call.

mod domain;
pub use domain::*;

mod error;
pub use error::ModelError;
