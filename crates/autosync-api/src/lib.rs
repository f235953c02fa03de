//! Liveness endpoint of the worker.
//!
//! `GET /healthz` answers `200 ok` for as long as the process is up. It shares nothing with the
//! sync loop, so a failed or stuck cycle never shows here.

mod error;
pub use error::ApiError;

mod http;
pub use http::{HEALTHZ_PATH, router, serve};
