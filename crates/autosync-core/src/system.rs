//! Identity of this worker process, as recorded on every task run.

use std::sync::OnceLock;

static HOST: OnceLock<String> = OnceLock::new();

/// Host name, resolved once.
pub fn host() -> &'static str {
    HOST.get_or_init(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "unknown-host".to_string())
    })
}

/// Process id as the journal stores it.
#[inline]
pub fn pid() -> String {
    std::process::id().to_string()
}
