use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown LOG_FORMAT '{0}' (expected text, json or journald)")]
    InvalidFormat(String),
    #[error("journald output requires Linux and the `journald` feature")]
    JournaldNotSupported,
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
    #[error("tracing subscriber setup failed: {0}")]
    InitializationFailed(String),
    #[error("LOG_LEVEL '{0}' is not a valid filter directive")]
    InvalidLogLevel(String),
}
