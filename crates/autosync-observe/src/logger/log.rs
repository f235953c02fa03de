use std::borrow::Cow;

use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, fmt::time::OffsetTime, layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Install the filter and the output layer for `cfg.format` as the global subscriber.
pub(crate) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = mk_filter(&cfg.level)?;
    let output = output_layer(cfg)?;

    if tracing::dispatcher::has_been_set() {
        return Err(LoggerError::AlreadyInitialized);
    }
    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .map_err(|e| LoggerError::InitializationFailed(e.to_string()))
}

fn output_layer(cfg: &LoggerConfig) -> Result<OutputLayer, LoggerError> {
    let layer = match cfg.format {
        LoggerFormat::Text => fmt::layer()
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_timer(local_rfc3339())
            .boxed(),
        // One object per line; run_id and task_code stay top-level fields.
        LoggerFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(cfg.with_targets)
            .with_timer(local_rfc3339())
            .boxed(),
        LoggerFormat::Journald => journald_layer()?,
    };
    Ok(layer)
}

/// `LOG_LEVEL` as an `EnvFilter`; blank means `info`.
fn mk_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    let directives = normalize_levels(level.trim());
    let directives = if directives.is_empty() { "info".to_string() } else { directives };
    EnvFilter::try_new(&directives).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

/// Lowercase bare level names (`INFO`, `autosync_core=DEBUG`); targets and span fields keep their case.
fn normalize_levels(directives: &str) -> String {
    directives
        .split(',')
        .map(|directive| match directive.rsplit_once('=') {
            Some((selector, level)) => format!("{selector}={}", lower_level(level)),
            None => lower_level(directive).into_owned(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn lower_level(token: &str) -> Cow<'_, str> {
    let lower = token.trim().to_ascii_lowercase();
    if LEVELS.contains(&lower.as_str()) {
        Cow::Owned(lower)
    } else {
        Cow::Borrowed(token)
    }
}

fn local_rfc3339() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald_layer() -> Result<OutputLayer, LoggerError> {
    let layer = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?
        .with_syslog_identifier("autosync".to_string());
    Ok(layer.boxed())
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald_layer() -> Result<OutputLayer, LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_accepts_upper_case_levels() {
        assert!(mk_filter("INFO").is_ok());
        assert!(mk_filter("Debug").is_ok());
        assert!(mk_filter("autosync_core=trace,warn").is_ok());
        assert!(mk_filter("").is_ok());
    }

    #[test]
    fn filter_rejects_garbage() {
        let err = mk_filter("sync=loud").unwrap_err();
        assert!(matches!(err, LoggerError::InvalidLogLevel(ref s) if s == "sync=loud"));
    }

    #[test]
    fn only_level_names_are_lowercased() {
        assert_eq!(normalize_levels("WARN"), "warn");
        assert_eq!(normalize_levels("MyCrate=DEBUG,INFO"), "MyCrate=debug,info");
        assert_eq!(
            normalize_levels("autosync_core[cycle{task_code=AUTO_SYNC_FLAT}]=TRACE"),
            "autosync_core[cycle{task_code=AUTO_SYNC_FLAT}]=trace"
        );
        assert_eq!(normalize_levels("Worker"), "Worker");
    }

    #[test]
    fn every_format_has_an_output_layer() {
        assert!(output_layer(&LoggerConfig::new(LoggerFormat::Text, "info")).is_ok());
        assert!(output_layer(&LoggerConfig::new(LoggerFormat::Json, "info")).is_ok());

        if !cfg!(all(target_os = "linux", feature = "journald")) {
            assert!(matches!(
                output_layer(&LoggerConfig::new(LoggerFormat::Journald, "info")),
                Err(LoggerError::JournaldNotSupported)
            ));
        }
    }
}
