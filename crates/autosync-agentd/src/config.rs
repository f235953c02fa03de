use std::{
    fmt,
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use autosync_core::RetryPolicy;
use autosync_observe::{LoggerConfig, LoggerFormat};
use autosync_store::PgStoreConfig;
use clap::Parser;

/// Worker settings. Every flag can also be set through the environment variable named next to it.
#[derive(Parser, Clone)]
#[command(name = "autosync-agentd")]
#[command(version)]
#[command(about = "Journaled change-tracking sync worker", long_about = None)]
pub struct Config {
    /// Store host
    #[arg(long, env = "STORE_HOST")]
    pub store_host: String,

    #[arg(long, env = "STORE_PORT", default_value_t = 5432)]
    pub store_port: u16,

    /// Database name
    #[arg(long, env = "STORE_DB")]
    pub store_db: String,

    #[arg(long, env = "STORE_USER")]
    pub store_user: String,

    #[arg(long, env = "STORE_PASSWORD", hide_env_values = true)]
    pub store_password: String,

    /// TLS mode: disable, prefer, require, verify-ca or verify-full
    #[arg(long, env = "STORE_SSL_MODE", default_value = "require")]
    pub store_ssl_mode: String,

    /// Seconds allowed for opening a store connection
    #[arg(long, env = "STORE_CONNECT_TIMEOUT", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub store_connect_timeout: u64,

    /// Seconds between continuous-loop cycles
    #[arg(long, env = "SYNC_INTERVAL", default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub sync_interval: u64,

    /// One-shot mode: PARITY_CHECK, EXPORT_ONCE or SYNC_ONCE. Empty runs the continuous loop.
    #[arg(long, env = "TASK_OVERRIDE", default_value = "")]
    pub task_override: String,

    /// Lookback of the PARITY_CHECK override, in days
    #[arg(long, env = "PARITY_DAYS_BACK", default_value_t = 30)]
    pub parity_days_back: u32,

    #[arg(long, env = "HEALTHZ_PORT", default_value_t = 8080)]
    pub healthz_port: u16,

    /// Per-cycle timeout in seconds; 0 disables it
    #[arg(long, env = "CYCLE_TIMEOUT", default_value_t = 0)]
    pub cycle_timeout: u64,

    #[arg(long, env = "RETRY_MAX_ATTEMPTS", default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub retry_max_attempts: u32,

    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value_t = 1000)]
    pub retry_base_delay_ms: u64,

    #[arg(long, env = "RETRY_MAX_DELAY_MS", default_value_t = 10_000)]
    pub retry_max_delay_ms: u64,

    /// Log filter directive, e.g. `info` or `autosync_core=debug,info`
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// text, json or journald
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: LoggerFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("store_host", &self.store_host)
            .field("store_port", &self.store_port)
            .field("store_db", &self.store_db)
            .field("store_user", &self.store_user)
            .field("store_password", &"***")
            .field("store_ssl_mode", &self.store_ssl_mode)
            .field("store_connect_timeout", &self.store_connect_timeout)
            .field("sync_interval", &self.sync_interval)
            .field("task_override", &self.task_override)
            .field("parity_days_back", &self.parity_days_back)
            .field("healthz_port", &self.healthz_port)
            .field("cycle_timeout", &self.cycle_timeout)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    pub fn store(&self) -> PgStoreConfig {
        PgStoreConfig {
            host: self.store_host.clone(),
            port: self.store_port,
            database: self.store_db.clone(),
            user: self.store_user.clone(),
            password: self.store_password.clone(),
            ssl_mode: self.store_ssl_mode.clone(),
            connect_timeout: Duration::from_secs(self.store_connect_timeout),
        }
    }

    pub fn logger(&self) -> LoggerConfig {
        LoggerConfig::new(self.log_format, self.log_level.clone())
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval)
    }

    pub fn cycle_timeout(&self) -> Option<Duration> {
        (self.cycle_timeout > 0).then(|| Duration::from_secs(self.cycle_timeout))
    }

    pub fn healthz_addr(&self) -> SocketAddr {
        (Ipv4Addr::UNSPECIFIED, self.healthz_port).into()
    }
}
