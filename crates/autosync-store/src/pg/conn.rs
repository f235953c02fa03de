//! Per-call connections to the Postgres store.

use std::{fmt, str::FromStr, time::Duration};

use sqlx::{
    Connection as _, PgConnection,
    postgres::{PgConnectOptions, PgSslMode},
};
use tracing::{debug, instrument};

use crate::error::StoreError;

/// Default seconds allowed for opening a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to reach the store.
#[derive(Clone)]
pub struct PgStoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// `disable`, `allow`, `prefer`, `require`, `verify-ca` or `verify-full`.
    pub ssl_mode: String,
    pub connect_timeout: Duration,
}

impl PgStoreConfig {
    pub(crate) fn connect_options(&self) -> Result<PgConnectOptions, StoreError> {
        if self.host.trim().is_empty() {
            return Err(StoreError::InvalidConfig("store host is empty".into()));
        }
        if self.database.trim().is_empty() {
            return Err(StoreError::InvalidConfig("store database is empty".into()));
        }
        let ssl_mode = PgSslMode::from_str(&self.ssl_mode).map_err(|_| {
            StoreError::InvalidConfig(format!("unknown ssl mode '{}'", self.ssl_mode))
        })?;

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
            .ssl_mode(ssl_mode)
            .application_name("autosync"))
    }
}

impl fmt::Debug for PgStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgStoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// A dedicated connection, opened for a single store call.
pub(crate) struct DbConn(PgConnection);

impl DbConn {
    #[instrument(skip_all, err)]
    pub(crate) async fn connect(
        options: &PgConnectOptions,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        tokio::time::timeout(timeout, PgConnection::connect_with(options))
            .await
            .map_err(|_| StoreError::ConnectTimeout(timeout))?
            .map(Self)
            .map_err(StoreError::Connect)
    }

    /// Close the connection; a failed close is not worth surfacing once the call is done.
    pub(crate) async fn release(self) {
        if let Err(e) = self.0.close().await {
            debug!(error = %e, "store connection close failed");
        }
    }
}

impl std::ops::Deref for DbConn {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for DbConn {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
