//! Database connection pool management
//!
//! Uses sqlx MySqlPool with explicit connection limits.

use std::fmt;
use std::io;
use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPoolOptions};
use sqlx::{Connection, MySqlPool};

/// Default MySQL port.
pub const DEFAULT_DB_PORT: u16 = 3306;

/// Where to find the database and how to log in.
#[derive(Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl DbConfig {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }

    /// Connection target without credentials, for logs.
    pub fn redacted(&self) -> String {
        format!(
            "mysql://{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Pool limits.
///
/// Defaults: max 5, min 0, 30s acquire timeout, 10s idle timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(10),
        }
    }
}

/// Create a MySQL connection pool.
///
/// Opens one connection up front so an unreachable server, rejected
/// credentials, or a missing database fail here with the driver's own error.
/// The pool itself is built lazily afterwards. A single handshake is bounded
/// by `acquire_timeout`; a refused connection fails immediately.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool(config.connect_options(), PoolSettings::default()).await?;
/// ```
pub async fn create_pool(
    options: MySqlConnectOptions,
    settings: PoolSettings,
) -> Result<MySqlPool, sqlx::Error> {
    let conn = tokio::time::timeout(
        settings.acquire_timeout,
        MySqlConnection::connect_with(&options),
    )
    .await
    .map_err(|_| {
        sqlx::Error::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connect timed out after {:?}", settings.acquire_timeout),
        ))
    })??;

    if let Err(err) = conn.close().await {
        tracing::debug!(%err, "closing initial connection failed");
    }

    Ok(MySqlPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .connect_lazy_with(options))
}
