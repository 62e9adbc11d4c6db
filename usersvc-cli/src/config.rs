//! Database and retry settings shared by the commands
//!
//! Every flag falls back to an environment variable; `.env` is loaded
//! before parsing so it can supply them too.

use std::time::Duration;

use clap::Args;
use usersvc_server::db::pool::{PoolSettings, DEFAULT_DB_PORT};
use usersvc_server::startup::MaxAttempts;
use usersvc_server::{DbConfig, RetryPolicy};

#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// Database host
    #[arg(long, env = "DB_HOST", default_value = "127.0.0.1")]
    pub db_host: String,

    /// Database port
    #[arg(long, env = "DB_PORT", default_value_t = DEFAULT_DB_PORT)]
    pub db_port: u16,

    /// Database (schema) name
    #[arg(long, env = "DB_NAME")]
    pub db_name: String,

    /// Database user
    #[arg(long, env = "DB_USER")]
    pub db_user: String,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    pub db_password: String,

    /// Connect attempts before giving up (0, "unlimited" or "infinite" to retry forever)
    #[arg(long, env = "DB_MAX_ATTEMPTS", default_value = "10")]
    pub max_attempts: MaxAttempts,

    /// Seconds to wait between connect attempts
    #[arg(long, env = "DB_RETRY_DELAY_SECS", default_value_t = 5)]
    pub retry_delay_secs: u64,

    /// Seconds one connect attempt may take before it counts as failed
    #[arg(long, env = "DB_CONNECT_TIMEOUT_SECS", default_value_t = 30)]
    pub connect_timeout_secs: u64,
}

impl DbArgs {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            host: self.db_host.clone(),
            port: self.db_port,
            database: self.db_name.clone(),
            user: self.db_user.clone(),
            password: self.db_password.clone(),
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            acquire_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..PoolSettings::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}
