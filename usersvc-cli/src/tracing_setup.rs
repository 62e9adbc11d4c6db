//! Console logging for the usersvc binary
//!
//! `RUST_LOG` wins when set. Otherwise `--debug` selects `debug` for our own
//! crates and `info` for dependencies, so sqlx and hyper stay quiet.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

const CRATES: &[&str] = &["usersvc", "usersvc_server"];

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingConfig {
    pub debug: bool,
}

impl TracingConfig {
    /// Filter directives used when `RUST_LOG` is unset.
    fn default_directives(&self) -> String {
        let ours = if self.debug { "debug" } else { "info" };
        let mut directives = vec!["info".to_owned()];
        directives.extend(CRATES.iter().map(|krate| format!("{krate}={ours}")));
        directives.join(",")
    }
}

pub fn init(config: &TracingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.default_directives()).map_err(|err| anyhow!(err))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
