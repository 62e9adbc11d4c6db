//! HTTP server command
//!
//! Binds the API and syncs the database in the background. Data routes
//! answer 500 until the sync finishes, unless `--wait-for-db` holds the
//! listener back until then.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use usersvc_server::{
    run_server, AppState, MySqlUserStore, Readiness, Sequencer, ServerConfig, UserStore,
};

use crate::config::DbArgs;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, short = 'p', env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Bind the listener only after the database is ready or has given up
    #[arg(long, env = "WAIT_FOR_DB")]
    pub wait_for_db: bool,

    /// Let startup add missing columns and indexes to the users table
    #[arg(long, env = "DB_SYNC_ALTER")]
    pub sync_alter: bool,

    #[command(flatten)]
    pub db: DbArgs,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let db_config = args.db.db_config();
    let policy = args.db.retry_policy();

    tracing::info!(
        database = %db_config.redacted(),
        max_attempts = %policy.max_attempts,
        retry_delay = ?policy.delay,
        sync_alter = args.sync_alter,
        "Starting usersvc on {}:{}",
        args.host,
        args.port
    );

    let store: Arc<dyn UserStore> = Arc::new(
        MySqlUserStore::new(&db_config)
            .with_pool_settings(args.db.pool_settings())
            .with_schema_alter(args.sync_alter),
    );
    let readiness = Readiness::new();

    // Sync in the background; the listener does not wait unless asked to
    let sync_task = tokio::spawn(Sequencer::new(store.clone(), readiness.clone(), policy).run());

    let config = ServerConfig {
        bind_addr: SocketAddr::new(args.host, args.port),
        cors_permissive: args.cors_permissive,
        wait_for_ready: args.wait_for_db,
    };

    // Run server (blocks until shutdown)
    let result = run_server(AppState::new(store, readiness), config).await;

    sync_task.abort();
    result.context("Server error")
}
