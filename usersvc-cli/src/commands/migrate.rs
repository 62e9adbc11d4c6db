//! Explicit schema migration command
//!
//! Connects (with the usual retry policy), then creates or alters the users
//! table. Exits non-zero if the database never became ready.

use anyhow::{bail, Result};
use clap::Parser;
use std::sync::Arc;
use usersvc_server::startup::SyncOutcome;
use usersvc_server::{MySqlUserStore, Readiness, Sequencer, UserStore};

use crate::config::DbArgs;

/// Arguments for the migrate command
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub db: DbArgs,
}

/// Reconcile the users table with schema alteration enabled
pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let db_config = args.db.db_config();
    tracing::info!(database = %db_config.redacted(), "Migrating users table");

    let store: Arc<dyn UserStore> = Arc::new(
        MySqlUserStore::new(&db_config)
            .with_pool_settings(args.db.pool_settings())
            .with_schema_alter(true),
    );
    let report = Sequencer::new(store, Readiness::new(), args.db.retry_policy()).run().await;

    if report.outcome == SyncOutcome::Failed {
        bail!("migration failed after {} attempts", report.attempts);
    }

    tracing::info!(attempts = report.attempts, "Users table is up to date");
    Ok(())
}
