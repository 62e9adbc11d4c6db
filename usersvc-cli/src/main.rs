//! usersvc CLI - users API server and schema migration
//!
//! - `serve`: run the HTTP API, syncing the database in the background
//! - `migrate`: create or alter the users table, then exit

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "usersvc",
    author,
    version,
    about = "CRUD API for users, with startup retry until the database is ready"
)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Create or alter the users table and exit
    Migrate(commands::migrate::MigrateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so .env can supply flag defaults
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_setup::init(&TracingConfig { debug: cli.debug })
        .context("Failed to initialize tracing")?;

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Migrate(args) => commands::run_migrate(args).await?,
    }
    Ok(())
}
