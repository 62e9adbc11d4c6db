//! Database layer - connection pool, schema reconciliation, and the user store
//!
//! # Design Principles
//!
//! - Connection pool (max 5 connections) - no Arc<Mutex<Connection>>
//! - Rely on DB constraints, handle conflicts - no check-then-insert
//! - Transactions for multi-step operations
//! - Callers see [`DbError`], never raw `sqlx::Error`

pub mod mysql;
pub mod pool;
pub mod schema;

use async_trait::async_trait;

use crate::models::{NewUser, User};

pub use mysql::MySqlUserStore;
pub use pool::{DbConfig, PoolSettings};

pub type DbResult<T> = Result<T, DbError>;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Endpoint unreachable, credentials rejected, unknown database, or no pool yet
    #[error("connection error: {0}")]
    Connection(String),

    /// Table could not be brought in line with the model
    #[error("schema error: {0}")]
    Schema(String),

    /// Unique constraint violated
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("database error: {0}")]
    Query(#[from] sqlx::Error),
}

impl DbError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn user_not_found(id: u64) -> Self {
        Self::NotFound {
            resource: "User",
            id: id.to_string(),
        }
    }

    /// Sort a driver error into the taxonomy.
    ///
    /// Unique violations become [`DbError::Conflict`]; transport and pool
    /// failures become [`DbError::Connection`].
    pub fn classify(err: sqlx::Error) -> Self {
        let unique_violation = matches!(
            &err,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation()
        );
        if unique_violation {
            return Self::Conflict("email already in use".to_owned());
        }

        if matches!(
            err,
            sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
        ) {
            return Self::Connection(err.to_string());
        }

        Self::Query(err)
    }
}

/// Data access contract for the `users` table.
///
/// `connect` and `reconcile_schema` are driven by the startup sequencer;
/// the remaining operations serve route handlers.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Establish a live connection pool, replacing any previous one.
    async fn connect(&self) -> DbResult<()>;

    /// Ensure the `users` table matches the model.
    async fn reconcile_schema(&self) -> DbResult<()>;

    async fn find_all(&self) -> DbResult<Vec<User>>;

    async fn find_by_id(&self, id: u64) -> DbResult<User>;

    async fn create(&self, user: NewUser) -> DbResult<User>;

    /// Full replace of name and email. Never inserts.
    async fn update(&self, id: u64, user: NewUser) -> DbResult<User>;

    async fn delete(&self, id: u64) -> DbResult<()>;
}
