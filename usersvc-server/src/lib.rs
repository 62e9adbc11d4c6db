//! usersvc-server: CRUD HTTP service for a single `users` table
//!
//! The database may come up after this process. [`startup::Sequencer`]
//! retries connect-and-sync on a fixed interval while the HTTP layer
//! answers data requests with a server error until the store is ready.

pub mod db;
pub mod http;
pub mod models;
pub mod startup;

#[cfg(test)]
pub(crate) mod test_support;

pub use db::{DbConfig, DbError, MySqlUserStore, UserStore};
pub use http::{run_server, AppState, ServerConfig};
pub use startup::{ConnectionState, Readiness, RetryPolicy, Sequencer};
