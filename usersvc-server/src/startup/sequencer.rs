//! Startup sequencer
//!
//! Drives the data layer from `Disconnected` to `Ready`:
//!
//! ```text
//! Disconnected -> Syncing -> Ready
//!       ^            |
//!       +------------+        (attempt failed, budget left: wait, retry)
//! Disconnected -> Failed      (attempt failed, budget used up)
//! ```
//!
//! Each attempt runs `connect()` then `reconcile_schema()`. A failure in
//! either half fails the whole attempt, and the next attempt starts again
//! from `connect()`. Attempts never overlap, and the wait between them only
//! suspends this task.

use std::sync::Arc;

use crate::db::{DbResult, UserStore};

use super::delay::{Delay, TokioDelay};
use super::policy::RetryPolicy;
use super::state::{ConnectionState, Readiness};

/// How the sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Ready,
    Failed,
}

/// Result of [`Sequencer::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Attempts made by this process so far
    pub attempts: u32,
    pub outcome: SyncOutcome,
}

pub struct Sequencer {
    store: Arc<dyn UserStore>,
    readiness: Readiness,
    policy: RetryPolicy,
    delay: Arc<dyn Delay>,
}

impl Sequencer {
    pub fn new(store: Arc<dyn UserStore>, readiness: Readiness, policy: RetryPolicy) -> Self {
        Self {
            store,
            readiness,
            policy,
            delay: Arc::new(TokioDelay),
        }
    }

    /// Replace the tokio sleep used between attempts.
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Retry connect-and-sync until ready or out of attempts.
    ///
    /// Never returns an error: exhaustion is logged and reported as
    /// [`SyncOutcome::Failed`], leaving the process running with an unusable
    /// data layer.
    pub async fn run(self) -> SyncReport {
        match self.readiness.state() {
            ConnectionState::Ready => return self.report(SyncOutcome::Ready),
            ConnectionState::Failed => return self.report(SyncOutcome::Failed),
            _ => {}
        }

        loop {
            self.advance(ConnectionState::Syncing);
            let attempt = self.readiness.record_attempt();
            tracing::debug!(attempt, max_attempts = %self.policy.max_attempts, "syncing database");

            let err = match self.attempt().await {
                Ok(()) => {
                    self.advance(ConnectionState::Ready);
                    tracing::info!(attempt, "database connected and schema synchronized");
                    return self.report(SyncOutcome::Ready);
                }
                Err(err) => err,
            };

            self.advance(ConnectionState::Disconnected);

            if self.policy.max_attempts.is_exhausted(attempt) {
                self.advance(ConnectionState::Failed);
                tracing::error!(
                    attempts = attempt,
                    error = %err,
                    "could not connect to database after {} attempts, giving up; \
                     data routes will fail until restart",
                    attempt
                );
                return self.report(SyncOutcome::Failed);
            }

            tracing::warn!(
                attempt,
                max_attempts = %self.policy.max_attempts,
                retry_in = ?self.policy.delay,
                error = %err,
                "database not ready, retrying"
            );
            self.delay.wait(self.policy.delay).await;
        }
    }

    async fn attempt(&self) -> DbResult<()> {
        self.store.connect().await?;
        self.store.reconcile_schema().await
    }

    fn advance(&self, next: ConnectionState) {
        if let Err(err) = self.readiness.transition(next) {
            tracing::warn!(%err, "connection state changed outside the sequencer");
        }
    }

    fn report(&self, outcome: SyncOutcome) -> SyncReport {
        SyncReport {
            attempts: self.readiness.attempts(),
            outcome,
        }
    }
}
