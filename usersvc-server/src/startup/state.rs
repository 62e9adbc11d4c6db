//! Process-wide database connection state
//!
//! [`Readiness`] is the single holder of [`ConnectionState`]. It is cloned
//! into the HTTP layer so handlers can refuse data requests until the
//! sequencer reports `Ready`, and it counts sync attempts for the lifetime of
//! the process.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

/// Where the data layer is in its startup lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Syncing,
    Ready,
    Failed,
}

impl ConnectionState {
    /// `Ready` and `Failed` end the startup sequence.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Syncing)
                | (Self::Syncing, Self::Ready)
                | (Self::Syncing, Self::Disconnected)
                | (Self::Disconnected, Self::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Syncing => "syncing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid connection state transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// Point-in-time view of the holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadinessSnapshot {
    pub state: ConnectionState,
    pub attempts: u32,
}

/// Shared connection state with change notification.
#[derive(Clone)]
pub struct Readiness {
    tx: Arc<watch::Sender<ReadinessSnapshot>>,
}

impl Readiness {
    /// New holder in `Disconnected` with no attempts recorded.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ReadinessSnapshot {
            state: ConnectionState::Disconnected,
            attempts: 0,
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> ReadinessSnapshot {
        *self.tx.borrow()
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshot().state
    }

    pub fn attempts(&self) -> u32 {
        self.snapshot().attempts
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Move to `next`, rejecting edges outside the startup state machine.
    pub fn transition(&self, next: ConnectionState) -> Result<(), InvalidTransition> {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|snapshot| {
            if snapshot.state.can_transition_to(next) {
                snapshot.state = next;
                true
            } else {
                outcome = Err(InvalidTransition {
                    from: snapshot.state,
                    to: next,
                });
                false
            }
        });
        outcome
    }

    /// Count one more sync attempt and return the new total.
    ///
    /// The counter never goes down.
    pub fn record_attempt(&self) -> u32 {
        let mut attempts = 0;
        self.tx.send_modify(|snapshot| {
            snapshot.attempts = snapshot.attempts.saturating_add(1);
            attempts = snapshot.attempts;
        });
        attempts
    }

    pub fn subscribe(&self) -> watch::Receiver<ReadinessSnapshot> {
        self.tx.subscribe()
    }

    /// Wait until the state is `Ready` or `Failed`.
    pub async fn settled(&self) -> ConnectionState {
        let mut rx = self.tx.subscribe();
        let state = match rx.wait_for(|snapshot| snapshot.state.is_terminal()).await {
            Ok(snapshot) => snapshot.state,
            // The sender lives in `self`, so this only happens mid-teardown
            Err(_) => self.state(),
        };
        state
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Readiness").field(&self.snapshot()).finish()
    }
}
