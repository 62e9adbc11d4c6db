//! Startup sequencing - connect, reconcile schema, retry until ready or failed

pub mod delay;
pub mod policy;
pub mod sequencer;
pub mod state;

pub use delay::{Delay, TokioDelay};
pub use policy::{MaxAttempts, RetryPolicy};
pub use sequencer::{Sequencer, SyncOutcome, SyncReport};
pub use state::{ConnectionState, InvalidTransition, Readiness, ReadinessSnapshot};
