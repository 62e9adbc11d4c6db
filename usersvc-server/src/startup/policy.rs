//! Retry policy for the startup sequencer

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

/// Attempts allowed by default before the data layer is declared failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Wait between attempts by default.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Attempt ceiling for connect-and-sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxAttempts {
    /// Give up after this many failed attempts
    Limited(NonZeroU32),
    /// Retry until success
    Unlimited,
}

impl MaxAttempts {
    /// True once `attempts` failures use up the budget.
    pub fn is_exhausted(self, attempts: u32) -> bool {
        match self {
            Self::Limited(max) => attempts >= max.get(),
            Self::Unlimited => false,
        }
    }
}

impl Default for MaxAttempts {
    fn default() -> Self {
        Self::Limited(NonZeroU32::MIN.saturating_add(DEFAULT_MAX_ATTEMPTS - 1))
    }
}

impl fmt::Display for MaxAttempts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(max) => write!(f, "{}", max),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid max attempts '{0}': expected a count, or 0/unlimited/infinite")]
pub struct ParseMaxAttemptsError(String);

impl FromStr for MaxAttempts {
    type Err = ParseMaxAttemptsError;

    /// `0`, `unlimited`, `infinite` and `inf` mean retry forever.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "unlimited" | "infinite" | "inf" => return Ok(Self::Unlimited),
            _ => {}
        }

        let count: u32 = trimmed
            .parse()
            .map_err(|_| ParseMaxAttemptsError(s.to_owned()))?;

        Ok(NonZeroU32::new(count).map_or(Self::Unlimited, Self::Limited))
    }
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: MaxAttempts,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn bounded(max_attempts: NonZeroU32, delay: Duration) -> Self {
        Self {
            max_attempts: MaxAttempts::Limited(max_attempts),
            delay,
        }
    }

    pub fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: MaxAttempts::Unlimited,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MaxAttempts::default(),
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}
