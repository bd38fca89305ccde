//! Restart Policy: attempt cap plus cooldown window
//!
//! The policy is a pure function of the restart tracking for one module and
//! the current time. It never mutates anything; the supervisor calls
//! [`RestartTracking::record_attempt`] once it commits to a restart.
//!
//! A module may be restarted when:
//! - fewer than `max_attempts` restarts have been attempted since the last
//!   successful one, and
//! - the cooldown has elapsed since the last attempt (if any).
//!
//! # Example
//!
//! ```
//! use revive_core_recovery::policy::{DenyReason, RestartDecision, RestartPolicy, RestartTracking};
//! use chrono::Utc;
//! use std::time::Duration;
//!
//! let policy = RestartPolicy::new(2, Duration::ZERO);
//! let mut tracking = RestartTracking::default();
//!
//! tracking.record_attempt(Utc::now());
//! tracking.record_attempt(Utc::now());
//!
//! assert!(matches!(
//!     policy.evaluate(&tracking, Utc::now()),
//!     RestartDecision::Deny(DenyReason::LimitReached { attempts: 2, max: 2 })
//! ));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Restart bookkeeping for one module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartTracking {
    /// Restarts attempted since the last successful one
    pub attempt_count: u32,

    /// When the most recent restart was started
    pub last_restart: Option<DateTime<Utc>>,
}

impl RestartTracking {
    /// Count a new restart attempt started at `now`
    pub fn record_attempt(&mut self, now: DateTime<Utc>) {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_restart = Some(now);
    }

    /// Clear the attempt counter after a successful restart.
    ///
    /// The last restart timestamp is kept so the cooldown still applies.
    pub fn reset_attempts(&mut self) {
        self.attempt_count = 0;
    }
}

/// Why a restart was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The attempt cap has been reached
    LimitReached { attempts: u32, max: u32 },
    /// The previous attempt is too recent
    CoolingDown { remaining: Duration },
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::LimitReached { attempts, max } => {
                write!(f, "restart limit reached ({}/{})", attempts, max)
            }
            DenyReason::CoolingDown { remaining } => {
                write!(f, "cooling down ({:.1}s remaining)", remaining.as_secs_f64())
            }
        }
    }
}

/// Outcome of a policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Permit,
    Deny(DenyReason),
}

impl RestartDecision {
    pub fn is_permitted(&self) -> bool {
        matches!(self, RestartDecision::Permit)
    }
}

/// Rate limit applied to non-forced restarts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Maximum attempts before restarts are refused
    pub max_attempts: u32,
    /// Minimum time between two attempts
    pub cooldown: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::DEFAULT_MAX_RESTART_ATTEMPTS,
            cooldown: Duration::from_secs(crate::DEFAULT_RESTART_COOLDOWN_SECS),
        }
    }
}

impl RestartPolicy {
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self {
            max_attempts,
            cooldown,
        }
    }

    /// Decide whether a restart is currently allowed.
    ///
    /// The attempt cap is checked first. A last restart timestamp in the
    /// future (clock stepped backwards) counts as still cooling down.
    pub fn evaluate(&self, tracking: &RestartTracking, now: DateTime<Utc>) -> RestartDecision {
        if tracking.attempt_count >= self.max_attempts {
            return RestartDecision::Deny(DenyReason::LimitReached {
                attempts: tracking.attempt_count,
                max: self.max_attempts,
            });
        }

        if let Some(last) = tracking.last_restart {
            match (now - last).to_std() {
                Ok(elapsed) if elapsed >= self.cooldown => {}
                Ok(elapsed) => {
                    return RestartDecision::Deny(DenyReason::CoolingDown {
                        remaining: self.cooldown - elapsed,
                    });
                }
                Err(_) => {
                    return RestartDecision::Deny(DenyReason::CoolingDown {
                        remaining: self.cooldown,
                    });
                }
            }
        }

        RestartDecision::Permit
    }

    /// Shorthand for `evaluate(..).is_permitted()`
    pub fn permits(&self, tracking: &RestartTracking, now: DateTime<Utc>) -> bool {
        self.evaluate(tracking, now).is_permitted()
    }
}
