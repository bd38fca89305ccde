//! Revive Core Recovery: Pure-logic building blocks for module supervision
//!
//! # Overview
//!
//! This crate holds the parts of the module recovery manager that need no
//! runtime, no I/O and no knowledge of what a module actually does:
//!
//! - **Module State**: The closed lifecycle enum and its error/probe transitions
//! - **Restart Policy**: Attempt cap plus cooldown window, evaluated as a pure function
//! - **Recovery Ledger**: Bounded, append-only history of recovery operations
//! - **Module Registry**: Registration order, per-module state, restart tracking and dependency edges
//!
//! The async supervisor (`revive-supervisor`) wires these together with a
//! background health monitor and event notification.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Module Registry                   │  ← Who is supervised
//! │  (state, restart tracking, deps)        │
//! └─────────────┬───────────────────────────┘
//!               │ restart requested?
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Restart Policy                    │  ← Permit or deny
//! │  (attempt cap + cooldown window)        │
//! └─────────────┬───────────────────────────┘
//!               │ outcome
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Recovery Ledger                   │  ← What happened
//! │  (bounded ring, oldest evicted first)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage Example
//!
//! ```
//! use revive_core_recovery::{RestartPolicy, RestartTracking};
//! use chrono::Utc;
//! use std::time::Duration;
//!
//! let policy = RestartPolicy::new(3, Duration::from_secs(300));
//! let mut tracking = RestartTracking::default();
//!
//! assert!(policy.permits(&tracking, Utc::now()));
//!
//! tracking.record_attempt(Utc::now());
//! // Inside the cooldown window now
//! assert!(!policy.permits(&tracking, Utc::now()));
//! ```

pub mod error;
pub mod ledger;
pub mod policy;
pub mod registry;
pub mod state;

// Re-export main types for convenience
pub use error::RecoveryError;
pub use ledger::{LedgerStats, RecoveryAction, RecoveryLedger, RecoveryRecord};
pub use policy::{DenyReason, RestartDecision, RestartPolicy, RestartTracking};
pub use registry::{ModuleEntry, ModuleRegistry};
pub use state::ModuleState;

/// Default maximum number of non-forced restart attempts
pub const DEFAULT_MAX_RESTART_ATTEMPTS: u32 = 3;

/// Default cooldown between restart attempts (5 minutes)
pub const DEFAULT_RESTART_COOLDOWN_SECS: u64 = 5 * 60;

/// Default number of retained recovery records
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::error::RecoveryError;
    pub use super::ledger::{RecoveryAction, RecoveryLedger, RecoveryRecord};
    pub use super::policy::{RestartDecision, RestartPolicy, RestartTracking};
    pub use super::registry::{ModuleEntry, ModuleRegistry};
    pub use super::state::ModuleState;
}
