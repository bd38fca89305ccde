//! Module lifecycle state
//!
//! Every supervised module is in exactly one of five states. The transitions
//! driven by observations (error reports, health probes) are pure and live
//! here; transitions driven by operations (restart, fallback toggles) are
//! applied by the supervisor once the module call has returned.
//!
//! ```text
//!   Healthy ──error──> Degraded ──error──> Failed
//!      ▲                                     │
//!      │            restart()                ▼
//!      └──success── Restarting <──────── (any state)
//!                        │
//!                        └──failure──> Failed ──limit reached──> Fallback
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operational state of a supervised module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    /// Module is operating normally
    Healthy,
    /// Module reported an error or looks unresponsive
    Degraded,
    /// Module failed repeatedly or a restart did not succeed
    Failed,
    /// A restart is in flight
    Restarting,
    /// Module runs in reduced-functionality mode
    Fallback,
}

impl ModuleState {
    /// Lowercase name used in logs and serialized snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleState::Healthy => "healthy",
            ModuleState::Degraded => "degraded",
            ModuleState::Failed => "failed",
            ModuleState::Restarting => "restarting",
            ModuleState::Fallback => "fallback",
        }
    }

    /// State after the module reports an error.
    ///
    /// Errors escalate `Healthy -> Degraded -> Failed`; every other state is
    /// left alone.
    pub fn on_error(self) -> ModuleState {
        match self {
            ModuleState::Healthy => ModuleState::Degraded,
            ModuleState::Degraded => ModuleState::Failed,
            ModuleState::Failed | ModuleState::Restarting | ModuleState::Fallback => self,
        }
    }

    /// State after a health probe reports the module as not initialized.
    ///
    /// An in-flight restart or an already failed module is never overridden.
    pub fn on_uninitialized_probe(self) -> ModuleState {
        match self {
            ModuleState::Restarting | ModuleState::Failed => self,
            ModuleState::Healthy | ModuleState::Degraded | ModuleState::Fallback => {
                ModuleState::Degraded
            }
        }
    }

    /// State after the status query itself failed.
    ///
    /// Only a healthy module is downgraded.
    pub fn on_probe_error(self) -> ModuleState {
        match self {
            ModuleState::Healthy => ModuleState::Degraded,
            other => other,
        }
    }

    /// Whether an error report in this state should escalate to `Failed`
    pub fn escalates_on_error(&self) -> bool {
        matches!(self, ModuleState::Degraded)
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
