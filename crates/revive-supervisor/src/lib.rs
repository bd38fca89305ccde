//! Revive Supervisor: Module recovery manager
//!
//! # Overview
//!
//! Supervises independently pluggable application components ("modules"),
//! detects failure and drives restart, fallback and cascading recovery
//! without operator intervention.
//!
//! - **Orchestrator** ([`RecoveryManager`]): restart with attempt cap and
//!   cooldown, fallback toggling, one-level cascade to dependents
//! - **Health Monitor**: background task polling module status
//! - **Event Notifier**: per-module callbacks for recovery lifecycle events
//!
//! # State Machine
//!
//! ```text
//!            error            error
//! Healthy ─────────► Degraded ─────────► Failed ──► auto restart (if permitted)
//!    ▲                                     │
//!    │ restart ok        restart()         ▼
//!    └──────────────── Restarting ◄──── any state
//!                          │
//!                          │ restart failed, limit reached
//!                          ▼
//!                      Fallback ──► Healthy  (disable_fallback)
//! ```
//!
//! # Usage Example
//!
//! ```
//! use revive_supervisor::testing::MockModule;
//! use revive_supervisor::{ModuleState, RecoveryConfig, RecoveryManager};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let manager = RecoveryManager::new(RecoveryConfig::default()).unwrap();
//!
//! let storage = MockModule::new("storage");
//! let calendar = MockModule::new("calendar");
//! manager.register(storage.clone(), &[]).await;
//! manager.register(calendar.clone(), &["storage"]).await;
//!
//! assert!(manager.restart("storage", false).await);
//! assert_eq!(manager.state("storage").await, Some(ModuleState::Healthy));
//!
//! manager.start_monitoring();
//! manager.stop_monitoring().await;
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod module;
pub mod monitor;
pub mod notifier;
pub mod testing;

// Re-export main types for convenience
pub use config::{RecoveryConfig, MONITOR_STOP_TIMEOUT};
pub use manager::{ModuleHealth, RecoveryManager, DEFAULT_HISTORY_LIMIT};
pub use module::{
    ErrorInfo, EventEmitter, Module, ModuleError, ModuleEvent, ModuleEventSink, ModuleResult,
    ModuleStatus, StatusChange,
};
pub use monitor::HealthPassStats;
pub use notifier::{CallbackId, RecoveryCallback, RecoveryEvent};

pub use revive_core_recovery::{
    LedgerStats, ModuleState, RecoveryAction, RecoveryError, RecoveryRecord,
};
