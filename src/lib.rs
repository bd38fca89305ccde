/*!
 * Revive - Module recovery manager
 *
 * Supervises pluggable application modules with:
 * - Restart with attempt cap and cooldown window
 * - Automatic fallback mode once restarts are exhausted
 * - One-level cascading recovery of dependent modules
 * - Background health monitoring
 * - Recovery lifecycle callbacks and a bounded recovery history
 *
 * The recovery logic lives in `revive-core-recovery` and the async manager in
 * `revive-supervisor`; this crate adds configuration files, logging setup and
 * a demo driver.
 */

pub mod config;
pub mod demo;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, LogLevel};
pub use error::{Result, ReviveError};
pub use revive_supervisor as supervisor;
pub use revive_supervisor::{RecoveryConfig, RecoveryManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
