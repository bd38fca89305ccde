//! Recovery Ledger: bounded, append-only history of recovery operations
//!
//! Every completed restart or fallback toggle appends exactly one
//! [`RecoveryRecord`]. The ledger keeps at most `capacity` records across all
//! modules combined; once full, the oldest record is evicted for each new one.
//!
//! # Example
//!
//! ```
//! use revive_core_recovery::ledger::{RecoveryAction, RecoveryLedger, RecoveryRecord};
//!
//! let mut ledger = RecoveryLedger::new(2);
//! ledger.append(RecoveryRecord::new("audio", RecoveryAction::Restart, false, 1));
//! ledger.append(RecoveryRecord::new("audio", RecoveryAction::Restart, true, 2));
//! ledger.append(RecoveryRecord::new("video", RecoveryAction::FallbackEnable, true, 0));
//!
//! // Oldest record was evicted
//! assert_eq!(ledger.len(), 2);
//! assert_eq!(ledger.history(Some("audio"), 20).len(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::trace;

/// Kind of recovery operation a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Restart,
    FallbackEnable,
    FallbackDisable,
}

impl RecoveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::Restart => "restart",
            RecoveryAction::FallbackEnable => "fallback_enable",
            RecoveryAction::FallbackDisable => "fallback_disable",
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    /// When the operation completed
    pub timestamp: DateTime<Utc>,

    /// Module the operation targeted
    pub module_id: String,

    /// What was attempted
    pub action: RecoveryAction,

    /// Whether the module reported success
    pub success: bool,

    /// Restart attempt count for the module at the time of the operation
    pub attempt_count: u32,
}

impl RecoveryRecord {
    /// Create a record stamped with the current time
    pub fn new(
        module_id: impl Into<String>,
        action: RecoveryAction,
        success: bool,
        attempt_count: u32,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            module_id: module_id.into(),
            action,
            success,
            attempt_count,
        }
    }
}

/// Ledger counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    /// Records currently retained
    pub retained: usize,
    /// Records ever appended
    pub total_appended: u64,
    /// Records dropped to stay within capacity
    pub total_evicted: u64,
}

/// Bounded FIFO of recovery records
#[derive(Debug)]
pub struct RecoveryLedger {
    entries: VecDeque<RecoveryRecord>,
    capacity: usize,
    total_appended: u64,
    total_evicted: u64,
}

impl RecoveryLedger {
    /// Create a ledger that retains at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            total_appended: 0,
            total_evicted: 0,
        }
    }

    /// Append a record, evicting the oldest one when full
    pub fn append(&mut self, record: RecoveryRecord) {
        self.total_appended += 1;

        if self.capacity == 0 {
            self.total_evicted += 1;
            return;
        }

        if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                trace!(
                    module_id = %evicted.module_id,
                    action = %evicted.action,
                    "Evicting oldest recovery record"
                );
            }
            self.total_evicted += 1;
        }

        self.entries.push_back(record);
    }

    /// Most recent records, oldest first and most recent last.
    ///
    /// With `module_id` set, only that module's records are considered. At
    /// most `limit` records are returned; a limit of zero returns nothing.
    pub fn history(&self, module_id: Option<&str>, limit: usize) -> Vec<RecoveryRecord> {
        let mut recent: Vec<RecoveryRecord> = self
            .entries
            .iter()
            .rev()
            .filter(|r| module_id.map_or(true, |id| r.module_id == id))
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        recent
    }

    /// Iterate over all retained records, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &RecoveryRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            retained: self.entries.len(),
            total_appended: self.total_appended,
            total_evicted: self.total_evicted,
        }
    }
}

impl Default for RecoveryLedger {
    fn default() -> Self {
        Self::new(crate::DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restart(module: &str, attempt: u32) -> RecoveryRecord {
        RecoveryRecord::new(module, RecoveryAction::Restart, false, attempt)
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let mut ledger = RecoveryLedger::new(3);
        for attempt in 1..=5 {
            ledger.append(restart("db", attempt));
        }

        assert_eq!(ledger.len(), 3);
        let attempts: Vec<u32> = ledger.iter().map(|r| r.attempt_count).collect();
        assert_eq!(attempts, vec![3, 4, 5]);

        let stats = ledger.stats();
        assert_eq!(stats.total_appended, 5);
        assert_eq!(stats.total_evicted, 2);
        assert_eq!(stats.retained, 3);
    }

    #[test]
    fn test_capacity_is_shared_across_modules() {
        let mut ledger = RecoveryLedger::new(4);
        for i in 0..10 {
            let module = if i % 2 == 0 { "a" } else { "b" };
            ledger.append(restart(module, i));
        }

        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.history(None, 100).len(), 4);
        assert_eq!(ledger.history(Some("a"), 100).len(), 2);
    }

    #[test]
    fn test_history_filter_and_limit() {
        let mut ledger = RecoveryLedger::default();
        for attempt in 1..=5 {
            ledger.append(restart("D", attempt));
            ledger.append(restart("M", attempt * 10));
        }

        let history = ledger.history(Some("D"), 2);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].attempt_count, 4);
        assert_eq!(history[1].attempt_count, 5);
        assert!(history.iter().all(|r| r.module_id == "D"));

        let all = ledger.history(None, 3);
        let ids: Vec<&str> = all.iter().map(|r| r.module_id.as_str()).collect();
        assert_eq!(ids, vec!["M", "D", "M"]);
    }

    #[test]
    fn test_history_edge_cases() {
        let mut ledger = RecoveryLedger::new(10);
        assert!(ledger.history(None, 20).is_empty());

        ledger.append(restart("x", 1));
        assert!(ledger.history(Some("x"), 0).is_empty());
        assert!(ledger.history(Some("unknown"), 20).is_empty());
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let mut ledger = RecoveryLedger::new(0);
        ledger.append(restart("x", 1));
        assert!(ledger.is_empty());
        assert_eq!(ledger.stats().total_evicted, 1);
    }

    #[test]
    fn test_record_serialization() {
        let record = RecoveryRecord::new("audio", RecoveryAction::FallbackDisable, true, 2);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"], "fallback_disable");
        assert_eq!(json["module_id"], "audio");
        assert_eq!(json["success"], true);
        assert_eq!(json["attempt_count"], 2);
    }
}
