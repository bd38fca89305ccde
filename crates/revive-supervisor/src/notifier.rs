//! Event Notifier: recovery lifecycle callbacks
//!
//! Callbacks are registered per module id and invoked synchronously, in
//! registration order, for every recovery event of that module. A callback
//! that returns an error or panics is logged and skipped; the remaining
//! callbacks still run and the orchestrator never sees the failure.

use crate::module::panic_message;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// Recovery lifecycle event delivered to callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecoveryEvent {
    RestartStarted,
    RestartCompleted { success: bool },
    FallbackEnabled,
    FallbackDisabled,
}

impl RecoveryEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            RecoveryEvent::RestartStarted => "restart_started",
            RecoveryEvent::RestartCompleted { .. } => "restart_completed",
            RecoveryEvent::FallbackEnabled => "fallback_enabled",
            RecoveryEvent::FallbackDisabled => "fallback_disabled",
        }
    }

    /// Event payload as a JSON object (empty for events without data)
    pub fn payload(&self) -> serde_json::Value {
        match self {
            RecoveryEvent::RestartCompleted { success } => {
                serde_json::json!({ "success": success })
            }
            _ => serde_json::json!({}),
        }
    }
}

/// Callback invoked with `(module_id, event)`
pub type RecoveryCallback = Arc<dyn Fn(&str, &RecoveryEvent) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by callback registration, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Per-module callback lists
#[derive(Default)]
pub struct EventNotifier {
    callbacks: HashMap<String, Vec<(CallbackId, RecoveryCallback)>>,
    next_id: u64,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) tracking a module with an empty callback list
    pub fn track(&mut self, module_id: &str) {
        self.callbacks.insert(module_id.to_string(), Vec::new());
    }

    /// Stop tracking a module, dropping its callbacks
    pub fn forget(&mut self, module_id: &str) {
        self.callbacks.remove(module_id);
    }

    /// Add a callback for a tracked module.
    ///
    /// Returns `None` if the module is not tracked.
    pub fn add(&mut self, module_id: &str, callback: RecoveryCallback) -> Option<CallbackId> {
        let list = self.callbacks.get_mut(module_id)?;
        self.next_id += 1;
        let id = CallbackId(self.next_id);
        list.push((id, callback));
        Some(id)
    }

    /// Remove a callback, returning whether it was registered
    pub fn remove(&mut self, module_id: &str, callback_id: CallbackId) -> bool {
        match self.callbacks.get_mut(module_id) {
            Some(list) => {
                let before = list.len();
                list.retain(|(id, _)| *id != callback_id);
                list.len() != before
            }
            None => false,
        }
    }

    /// Snapshot of a module's callbacks, in registration order
    pub fn callbacks_for(&self, module_id: &str) -> Vec<RecoveryCallback> {
        self.callbacks
            .get(module_id)
            .map(|list| list.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default()
    }

    pub fn callback_count(&self, module_id: &str) -> usize {
        self.callbacks.get(module_id).map_or(0, Vec::len)
    }

    /// Invoke every callback with the event, isolating failures.
    ///
    /// Returns the number of callbacks that failed.
    pub fn dispatch(module_id: &str, event: &RecoveryEvent, callbacks: &[RecoveryCallback]) -> usize {
        let mut failures = 0;

        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(module_id, event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    error!(
                        module_id,
                        event = event.name(),
                        error = %e,
                        "Error in recovery callback"
                    );
                }
                Err(payload) => {
                    failures += 1;
                    error!(
                        module_id,
                        event = event.name(),
                        panic = %panic_message(payload.as_ref()),
                        "Recovery callback panicked"
                    );
                }
            }
        }

        failures
    }
}

impl std::fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNotifier")
            .field("modules", &self.callbacks.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> RecoveryCallback {
        let log = Arc::clone(log);
        Arc::new(move |module_id: &str, event: &RecoveryEvent| -> anyhow::Result<()> {
            log.lock()
                .unwrap()
                .push(format!("{tag}:{module_id}:{}", event.name()));
            Ok(())
        })
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = EventNotifier::new();
        notifier.track("audio");
        notifier.add("audio", recorder(&log, "first")).unwrap();
        notifier.add("audio", recorder(&log, "second")).unwrap();

        let callbacks = notifier.callbacks_for("audio");
        let failures = EventNotifier::dispatch("audio", &RecoveryEvent::RestartStarted, &callbacks);

        assert_eq!(failures, 0);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:audio:restart_started".to_string(),
                "second:audio:restart_started".to_string()
            ]
        );
    }

    #[test]
    fn test_failing_callbacks_are_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let erroring: RecoveryCallback =
            Arc::new(|_: &str, _: &RecoveryEvent| -> anyhow::Result<()> {
                Err(anyhow::anyhow!("observer offline"))
            });
        let panicking: RecoveryCallback =
            Arc::new(|_: &str, _: &RecoveryEvent| -> anyhow::Result<()> {
                panic!("observer bug")
            });

        let callbacks = vec![erroring, panicking, recorder(&log, "after")];
        let failures = EventNotifier::dispatch(
            "audio",
            &RecoveryEvent::RestartCompleted { success: true },
            &callbacks,
        );

        assert_eq!(failures, 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["after:audio:restart_completed".to_string()]
        );
    }

    #[test]
    fn test_add_requires_tracked_module() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = EventNotifier::new();
        assert!(notifier.add("ghost", recorder(&log, "x")).is_none());

        notifier.track("ghost");
        let id = notifier.add("ghost", recorder(&log, "x")).unwrap();
        assert_eq!(notifier.callback_count("ghost"), 1);

        assert!(notifier.remove("ghost", id));
        assert!(!notifier.remove("ghost", id));
        assert_eq!(notifier.callback_count("ghost"), 0);

        notifier.add("ghost", recorder(&log, "x")).unwrap();
        notifier.forget("ghost");
        assert!(notifier.callbacks_for("ghost").is_empty());
    }

    #[test]
    fn test_event_names_and_payloads() {
        let completed = RecoveryEvent::RestartCompleted { success: false };
        assert_eq!(completed.name(), "restart_completed");
        assert_eq!(completed.payload(), serde_json::json!({"success": false}));
        assert_eq!(RecoveryEvent::FallbackEnabled.payload(), serde_json::json!({}));

        let json = serde_json::to_value(completed).unwrap();
        assert_eq!(json["event"], "restart_completed");
        assert_eq!(json["success"], false);
    }
}
