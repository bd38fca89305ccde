//! Testing utilities for code built on the recovery manager
//!
//! [`MockModule`] is a scriptable [`Module`] whose capability calls succeed,
//! refuse, fail or panic on demand and count how often they were invoked.
//! [`RecordingObserver`] captures every recovery event it is notified of.
//!
//! ## Example
//!
//! ```
//! use revive_supervisor::testing::{MockModule, Outcome, RecordingObserver};
//! use revive_supervisor::RecoveryManager;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let manager = RecoveryManager::with_defaults();
//! let module = MockModule::new("audio");
//! module.set_restart_outcome(Outcome::Refuse);
//! manager.register(module.clone(), &[]).await;
//!
//! let observer = RecordingObserver::new();
//! manager.register_callback("audio", observer.callback()).await;
//!
//! assert!(!manager.restart("audio", true).await);
//! assert_eq!(observer.names(), vec!["restart_started", "restart_completed"]);
//! # }
//! ```

use crate::module::{
    ErrorInfo, EventEmitter, Module, ModuleError, ModuleEvent, ModuleResult, ModuleStatus,
    StatusChange,
};
use crate::notifier::RecoveryEvent;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Scripted result of a mock capability call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `Ok(true)`
    Succeed,
    /// `Ok(false)`
    Refuse,
    /// `Err(ModuleError::Failed(..))`
    Fail(String),
    /// Panic with the message
    Panic(String),
}

impl Outcome {
    fn resolve(self) -> ModuleResult<bool> {
        match self {
            Outcome::Succeed => Ok(true),
            Outcome::Refuse => Ok(false),
            Outcome::Fail(message) => Err(ModuleError::Failed(message)),
            Outcome::Panic(message) => panic!("{message}"),
        }
    }
}

/// Queued outcomes consumed first, then a default for every later call
#[derive(Debug)]
struct Script {
    queued: VecDeque<Outcome>,
    default: Outcome,
}

impl Script {
    fn new() -> Self {
        Self {
            queued: VecDeque::new(),
            default: Outcome::Succeed,
        }
    }

    fn next(&mut self) -> Outcome {
        self.queued
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }
}

#[derive(Debug, Default)]
struct CallCounts {
    initialize: AtomicUsize,
    restart: AtomicUsize,
    enable_fallback: AtomicUsize,
    disable_fallback: AtomicUsize,
    status: AtomicUsize,
}

/// Scriptable module test double
#[derive(Debug)]
pub struct MockModule {
    id: String,
    events: EventEmitter,
    initialized: AtomicBool,
    initialize_script: Mutex<Script>,
    restart_script: Mutex<Script>,
    fallback_script: Mutex<Script>,
    status_error: Mutex<Option<String>>,
    restart_delay: Mutex<Option<Duration>>,
    fallback_delay: Mutex<Option<Duration>>,
    status_delay: Mutex<Option<Duration>>,
    error_during_restart: AtomicBool,
    calls: CallCounts,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockModule {
    /// Create an initialized module whose calls all succeed
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            events: EventEmitter::new(),
            initialized: AtomicBool::new(true),
            initialize_script: Mutex::new(Script::new()),
            restart_script: Mutex::new(Script::new()),
            fallback_script: Mutex::new(Script::new()),
            status_error: Mutex::new(None),
            restart_delay: Mutex::new(None),
            fallback_delay: Mutex::new(None),
            status_delay: Mutex::new(None),
            error_during_restart: AtomicBool::new(false),
            calls: CallCounts::default(),
        })
    }

    pub fn set_initialize_outcome(&self, outcome: Outcome) {
        lock(&self.initialize_script).default = outcome;
    }

    /// Outcome of every restart not covered by a queued outcome
    pub fn set_restart_outcome(&self, outcome: Outcome) {
        lock(&self.restart_script).default = outcome;
    }

    /// Outcome of the next restart only
    pub fn push_restart_outcome(&self, outcome: Outcome) {
        lock(&self.restart_script).queued.push_back(outcome);
    }

    /// Outcome of both fallback toggles
    pub fn set_fallback_outcome(&self, outcome: Outcome) {
        lock(&self.fallback_script).default = outcome;
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Make `status()` fail with the message, or clear the failure
    pub fn set_status_error(&self, error: Option<String>) {
        *lock(&self.status_error) = error;
    }

    /// Sleep inside `restart()` before resolving the outcome
    pub fn set_restart_delay(&self, delay: Option<Duration>) {
        *lock(&self.restart_delay) = delay;
    }

    /// Sleep inside both fallback toggles before resolving the outcome
    pub fn set_fallback_delay(&self, delay: Option<Duration>) {
        *lock(&self.fallback_delay) = delay;
    }

    /// Sleep inside `status()` before answering
    pub fn set_status_delay(&self, delay: Option<Duration>) {
        *lock(&self.status_delay) = delay;
    }

    /// Emit an error event from inside `restart()`
    pub fn set_error_during_restart(&self, enabled: bool) {
        self.error_during_restart.store(enabled, Ordering::SeqCst);
    }

    /// Emit an error event to every bound sink
    pub async fn report_error(&self, error: &str) {
        self.events
            .emit(ModuleEvent::Error(
                ErrorInfo::new(&self.id, error).with_context("mock"),
            ))
            .await;
    }

    /// Emit a status change event to every bound sink
    pub async fn report_status_change(&self, key: &str, value: serde_json::Value) {
        let mut details = serde_json::Map::new();
        details.insert(key.to_string(), value);
        self.events
            .emit(ModuleEvent::StatusChange(StatusChange {
                module_id: self.id.clone(),
                details,
            }))
            .await;
    }

    async fn fallback_pause(&self) {
        let delay = *lock(&self.fallback_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn bound_sinks(&self) -> usize {
        self.events.sink_count()
    }

    pub fn initialize_calls(&self) -> usize {
        self.calls.initialize.load(Ordering::SeqCst)
    }

    pub fn restart_calls(&self) -> usize {
        self.calls.restart.load(Ordering::SeqCst)
    }

    pub fn enable_fallback_calls(&self) -> usize {
        self.calls.enable_fallback.load(Ordering::SeqCst)
    }

    pub fn disable_fallback_calls(&self) -> usize {
        self.calls.disable_fallback.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.calls.status.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Module for MockModule {
    fn id(&self) -> &str {
        &self.id
    }

    fn events(&self) -> &EventEmitter {
        &self.events
    }

    async fn initialize(&self) -> ModuleResult<bool> {
        self.calls.initialize.fetch_add(1, Ordering::SeqCst);
        let outcome = lock(&self.initialize_script).next();
        let result = outcome.resolve();
        if matches!(result, Ok(true)) {
            self.set_initialized(true);
        }
        result
    }

    async fn restart(&self) -> ModuleResult<bool> {
        self.calls.restart.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.restart_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.error_during_restart.load(Ordering::SeqCst) {
            self.report_error("error while restarting").await;
        }

        let outcome = lock(&self.restart_script).next();
        let result = outcome.resolve();
        if matches!(result, Ok(true)) {
            self.set_initialized(true);
        }
        result
    }

    async fn enable_fallback_mode(&self) -> ModuleResult<bool> {
        self.calls.enable_fallback.fetch_add(1, Ordering::SeqCst);
        self.fallback_pause().await;
        let outcome = lock(&self.fallback_script).next();
        outcome.resolve()
    }

    async fn disable_fallback_mode(&self) -> ModuleResult<bool> {
        self.calls.disable_fallback.fetch_add(1, Ordering::SeqCst);
        self.fallback_pause().await;
        let outcome = lock(&self.fallback_script).next();
        outcome.resolve()
    }

    async fn status(&self) -> ModuleResult<ModuleStatus> {
        self.calls.status.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.status_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let error = lock(&self.status_error).clone();
        if let Some(message) = error {
            return Err(ModuleError::Failed(message));
        }

        let status = if self.is_initialized() {
            ModuleStatus::initialized()
        } else {
            ModuleStatus::uninitialized()
        };
        Ok(status.with("mock", true))
    }
}

/// Captures recovery events delivered through manager callbacks
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<(String, RecoveryEvent)>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback to hand to `RecoveryManager::register_callback`
    pub fn callback(
        &self,
    ) -> impl Fn(&str, &RecoveryEvent) -> anyhow::Result<()> + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |module_id: &str, event: &RecoveryEvent| -> anyhow::Result<()> {
            lock(&events).push((module_id.to_string(), *event));
            Ok(())
        }
    }

    /// Every captured `(module_id, event)` pair, in delivery order
    pub fn events(&self) -> Vec<(String, RecoveryEvent)> {
        lock(&self.events).clone()
    }

    /// Names of the captured events, in delivery order
    pub fn names(&self) -> Vec<&'static str> {
        lock(&self.events).iter().map(|(_, e)| e.name()).collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}
