//! Recovery Manager: registration, restart orchestration, fallback and cascade
//!
//! [`RecoveryManager`] is a cheap `Clone` handle around shared state. All
//! bookkeeping lives behind a single async mutex which is released before any
//! module capability call or observer callback, so modules may emit events
//! and observers may query the manager from inside those calls.

use crate::config::RecoveryConfig;
use crate::module::{guarded, upgrade, ErrorInfo, Module, ModuleEvent, ModuleEventSink, ModuleResult, ModuleStatus};
use crate::monitor::MonitorHandle;
use crate::notifier::{CallbackId, EventNotifier, RecoveryCallback, RecoveryEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use revive_core_recovery::{
    LedgerStats, ModuleRegistry, ModuleState, RecoveryAction, RecoveryError, RecoveryLedger,
    RecoveryRecord, RestartDecision, RestartPolicy,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Number of records `history` callers usually ask for
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Point-in-time health report for one module
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleHealth {
    pub module_id: String,
    pub state: ModuleState,
    /// Restart attempts since the last successful restart
    pub restart_count: u32,
    pub last_restart: Option<DateTime<Utc>>,
    /// Whether a non-forced restart would be permitted right now
    pub can_restart: bool,
    /// `None` when the status query failed or the module was dropped
    pub module_status: Option<ModuleStatus>,
}

/// Bookkeeping guarded by the manager's lock
pub(crate) struct SupervisorState {
    pub(crate) registry: ModuleRegistry<Weak<dyn Module>>,
    pub(crate) ledger: RecoveryLedger,
    pub(crate) notifier: EventNotifier,
}

pub(crate) struct ManagerInner {
    pub(crate) config: RecoveryConfig,
    pub(crate) policy: RestartPolicy,
    pub(crate) state: Mutex<SupervisorState>,
    /// Sink bound to every registered module
    pub(crate) sink: Arc<dyn ModuleEventSink>,
    pub(crate) monitor: StdMutex<Option<MonitorHandle>>,
}

/// Forwards module events into the manager without keeping it alive
struct ManagerSink {
    inner: Weak<ManagerInner>,
}

#[async_trait]
impl ModuleEventSink for ManagerSink {
    async fn on_module_event(&self, event: ModuleEvent) {
        match self.inner.upgrade() {
            Some(inner) => RecoveryManager { inner }.handle_module_event(event).await,
            None => debug!(module_id = event.module_id(), "Recovery manager gone; dropping module event"),
        }
    }
}

/// Supervisor for a set of pluggable modules
#[derive(Clone)]
pub struct RecoveryManager {
    pub(crate) inner: Arc<ManagerInner>,
}

impl RecoveryManager {
    /// Create a manager with a validated configuration
    pub fn new(config: RecoveryConfig) -> Result<Self, RecoveryError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create a manager with the default configuration
    pub fn with_defaults() -> Self {
        Self::build(RecoveryConfig::default())
    }

    fn build(config: RecoveryConfig) -> Self {
        let policy = config.restart_policy();
        let ledger = RecoveryLedger::new(config.history_capacity);

        let inner = Arc::new_cyclic(|weak: &Weak<ManagerInner>| ManagerInner {
            sink: Arc::new(ManagerSink {
                inner: weak.clone(),
            }),
            config,
            policy,
            state: Mutex::new(SupervisorState {
                registry: ModuleRegistry::new(),
                ledger,
                notifier: EventNotifier::new(),
            }),
            monitor: StdMutex::new(None),
        });

        Self { inner }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.inner.config
    }

    /// Start supervising a module.
    ///
    /// The manager keeps only a weak handle; the caller stays the owner.
    /// Registering an id again resets its state, restart tracking and
    /// callbacks, and moves the event subscription to the new module.
    pub async fn register(&self, module: Arc<dyn Module>, dependencies: &[&str]) {
        let module_id = module.id().to_string();
        let deps: Vec<String> = dependencies.iter().map(|d| d.to_string()).collect();

        let previous = {
            let mut guard = self.inner.state.lock().await;
            let st = &mut *guard;
            let previous = st
                .registry
                .insert(&module_id, Arc::downgrade(&module), deps.clone());
            st.notifier.track(&module_id);
            previous
        };

        if let Some(old) = previous.and_then(|entry| entry.handle.upgrade()) {
            old.unbind(&self.inner.sink);
            debug!(module_id = %module_id, "Replaced existing registration");
        }
        module.bind(Arc::clone(&self.inner.sink));

        info!(module_id = %module_id, dependencies = ?deps, "Registered module");
    }

    /// Stop supervising a module and discard everything tracked for it
    pub async fn unregister(&self, module_id: &str) -> Result<(), RecoveryError> {
        let removed = {
            let mut guard = self.inner.state.lock().await;
            let st = &mut *guard;
            let removed = st.registry.remove(module_id);
            if removed.is_some() {
                st.notifier.forget(module_id);
            }
            removed
        };

        let entry = removed.ok_or_else(|| RecoveryError::NotFound(module_id.to_string()))?;
        if let Some(module) = entry.handle.upgrade() {
            module.unbind(&self.inner.sink);
        }

        info!(module_id, "Unregistered module");
        Ok(())
    }

    /// Restart a module, then try to recover its direct dependents.
    ///
    /// Without `force` the restart policy may deny the request, in which case
    /// the module is not touched. Returns whether the module reported a
    /// successful restart.
    pub async fn restart(&self, module_id: &str, force: bool) -> bool {
        self.perform_restart(module_id, force, true).await
    }

    /// Restart one module. With `cascade`, a success recovers the direct
    /// dependents before the restart is recorded and announced.
    async fn perform_restart(&self, module_id: &str, force: bool, cascade: bool) -> bool {
        let (handle, generation, attempt, callbacks) = {
            let mut guard = self.inner.state.lock().await;
            let st = &mut *guard;

            let Some(entry) = st.registry.get_mut(module_id) else {
                warn!(module_id, "Restart requested for unknown module");
                return false;
            };

            let now = Utc::now();
            if !force {
                if let RestartDecision::Deny(reason) = self.inner.policy.evaluate(&entry.tracking, now) {
                    info!(module_id, reason = %reason, "Restart denied");
                    return false;
                }
            }

            entry.tracking.record_attempt(now);
            entry.state = ModuleState::Restarting;

            (
                entry.handle.clone(),
                entry.generation,
                entry.tracking.attempt_count,
                st.notifier.callbacks_for(module_id),
            )
        };

        info!(module_id, attempt, force, "Restarting module");
        EventNotifier::dispatch(module_id, &RecoveryEvent::RestartStarted, &callbacks);

        let result = match upgrade(module_id, &handle) {
            Ok(module) => guarded(module.restart()).await,
            Err(e) => Err(e),
        };
        let success = call_succeeded(module_id, "restart", result);

        let (recorded_attempts, fallback_due) = {
            let mut guard = self.inner.state.lock().await;
            let outcome = match guard.registry.get_mut(module_id) {
                Some(entry) if entry.generation == generation => {
                    if success {
                        entry.state = ModuleState::Healthy;
                        entry.tracking.reset_attempts();
                    } else {
                        entry.state = ModuleState::Failed;
                    }
                    let count = entry.tracking.attempt_count;
                    (count, !success && count >= self.inner.policy.max_attempts)
                }
                _ => {
                    debug!(module_id, "Registration changed during restart; state left untouched");
                    (attempt, false)
                }
            };
            outcome
        };

        if success {
            info!(module_id, attempt, "Module restarted successfully");
            if cascade {
                Box::pin(self.recover_dependents(module_id)).await;
            }
        } else {
            warn!(module_id, attempt, "Module restart failed");
            if fallback_due {
                warn!(
                    module_id,
                    attempt,
                    max_attempts = self.inner.policy.max_attempts,
                    "Restart limit reached, enabling fallback mode"
                );
                self.enable_fallback(module_id).await;
            }
        }

        let callbacks = {
            let mut guard = self.inner.state.lock().await;
            let st = &mut *guard;
            st.ledger.append(RecoveryRecord::new(
                module_id,
                RecoveryAction::Restart,
                success,
                recorded_attempts,
            ));
            st.notifier.callbacks_for(module_id)
        };
        EventNotifier::dispatch(module_id, &RecoveryEvent::RestartCompleted { success }, &callbacks);

        success
    }

    /// One-shot recovery of the direct dependents of a module that just
    /// restarted. Recovered dependents do not cascade further.
    async fn recover_dependents(&self, module_id: &str) {
        let dependents = self.inner.state.lock().await.registry.dependents_of(module_id);

        for dependent in dependents {
            let state = self.inner.state.lock().await.registry.state(&dependent);
            match state {
                Some(ModuleState::Failed) => {
                    info!(module_id = %dependent, dependency = module_id, "Cascading restart to dependent");
                    self.perform_restart(&dependent, false, false).await;
                }
                Some(ModuleState::Fallback) => {
                    info!(module_id = %dependent, dependency = module_id, "Cascading fallback exit to dependent");
                    self.disable_fallback(&dependent).await;
                }
                _ => {}
            }
        }
    }

    /// Switch a module into fallback mode
    pub async fn enable_fallback(&self, module_id: &str) -> bool {
        self.toggle_fallback(module_id, true).await
    }

    /// Bring a module out of fallback mode
    pub async fn disable_fallback(&self, module_id: &str) -> bool {
        self.toggle_fallback(module_id, false).await
    }

    async fn toggle_fallback(&self, module_id: &str, enable: bool) -> bool {
        let (action, operation, target, event) = if enable {
            (
                RecoveryAction::FallbackEnable,
                "enable fallback",
                ModuleState::Fallback,
                RecoveryEvent::FallbackEnabled,
            )
        } else {
            (
                RecoveryAction::FallbackDisable,
                "disable fallback",
                ModuleState::Healthy,
                RecoveryEvent::FallbackDisabled,
            )
        };

        let (handle, generation, attempt) = {
            let guard = self.inner.state.lock().await;
            match guard.registry.get(module_id) {
                Some(entry) => (
                    entry.handle.clone(),
                    entry.generation,
                    entry.tracking.attempt_count,
                ),
                None => {
                    warn!(module_id, operation, "Fallback change requested for unknown module");
                    return false;
                }
            }
        };

        let result = match upgrade(module_id, &handle) {
            Ok(module) if enable => guarded(module.enable_fallback_mode()).await,
            Ok(module) => guarded(module.disable_fallback_mode()).await,
            Err(e) => Err(e),
        };
        let success = call_succeeded(module_id, operation, result);

        let callbacks = {
            let mut guard = self.inner.state.lock().await;
            let st = &mut *guard;
            st.ledger
                .append(RecoveryRecord::new(module_id, action, success, attempt));
            if success {
                match st.registry.get_mut(module_id) {
                    Some(entry) if entry.generation == generation => entry.state = target,
                    _ => debug!(module_id, operation, "Registration changed during fallback change; state left untouched"),
                }
            }
            st.notifier.callbacks_for(module_id)
        };

        if success {
            info!(module_id, state = %target, "Fallback mode {}", if enable { "enabled" } else { "disabled" });
            EventNotifier::dispatch(module_id, &event, &callbacks);
        }

        success
    }

    pub(crate) async fn handle_module_event(&self, event: ModuleEvent) {
        match event {
            ModuleEvent::Error(info) => self.handle_module_error(info).await,
            ModuleEvent::StatusChange(change) => {
                debug!(module_id = %change.module_id, details = ?change.details, "Module status changed");
            }
        }
    }

    /// Escalate a reported error and restart the module once it has failed
    async fn handle_module_error(&self, info: ErrorInfo) {
        let module_id = info.module_id.as_str();

        let restart_due = {
            let mut guard = self.inner.state.lock().await;
            let Some(entry) = guard.registry.get_mut(module_id) else {
                debug!(module_id, "Error reported by unregistered module");
                return;
            };

            let previous = entry.state;
            entry.state = previous.on_error();
            warn!(
                module_id,
                error = %info.error,
                context = %info.context,
                error_type = %info.error_type,
                from = %previous,
                to = %entry.state,
                "Module reported error"
            );

            previous.escalates_on_error() && self.inner.policy.permits(&entry.tracking, Utc::now())
        };

        if restart_due {
            info!(module_id, "Module failed, attempting automatic restart");
            self.restart(module_id, false).await;
        }
    }

    /// Health snapshot of one module, including a fresh status query
    pub async fn health(&self, module_id: &str) -> Result<ModuleHealth, RecoveryError> {
        let (handle, mut health) = {
            let guard = self.inner.state.lock().await;
            let entry = guard
                .registry
                .get(module_id)
                .ok_or_else(|| RecoveryError::NotFound(module_id.to_string()))?;

            (
                entry.handle.clone(),
                ModuleHealth {
                    module_id: module_id.to_string(),
                    state: entry.state,
                    restart_count: entry.tracking.attempt_count,
                    last_restart: entry.tracking.last_restart,
                    can_restart: self.inner.policy.permits(&entry.tracking, Utc::now()),
                    module_status: None,
                },
            )
        };

        let status = match upgrade(module_id, &handle) {
            Ok(module) => guarded(module.status()).await,
            Err(e) => Err(e),
        };
        match status {
            Ok(status) => health.module_status = Some(status),
            Err(e) => warn!(module_id, error = %e, "Status query failed"),
        }

        Ok(health)
    }

    /// Health snapshot of every registered module
    pub async fn all_health(&self) -> BTreeMap<String, ModuleHealth> {
        let mut report = BTreeMap::new();
        for module_id in self.module_ids().await {
            // Skips modules unregistered while the report was being built
            if let Ok(health) = self.health(&module_id).await {
                report.insert(module_id, health);
            }
        }
        report
    }

    pub async fn state(&self, module_id: &str) -> Option<ModuleState> {
        self.inner.state.lock().await.registry.state(module_id)
    }

    /// Registered module ids in registration order
    pub async fn module_ids(&self) -> Vec<String> {
        self.inner.state.lock().await.registry.ids().to_vec()
    }

    /// Declared dependencies of every module that has any
    pub async fn dependencies(&self) -> HashMap<String, Vec<String>> {
        self.inner.state.lock().await.registry.dependency_map()
    }

    /// Modules that depend on `module_id`
    pub async fn dependents_of(&self, module_id: &str) -> Vec<String> {
        self.inner.state.lock().await.registry.dependents_of(module_id)
    }

    /// Recent recovery records, most recent last
    pub async fn history(&self, module_id: Option<&str>, limit: usize) -> Vec<RecoveryRecord> {
        self.inner.state.lock().await.ledger.history(module_id, limit)
    }

    pub async fn ledger_stats(&self) -> LedgerStats {
        self.inner.state.lock().await.ledger.stats()
    }

    /// Observe recovery events of a registered module.
    ///
    /// Returns `None` if the module is not registered.
    pub async fn register_callback<F>(&self, module_id: &str, callback: F) -> Option<CallbackId>
    where
        F: Fn(&str, &RecoveryEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let callback: RecoveryCallback = Arc::new(callback);
        let id = self.inner.state.lock().await.notifier.add(module_id, callback);
        if id.is_none() {
            warn!(module_id, "Callback registration for unknown module ignored");
        }
        id
    }

    pub async fn unregister_callback(&self, module_id: &str, callback_id: CallbackId) -> bool {
        self.inner
            .state
            .lock()
            .await
            .notifier
            .remove(module_id, callback_id)
    }

    /// Initialize every registered module in registration order.
    ///
    /// Modules that fail to initialize are marked `Failed`. Returns their ids.
    pub async fn initialize_all(&self) -> Vec<String> {
        let targets: Vec<(String, Weak<dyn Module>)> = {
            let guard = self.inner.state.lock().await;
            guard
                .registry
                .iter()
                .map(|(id, entry)| (id.to_string(), entry.handle.clone()))
                .collect()
        };

        let mut failed = Vec::new();
        for (module_id, handle) in targets {
            let result = match upgrade(&module_id, &handle) {
                Ok(module) => guarded(module.initialize()).await,
                Err(e) => Err(e),
            };

            if call_succeeded(&module_id, "initialize", result) {
                debug!(module_id = %module_id, "Module initialized");
            } else {
                self.inner
                    .state
                    .lock()
                    .await
                    .registry
                    .set_state(&module_id, ModuleState::Failed);
                failed.push(module_id);
            }
        }

        info!(failed = failed.len(), "Module initialization complete");
        failed
    }
}

impl std::fmt::Debug for RecoveryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryManager")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Collapse a capability call result into success, logging failures
fn call_succeeded(module_id: &str, operation: &str, result: ModuleResult<bool>) -> bool {
    match result {
        Ok(true) => true,
        Ok(false) => {
            warn!(module_id, operation, "Module reported failure");
            false
        }
        Err(e) => {
            error!(module_id, operation, error = %e, "Module call failed");
            false
        }
    }
}
