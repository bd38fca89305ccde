/*!
 * Supervised demo with randomly failing modules
 *
 * Three simulated modules (`storage`, `calendar` and `voice`, the latter two
 * depending on `storage`) fail at random while the recovery manager restarts
 * them, switches them to fallback and cascades recovery.
 */

use crate::error::{Result, ReviveError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use revive_supervisor::{
    ErrorInfo, EventEmitter, LedgerStats, Module, ModuleEvent, ModuleHealth, ModuleResult,
    ModuleState, ModuleStatus, RecoveryConfig, RecoveryEvent, RecoveryManager, RecoveryRecord,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Demo run parameters
#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Simulation steps
    pub ticks: u32,
    /// Pause between steps
    pub tick_interval: Duration,
    /// Seed for the failure injection
    pub seed: u64,
    /// Probability that a module call or tick fails
    pub failure_rate: f64,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            ticks: 20,
            tick_interval: Duration::from_millis(50),
            seed: 7,
            failure_rate: 0.2,
        }
    }
}

impl DemoOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(ReviveError::Config(format!(
                "failure_rate must be between 0 and 1, got {}",
                self.failure_rate
            )));
        }
        Ok(())
    }
}

/// Outcome of a demo run
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub generated_at: DateTime<Utc>,
    pub ticks: u32,
    pub events_notified: usize,
    pub health: BTreeMap<String, ModuleHealth>,
    pub history: Vec<RecoveryRecord>,
    pub ledger: LedgerStats,
}

/// Module that fails with a fixed probability
pub struct FlakyModule {
    id: String,
    events: EventEmitter,
    failure_rate: f64,
    rng: Mutex<StdRng>,
    initialized: AtomicBool,
    fallback: AtomicBool,
}

impl FlakyModule {
    pub fn new(id: impl Into<String>, failure_rate: f64, seed: u64) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            events: EventEmitter::new(),
            failure_rate: if failure_rate.is_nan() {
                0.0
            } else {
                failure_rate.clamp(0.0, 1.0)
            },
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            initialized: AtomicBool::new(false),
            fallback: AtomicBool::new(false),
        })
    }

    fn fails(&self) -> bool {
        self.rng
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .random_bool(self.failure_rate)
    }

    /// One simulation step: maybe lose initialization and report an error
    pub async fn tick(&self) {
        if !self.fails() {
            return;
        }

        self.initialized.store(false, Ordering::SeqCst);
        self.events
            .emit(ModuleEvent::Error(
                ErrorInfo::new(&self.id, "simulated fault")
                    .with_context("tick")
                    .with_type("simulated"),
            ))
            .await;
    }
}

#[async_trait]
impl Module for FlakyModule {
    fn id(&self) -> &str {
        &self.id
    }

    fn events(&self) -> &EventEmitter {
        &self.events
    }

    async fn initialize(&self) -> ModuleResult<bool> {
        let ok = !self.fails();
        self.initialized.store(ok, Ordering::SeqCst);
        Ok(ok)
    }

    async fn restart(&self) -> ModuleResult<bool> {
        let ok = !self.fails();
        if ok {
            self.initialized.store(true, Ordering::SeqCst);
            self.fallback.store(false, Ordering::SeqCst);
        }
        Ok(ok)
    }

    async fn enable_fallback_mode(&self) -> ModuleResult<bool> {
        self.fallback.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn disable_fallback_mode(&self) -> ModuleResult<bool> {
        if self.fails() {
            return Ok(false);
        }
        self.fallback.store(false, Ordering::SeqCst);
        self.initialized.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn status(&self) -> ModuleResult<ModuleStatus> {
        let status = if self.initialized.load(Ordering::SeqCst) {
            ModuleStatus::initialized()
        } else {
            ModuleStatus::uninitialized()
        };
        Ok(status
            .with("fallback", self.fallback.load(Ordering::SeqCst))
            .with("failure_rate", self.failure_rate))
    }
}

/// Run the demo to completion and collect a report
pub async fn run_demo(recovery: RecoveryConfig, options: &DemoOptions) -> Result<DemoReport> {
    options.validate()?;
    let manager = RecoveryManager::new(recovery)?;

    let storage = FlakyModule::new("storage", options.failure_rate / 2.0, options.seed);
    let calendar = FlakyModule::new("calendar", options.failure_rate, options.seed.wrapping_add(1));
    let voice = FlakyModule::new("voice", options.failure_rate, options.seed.wrapping_add(2));

    manager.register(storage.clone(), &[]).await;
    manager.register(calendar.clone(), &["storage"]).await;
    manager.register(voice.clone(), &["storage"]).await;
    let modules = [storage, calendar, voice];

    let notified = Arc::new(AtomicUsize::new(0));
    for module in &modules {
        let counter = Arc::clone(&notified);
        manager
            .register_callback(module.id(), move |module_id: &str, event: &RecoveryEvent| {
                counter.fetch_add(1, Ordering::Relaxed);
                info!(module_id, event = event.name(), payload = %event.payload(), "Recovery event");
                Ok(())
            })
            .await;
    }

    for module_id in manager.initialize_all().await {
        info!(module_id = %module_id, "Initialization failed, forcing restart");
        manager.restart(&module_id, true).await;
    }

    manager.start_monitoring();

    for tick in 0..options.ticks {
        debug!(tick, "Demo tick");
        for module in &modules {
            module.tick().await;
        }

        for module_id in manager.module_ids().await {
            if manager.state(&module_id).await == Some(ModuleState::Failed) {
                manager.restart(&module_id, false).await;
            }
        }

        tokio::time::sleep(options.tick_interval).await;
    }

    manager.stop_monitoring().await;

    let report = DemoReport {
        generated_at: Utc::now(),
        ticks: options.ticks,
        events_notified: notified.load(Ordering::Relaxed),
        health: manager.all_health().await,
        history: manager.history(None, manager.config().history_capacity).await,
        ledger: manager.ledger_stats().await,
    };

    info!(
        ticks = report.ticks,
        records = report.history.len(),
        events = report.events_notified,
        "Demo finished"
    );
    Ok(report)
}
