//! Health Monitor: periodic status polling of every registered module
//!
//! A single background task runs one health pass per `health_check_interval`,
//! starting immediately. The task holds only a weak reference to the manager,
//! so dropping the last [`RecoveryManager`] handle also ends the task.
//!
//! Rules applied per module and pass:
//!
//! - status reports `initialized == false`: degrade unless `Restarting` or `Failed`
//! - status query fails: degrade only a `Healthy` module
//!
//! A health pass never escalates beyond `Degraded` and never restarts anything.

use crate::config::MONITOR_STOP_TIMEOUT;
use crate::manager::{ManagerInner, RecoveryManager};
use crate::module::{guarded, upgrade, Module};
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Summary of one health pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthPassStats {
    /// Modules probed
    pub checked: usize,
    /// Modules whose state was lowered to `Degraded`
    pub degraded: usize,
    /// Status queries that failed
    pub errors: usize,
}

/// Running monitor task and its stop signal
pub(crate) struct MonitorHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RecoveryManager {
    /// Probe every registered module once, in registration order
    pub async fn run_health_check(&self) -> HealthPassStats {
        let targets: Vec<(String, Weak<dyn Module>)> = {
            let guard = self.inner.state.lock().await;
            guard
                .registry
                .iter()
                .map(|(id, entry)| (id.to_string(), entry.handle.clone()))
                .collect()
        };

        let mut stats = HealthPassStats::default();

        for (module_id, handle) in targets {
            let probe = match upgrade(&module_id, &handle) {
                Ok(module) => guarded(module.status()).await,
                Err(e) => Err(e),
            };
            stats.checked += 1;

            let mut guard = self.inner.state.lock().await;
            let Some(entry) = guard.registry.get_mut(&module_id) else {
                continue;
            };

            let previous = entry.state;
            let next = match &probe {
                Ok(status) if status.initialized => previous,
                Ok(_) => previous.on_uninitialized_probe(),
                Err(e) => {
                    stats.errors += 1;
                    warn!(module_id = %module_id, error = %e, "Health check failed");
                    previous.on_probe_error()
                }
            };

            if next != previous {
                entry.state = next;
                stats.degraded += 1;
                warn!(
                    module_id = %module_id,
                    from = %previous,
                    to = %next,
                    "Health check degraded module"
                );
            }
        }

        debug!(
            checked = stats.checked,
            degraded = stats.degraded,
            errors = stats.errors,
            "Health pass complete"
        );
        stats
    }

    /// Start the background health monitor.
    ///
    /// Returns `false` if it is already running or no tokio runtime is
    /// available.
    pub fn start_monitoring(&self) -> bool {
        let mut monitor = self.inner.monitor.lock().unwrap_or_else(|e| e.into_inner());
        if monitor.as_ref().is_some_and(|h| !h.task.is_finished()) {
            debug!("Health monitor already running");
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "Cannot start health monitor outside a tokio runtime");
                return false;
            }
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let period = self.inner.config.health_check_interval;
        let task = runtime.spawn(run_monitor_loop(
            Arc::downgrade(&self.inner),
            period,
            shutdown_rx,
        ));

        *monitor = Some(MonitorHandle { shutdown_tx, task });
        info!(interval_secs = period.as_secs_f64(), "Health monitor started");
        true
    }

    /// Stop the background health monitor.
    ///
    /// Waits up to [`MONITOR_STOP_TIMEOUT`] for an in-flight pass to finish,
    /// then aborts the task.
    pub async fn stop_monitoring(&self) {
        let handle = self
            .inner
            .monitor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let Some(MonitorHandle {
            shutdown_tx,
            mut task,
        }) = handle
        else {
            debug!("Health monitor not running");
            return;
        };

        // The task may already have exited, dropping the receiver
        let _ = shutdown_tx.send(());

        match tokio::time::timeout(MONITOR_STOP_TIMEOUT, &mut task).await {
            Ok(Ok(())) => info!("Health monitor stopped"),
            Ok(Err(e)) => error!(error = %e, "Health monitor task ended abnormally"),
            Err(_) => {
                warn!(
                    timeout_secs = MONITOR_STOP_TIMEOUT.as_secs(),
                    "Health monitor did not stop in time, aborting"
                );
                task.abort();
            }
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner
            .monitor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }
}

async fn run_monitor_loop(
    inner: Weak<ManagerInner>,
    period: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else {
                    debug!("Recovery manager dropped, health monitor exiting");
                    break;
                };
                RecoveryManager { inner }.run_health_check().await;
            }

            _ = &mut shutdown_rx => {
                debug!("Health monitor shutdown signal received");
                break;
            }
        }
    }
}
