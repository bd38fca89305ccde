//! Integration tests for the background health monitor
//!
//! Time is paused so interval ticks are deterministic.

use revive_supervisor::testing::MockModule;
use revive_supervisor::{ModuleState, RecoveryConfig, RecoveryManager, MONITOR_STOP_TIMEOUT};
use std::time::Duration;
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_secs(30);

fn manager() -> RecoveryManager {
    RecoveryManager::new(RecoveryConfig {
        health_check_interval: INTERVAL,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_monitor_polls_every_interval() {
    let manager = manager();
    let module = MockModule::new("display");
    manager.register(module.clone(), &[]).await;

    assert!(manager.start_monitoring());
    assert!(manager.is_monitoring());
    assert!(!manager.start_monitoring());

    // First pass runs immediately
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(module.status_calls(), 1);
    assert_eq!(manager.state("display").await, Some(ModuleState::Healthy));

    module.set_initialized(false);
    tokio::time::sleep(INTERVAL).await;
    assert_eq!(module.status_calls(), 2);
    assert_eq!(manager.state("display").await, Some(ModuleState::Degraded));

    manager.stop_monitoring().await;
    assert!(!manager.is_monitoring());

    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(module.status_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_never_overrides_restarting() {
    let manager = manager();
    let module = MockModule::new("network");
    module.set_initialized(false);
    module.set_restart_delay(Some(INTERVAL * 2));
    manager.register(module.clone(), &[]).await;

    let background = manager.clone();
    let restart = tokio::spawn(async move { background.restart("network", true).await });
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(manager.state("network").await, Some(ModuleState::Restarting));

    manager.start_monitoring();
    tokio::time::sleep(INTERVAL + Duration::from_millis(1)).await;
    assert!(module.status_calls() >= 2);
    assert_eq!(manager.state("network").await, Some(ModuleState::Restarting));

    assert!(restart.await.unwrap());
    assert_eq!(manager.state("network").await, Some(ModuleState::Healthy));
    manager.stop_monitoring().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_aborts_stuck_pass_after_timeout() {
    let manager = manager();
    let module = MockModule::new("sensor");
    module.set_status_delay(Some(Duration::from_secs(600)));
    manager.register(module.clone(), &[]).await;

    manager.start_monitoring();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(module.status_calls(), 1);

    let started = Instant::now();
    manager.stop_monitoring().await;
    let waited = started.elapsed();

    assert!(waited >= MONITOR_STOP_TIMEOUT);
    assert!(waited < Duration::from_secs(600));
    assert!(!manager.is_monitoring());
}

#[tokio::test(start_paused = true)]
async fn test_monitor_exits_when_manager_dropped() {
    let manager = manager();
    let module = MockModule::new("display");
    manager.register(module.clone(), &[]).await;

    manager.start_monitoring();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(module.status_calls(), 1);

    drop(manager);
    tokio::time::sleep(INTERVAL * 4).await;
    assert_eq!(module.status_calls(), 1);
}

#[tokio::test]
async fn test_stop_without_start_is_noop() {
    let manager = manager();
    assert!(!manager.is_monitoring());
    manager.stop_monitoring().await;
    assert!(!manager.is_monitoring());
}
