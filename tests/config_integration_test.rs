//! Integration tests for configuration files and the demo driver

use anyhow::Result;
use revive::config::{AppConfig, LogLevel};
use revive::demo::{run_demo, DemoOptions};
use revive::error::ReviveError;
use revive::RecoveryManager;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_config_file_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("revive.toml");

    let mut config = AppConfig {
        log_level: LogLevel::Warn,
        log_file: Some(dir.path().join("revive.log")),
        ..Default::default()
    };
    config.recovery.max_restart_attempts = 5;
    config.recovery.restart_cooldown = Duration::from_millis(2500);
    config.to_file(&path)?;

    let loaded = AppConfig::load(&path)?;
    assert_eq!(loaded, config);
    Ok(())
}

#[test]
fn test_load_rejects_invalid_values() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("revive.toml");
    std::fs::write(
        &path,
        r#"
        [recovery]
        health_check_interval = 0
        "#,
    )?;

    // Parses fine, fails validation
    assert!(AppConfig::from_file(&path).is_ok());
    assert!(matches!(
        AppConfig::load(&path),
        Err(ReviveError::Recovery(_))
    ));
    Ok(())
}

#[test]
fn test_load_reports_missing_and_malformed_files() -> Result<()> {
    let dir = tempdir()?;

    let missing = dir.path().join("missing.toml");
    assert!(matches!(
        AppConfig::load(&missing),
        Err(ReviveError::ConfigIo { .. })
    ));

    let malformed = dir.path().join("malformed.toml");
    std::fs::write(&malformed, "[recovery\nmax_restart_attempts = ")?;
    assert!(matches!(
        AppConfig::load(&malformed),
        Err(ReviveError::ConfigParse(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_loaded_config_drives_manager() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("revive.toml");
    std::fs::write(
        &path,
        r#"
        [recovery]
        max_restart_attempts = 1
        restart_cooldown = 0
        "#,
    )?;

    let config = AppConfig::load(&path)?;
    let manager = RecoveryManager::new(config.recovery)?;
    assert_eq!(manager.config().max_restart_attempts, 1);
    assert_eq!(manager.config().restart_cooldown, Duration::ZERO);
    Ok(())
}

#[tokio::test]
async fn test_demo_report_is_consistent() -> Result<()> {
    let options = DemoOptions {
        ticks: 10,
        tick_interval: Duration::from_millis(1),
        seed: 42,
        failure_rate: 0.5,
    };
    let mut recovery = AppConfig::default().recovery;
    recovery.restart_cooldown = Duration::ZERO;
    recovery.history_capacity = 50;

    let report = run_demo(recovery, &options).await?;

    assert_eq!(report.ticks, 10);
    assert_eq!(
        report.health.keys().cloned().collect::<Vec<_>>(),
        vec!["calendar", "storage", "voice"]
    );
    assert!(report.history.len() <= 50);
    assert_eq!(report.history.len(), report.ledger.retained);

    let json = serde_json::to_value(&report)?;
    assert!(json["health"]["storage"]["state"].is_string());
    Ok(())
}
