/*!
 * Revive command line interface
 */

use anyhow::Context;
use clap::{Parser, Subcommand};
use revive::{
    config::AppConfig,
    demo::{run_demo, DemoOptions},
    error::{ReviveError, EXIT_FATAL, EXIT_SUCCESS},
    logging,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "revive")]
#[command(version, about = "Module recovery manager: restart, fallback and cascading recovery", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and print the effective settings
    CheckConfig {
        /// File to validate
        file: PathBuf,
    },

    /// Run a supervised demo with randomly failing modules
    Demo {
        /// Simulation steps
        #[arg(long, default_value_t = 20)]
        ticks: u32,

        /// Pause between steps in milliseconds
        #[arg(long, default_value_t = 50)]
        tick_ms: u64,

        /// Seed for the failure injection
        #[arg(long, default_value_t = 7)]
        seed: u64,

        /// Probability of a simulated fault per module and step
        #[arg(long, default_value_t = 0.2)]
        failure_rate: f64,
    },
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code(&e)
        }
    };
    std::process::exit(code);
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ReviveError>()
        .map_or(EXIT_FATAL, ReviveError::exit_code)
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckConfig { file } => check_config(&file),
        Commands::Demo {
            ticks,
            tick_ms,
            seed,
            failure_rate,
        } => {
            let mut config = match &cli.config {
                Some(path) => AppConfig::load(path)?,
                None => AppConfig::default(),
            };
            config.verbose |= cli.verbose;

            if let Err(e) = logging::init_logging(&config) {
                eprintln!("Warning: Failed to initialize logging: {}", e);
            }

            let options = DemoOptions {
                ticks,
                tick_interval: Duration::from_millis(tick_ms),
                seed,
                failure_rate,
            };

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            let report = runtime.block_on(run_demo(config.recovery.clone(), &options))?;

            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn check_config(path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load(path)?;
    println!("Configuration OK: {}", path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
