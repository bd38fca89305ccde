/*!
 * Error types for Revive
 */

use revive_core_recovery::RecoveryError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReviveError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Error, Debug)]
pub enum ReviveError {
    /// Configuration file could not be read or written
    #[error("Config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Configuration values are out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging could not be initialized
    #[error("Logging error: {0}")]
    Logging(String),

    /// Error reported by the recovery manager
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ReviveError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ReviveError::ConfigIo { .. }
            | ReviveError::ConfigParse(_)
            | ReviveError::ConfigSerialize(_)
            | ReviveError::Config(_)
            | ReviveError::Logging(_) => EXIT_FATAL,
            ReviveError::Recovery(RecoveryError::InvalidConfig(_)) => EXIT_FATAL,
            ReviveError::Recovery(_) | ReviveError::Io(_) => EXIT_FAILURE,
        }
    }
}
