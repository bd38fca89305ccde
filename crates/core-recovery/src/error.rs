//! Error types for the core recovery crate

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Invalid recovery configuration: {0}")]
    InvalidConfig(String),
}

impl RecoveryError {
    /// Whether this error reports an unknown module id
    pub fn is_not_found(&self) -> bool {
        matches!(self, RecoveryError::NotFound(_))
    }
}
