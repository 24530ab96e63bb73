// Central Error Type for the Driver

use thiserror::Error;

/// Driver-level error type
///
/// Validation and launch failures are synchronous; anything that happens
/// after a successful launch is folded into the cached terminal
/// `ExitResult` instead of being raised here.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("running as uid {uid} is disallowed")]
    PolicyViolation { uid: u32 },

    #[error("unknown user {0}")]
    UnknownUser(String),

    #[error("Launch failed: {0}")]
    Launch(String),

    #[error("Task not found for given id")]
    TaskNotFound,

    #[error("Process error: {0}")]
    Process(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using DriverError
pub type Result<T> = std::result::Result<T, DriverError>;
