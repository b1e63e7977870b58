//! CLI error types

use surety_core::SuretyError;
use thiserror::Error;

/// Failures of the offline driver, as opposed to rejected ledger calls
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or inconsistent transaction script
    #[error("Script error: {0}")]
    Script(String),

    /// Journal file does not verify
    #[error("Journal error: {0}")]
    Journal(String),

    /// Ledger refused an operation the driver itself depends on
    #[error("Ledger error: {0}")]
    Ledger(#[from] SuretyError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
