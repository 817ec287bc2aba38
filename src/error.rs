use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FluentDbError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Null or invalid configuration input (empty command text, empty parameter name, ...).
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// The session protocol was misused (double begin, terminal call without a command, ...).
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Command session has already been disposed")]
    ObjectDisposed,

    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("Expected {expected} result set(s) but the command produced {actual}")]
    ResultSetCountMismatch { expected: usize, actual: usize },

    #[error("Split column not found in result row: {0}")]
    SplitColumnNotFound(String),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command was cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl serde::de::Error for FluentDbError {
    fn custom<T: Display>(msg: T) -> Self {
        FluentDbError::Mapping(msg.to_string())
    }
}
