//! The query-engine seam: everything that actually talks to a database.

use async_trait::async_trait;

use crate::command::{Command, ExecuteMode, Execution};
use crate::error::FluentDbError;
use crate::types::{DatabaseType, IsolationLevel};

/// Parameterized execution against one physical connection.
///
/// A `CommandSession` owns exactly one engine and never issues overlapping calls, so
/// implementations may assume strictly sequential use.
#[async_trait]
pub trait QueryEngine: Send {
    /// Provider this engine talks to.
    fn database_type(&self) -> DatabaseType;

    /// Whether the underlying connection is currently open.
    fn is_open(&self) -> bool;

    /// Open the underlying connection.
    ///
    /// # Errors
    /// Returns `FluentDbError::ConnectionError` (or a driver error) if the connection fails.
    async fn open(&mut self) -> Result<(), FluentDbError>;

    /// Close the underlying connection. Closing a closed engine is a no-op.
    ///
    /// # Errors
    /// Returns a driver error if the connection reports a failure while closing.
    async fn close(&mut self) -> Result<(), FluentDbError>;

    /// Execute a command and return every result set, the affected-row count and the
    /// values written to output parameters.
    ///
    /// # Errors
    /// Driver errors propagate unmodified.
    async fn run(&mut self, command: &Command, mode: ExecuteMode)
    -> Result<Execution, FluentDbError>;

    /// Start a transaction.
    ///
    /// # Errors
    /// Returns an error if the database refuses to start the transaction.
    async fn begin(&mut self, isolation_level: IsolationLevel) -> Result<(), FluentDbError>;

    /// Commit the active transaction.
    ///
    /// # Errors
    /// Returns an error if the commit fails.
    async fn commit(&mut self) -> Result<(), FluentDbError>;

    /// Roll back the active transaction.
    ///
    /// # Errors
    /// Returns an error if the rollback fails.
    async fn rollback(&mut self) -> Result<(), FluentDbError>;

    /// Ask the database to abandon the statement currently running on this connection.
    ///
    /// Called after a timeout or cancellation; the connection is not expected to be
    /// reusable afterward.
    fn cancel(&self) {}
}

