use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, InterruptHandle};
use tokio::sync::Mutex;
use tracing::debug;

use super::config::{SqliteOptions, procedure_key};
use super::query::run_batch;
use crate::command::{Command, ExecuteMode, Execution};
use crate::engine::QueryEngine;
use crate::error::FluentDbError;
use crate::types::{CommandKind, DatabaseType, IsolationLevel};

pub(crate) type SharedSqliteConnection = Arc<Mutex<Connection>>;

const ROLLBACK_BUSY_RETRIES: &[Duration] = &[
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
];

/// `QueryEngine` over one rusqlite connection.
///
/// rusqlite is synchronous, so every call runs on tokio's blocking pool.
pub struct SqliteEngine {
    options: SqliteOptions,
    conn: Option<SharedSqliteConnection>,
    interrupt: Option<InterruptHandle>,
}

impl SqliteEngine {
    #[must_use]
    pub fn new(options: SqliteOptions) -> Self {
        Self {
            options,
            conn: None,
            interrupt: None,
        }
    }

    /// # Errors
    /// Returns `FluentDbError::ConfigError` if the connection string is unusable.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, FluentDbError> {
        SqliteOptions::from_connection_string(connection_string).map(Self::new)
    }

    fn handle(&self) -> Result<SharedSqliteConnection, FluentDbError> {
        self.conn
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| FluentDbError::ConnectionError("SQLite connection is not open".into()))
    }

    fn procedure_body(&self, name: &str) -> Result<String, FluentDbError> {
        self.options
            .procedures
            .get(&procedure_key(name))
            .cloned()
            .ok_or_else(|| {
                FluentDbError::ExecutionError(format!("no stored procedure named {name} is registered"))
            })
    }
}

impl fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteEngine")
            .field("db_path", &self.options.db_path)
            .field("procedures", &self.options.procedures.len())
            .field("open", &self.conn.is_some())
            .finish()
    }
}

pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, FluentDbError>
where
    F: FnOnce(&mut Connection) -> Result<R, FluentDbError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| FluentDbError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}

fn rollback_with_busy_retries(conn: &Connection) -> Result<(), FluentDbError> {
    for (idx, delay) in ROLLBACK_BUSY_RETRIES.iter().copied().enumerate() {
        match conn.execute_batch("ROLLBACK") {
            Ok(()) => return Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::DatabaseBusy && idx + 1 < ROLLBACK_BUSY_RETRIES.len() =>
            {
                thread::sleep(delay);
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(FluentDbError::ExecutionError(
        "rollback retries exhausted".into(),
    ))
}

fn begin_statement(isolation_level: IsolationLevel) -> &'static str {
    match isolation_level {
        IsolationLevel::ReadUncommitted => "PRAGMA read_uncommitted = 1; BEGIN DEFERRED;",
        IsolationLevel::ReadCommitted => "PRAGMA read_uncommitted = 0; BEGIN DEFERRED;",
        // SQLite transactions are serializable; take the write lock up front
        IsolationLevel::RepeatableRead | IsolationLevel::Serializable | IsolationLevel::Snapshot => {
            "PRAGMA read_uncommitted = 0; BEGIN IMMEDIATE;"
        }
    }
}

#[async_trait]
impl QueryEngine for SqliteEngine {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    async fn open(&mut self) -> Result<(), FluentDbError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let path = self.options.db_path.clone();
        let busy_timeout = self.options.busy_timeout;
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, FluentDbError> {
            let conn = Connection::open(&path)?;
            conn.busy_timeout(busy_timeout)?;
            Ok(conn)
        })
        .await
        .map_err(|e| FluentDbError::ConnectionError(format!("sqlite open join error: {e}")))??;

        self.interrupt = Some(conn.get_interrupt_handle());
        self.conn = Some(Arc::new(Mutex::new(conn)));
        debug!(path = %self.options.db_path, "sqlite connection opened");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), FluentDbError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        self.interrupt = None;
        match Arc::try_unwrap(conn) {
            Ok(mutex) => {
                let conn = mutex.into_inner();
                tokio::task::spawn_blocking(move || conn.close().map_err(|(_, e)| e.into()))
                    .await
                    .map_err(|e| {
                        FluentDbError::ExecutionError(format!("sqlite close join error: {e}"))
                    })?
            }
            Err(_) => {
                // an interrupted statement still holds the handle; it closes on release
                debug!("sqlite connection still borrowed by an interrupted statement");
                Ok(())
            }
        }
    }

    async fn run(&mut self, command: &Command, mode: ExecuteMode) -> Result<Execution, FluentDbError> {
        let conn = self.handle()?;
        let sql = match command.kind {
            CommandKind::Text => command.text.clone(),
            CommandKind::StoredProcedure => self.procedure_body(&command.text)?,
        };
        let parameters = command.parameters.clone();
        run_blocking(conn, move |guard| run_batch(guard, &sql, &parameters, mode)).await
    }

    async fn begin(&mut self, isolation_level: IsolationLevel) -> Result<(), FluentDbError> {
        let sql = begin_statement(isolation_level);
        run_blocking(self.handle()?, move |guard| Ok(guard.execute_batch(sql)?)).await
    }

    async fn commit(&mut self) -> Result<(), FluentDbError> {
        run_blocking(self.handle()?, |guard| Ok(guard.execute_batch("COMMIT")?)).await
    }

    async fn rollback(&mut self) -> Result<(), FluentDbError> {
        run_blocking(self.handle()?, |guard| rollback_with_busy_retries(guard)).await
    }

    fn cancel(&self) {
        if let Some(interrupt) = &self.interrupt {
            interrupt.interrupt();
        }
    }
}
