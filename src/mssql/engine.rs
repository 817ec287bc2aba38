use std::fmt;

use async_trait::async_trait;
use tiberius::{Config as TiberiusConfig, Query};
use tracing::debug;

use super::batch::build_batch;
use super::client::{MssqlClient, create_mssql_client};
use super::config::{MssqlOptions, config_from_ado_string};
use super::query::{build_result_sets, execute_batch};
use crate::command::{Command, ExecuteMode, Execution};
use crate::directives::reports_counts;
use crate::engine::QueryEngine;
use crate::error::FluentDbError;
use crate::types::{DatabaseType, IsolationLevel};

/// `QueryEngine` over one tiberius client.
///
/// Tiberius has no out-of-band cancel, so an interrupted command leaves the connection
/// mid-response; the session refuses further commands and the client should be disposed.
pub struct MssqlEngine {
    config: TiberiusConfig,
    client: Option<MssqlClient>,
}

impl MssqlEngine {
    #[must_use]
    pub fn new(options: &MssqlOptions) -> Self {
        Self::from_config(options.to_tiberius_config())
    }

    #[must_use]
    pub fn from_config(config: TiberiusConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    /// # Errors
    /// Returns `FluentDbError::ConfigError` if the connection string is unusable.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, FluentDbError> {
        config_from_ado_string(connection_string).map(Self::from_config)
    }

    fn client(&mut self) -> Result<&mut MssqlClient, FluentDbError> {
        self.client.as_mut().ok_or_else(|| {
            FluentDbError::ConnectionError("SQL Server connection is not open".into())
        })
    }

    async fn simple(&mut self, sql: &str) -> Result<(), FluentDbError> {
        Query::new(sql).execute(self.client()?).await?;
        Ok(())
    }
}

impl fmt::Debug for MssqlEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlEngine")
            .field("addr", &self.config.get_addr())
            .field("open", &self.client.is_some())
            .finish()
    }
}

fn isolation_statement(isolation_level: IsolationLevel) -> &'static str {
    match isolation_level {
        IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
        IsolationLevel::ReadCommitted => "READ COMMITTED",
        IsolationLevel::RepeatableRead => "REPEATABLE READ",
        IsolationLevel::Serializable => "SERIALIZABLE",
        IsolationLevel::Snapshot => "SNAPSHOT",
    }
}

#[async_trait]
impl QueryEngine for MssqlEngine {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Mssql
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    async fn open(&mut self) -> Result<(), FluentDbError> {
        if self.client.is_some() {
            return Ok(());
        }
        self.client = Some(create_mssql_client(self.config.clone()).await?);
        debug!(addr = %self.config.get_addr(), "sql server connection opened");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), FluentDbError> {
        match self.client.take() {
            Some(client) => Ok(client.close().await?),
            None => Ok(()),
        }
    }

    async fn run(&mut self, command: &Command, mode: ExecuteMode) -> Result<Execution, FluentDbError> {
        let batch = build_batch(command)?;
        let client = self.client()?;
        if mode == ExecuteMode::NonQuery && !command.parameters.has_outputs() {
            let mut rows_affected = execute_batch(client, &batch).await?;
            // silenced statements still send a zero count
            if !reports_counts(&command.text) {
                rows_affected = -1;
            }
            return Ok(Execution::from_raw(Vec::new(), rows_affected, &command.parameters));
        }
        // row counts are not surfaced by the query stream
        let result_sets = build_result_sets(client, &batch).await?;
        Ok(Execution::from_raw(result_sets, -1, &command.parameters))
    }

    async fn begin(&mut self, isolation_level: IsolationLevel) -> Result<(), FluentDbError> {
        let sql = format!(
            "SET TRANSACTION ISOLATION LEVEL {}; BEGIN TRANSACTION",
            isolation_statement(isolation_level)
        );
        self.simple(&sql).await
    }

    async fn commit(&mut self) -> Result<(), FluentDbError> {
        self.simple("COMMIT TRANSACTION").await
    }

    async fn rollback(&mut self) -> Result<(), FluentDbError> {
        self.simple("ROLLBACK TRANSACTION").await
    }
}
