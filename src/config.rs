//! Connection acquisition: provider + connection string → unopened engine.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::QueryEngine;
use crate::error::FluentDbError;
use crate::types::DatabaseType;

const ENV_PREFIX: &str = "FLUENT_SQL_";

/// A provider identifier and the connection string it understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub provider: DatabaseType,
    pub connection_string: String,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(provider: DatabaseType, connection_string: impl Into<String>) -> Self {
        Self {
            provider,
            connection_string: connection_string.into(),
        }
    }

    /// A `SQLite` database file, or `:memory:`.
    #[cfg(feature = "sqlite")]
    #[must_use]
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::new(DatabaseType::Sqlite, path)
    }

    /// A SQL Server ADO.NET connection string.
    #[cfg(feature = "mssql")]
    #[must_use]
    pub fn mssql(connection_string: impl Into<String>) -> Self {
        Self::new(DatabaseType::Mssql, connection_string)
    }

    /// Build the (unopened) engine for this provider.
    ///
    /// # Errors
    /// Returns `FluentDbError::ConfigError` if the connection string is unusable.
    pub fn build_engine(&self) -> Result<Box<dyn QueryEngine>, FluentDbError> {
        match self.provider {
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => Ok(Box::new(crate::sqlite::SqliteEngine::from_connection_string(
                &self.connection_string,
            )?)),
            #[cfg(feature = "mssql")]
            DatabaseType::Mssql => Ok(Box::new(crate::mssql::MssqlEngine::from_connection_string(
                &self.connection_string,
            )?)),
        }
    }
}

/// Named connections, typically loaded from a JSON settings file:
///
/// ```rust
/// use sql_fluent::prelude::*;
///
/// let settings = ConnectionSettings::from_json_str(r#"{
///     "default": "main",
///     "connections": {
///         "main": { "provider": "sqlite", "connection_string": "Data Source=app.db" }
///     }
/// }"#)?;
/// assert_eq!(settings.names().count(), 1);
/// # Ok::<(), FluentDbError>(())
/// ```
///
/// `FLUENT_SQL_<NAME>` in the environment replaces the connection string of `<name>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

impl ConnectionSettings {
    /// # Errors
    /// Returns `FluentDbError::ConfigError` if the JSON does not describe settings.
    pub fn from_json_str(json: &str) -> Result<Self, FluentDbError> {
        serde_json::from_str(json)
            .map_err(|e| FluentDbError::ConfigError(format!("invalid connection settings: {e}")))
    }

    /// # Errors
    /// Returns `FluentDbError::Io` if the file cannot be read, or
    /// `FluentDbError::ConfigError` if its contents are not valid settings.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FluentDbError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }

    /// Look up a named connection, applying any environment override.
    ///
    /// # Errors
    /// Returns `FluentDbError::ConfigError` if no connection has that name.
    pub fn get(&self, name: &str) -> Result<ConnectionConfig, FluentDbError> {
        self.resolve(name, |key| std::env::var(key).ok())
    }

    /// The connection named by `default`.
    ///
    /// # Errors
    /// Returns `FluentDbError::ConfigError` if no default is set or it names nothing.
    pub fn default_connection(&self) -> Result<ConnectionConfig, FluentDbError> {
        let name = self
            .default
            .as_deref()
            .ok_or_else(|| FluentDbError::ConfigError("no default connection configured".into()))?;
        self.get(name)
    }

    fn resolve<F>(&self, name: &str, env: F) -> Result<ConnectionConfig, FluentDbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self
            .connections
            .get(name)
            .cloned()
            .ok_or_else(|| FluentDbError::ConfigError(format!("unknown connection: {name}")))?;
        if let Some(overridden) = env(&env_key(name)) {
            config.connection_string = overridden;
        }
        Ok(config)
    }
}

fn env_key(name: &str) -> String {
    let suffix: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{ENV_PREFIX}{suffix}")
}
