//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types so that a single
//! `use sql_fluent::prelude::*;` covers sessions, parameters and result shapes.

pub use crate::command::{Command, ExecuteMode, Execution};
pub use crate::config::{ConnectionConfig, ConnectionSettings};
pub use crate::engine::QueryEngine;
pub use crate::error::FluentDbError;
pub use crate::mapping::{Combine, FromSegments, ResultShapes, SplitOn};
pub use crate::materialize::{MappedRows, RowReader};
pub use crate::params::{Parameter, ParameterBag};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::session::{CommandSession, Transaction};
pub use crate::types::{
    CommandKind, DatabaseType, DbType, IsolationLevel, ParameterDirection, RowValues,
};

pub use tokio_util::sync::CancellationToken;

#[cfg(feature = "mssql")]
pub use crate::mssql::{MssqlEngine, MssqlOptions};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteEngine, SqliteOptions};
