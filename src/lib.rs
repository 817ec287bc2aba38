//! Fluent command sessions over `SQLite` and SQL Server.
//!
//! A [`CommandSession`] owns one connection. Configure it with chained `set_*` calls,
//! then finish with an `async` terminal call that runs the command and reshapes the
//! output: a row count, a scalar, one object, a list, a dictionary row, a forward-only
//! reader, several result sets at once, or multi-entity rows split on column names.
//!
//! ```rust,no_run
//! use sql_fluent::prelude::*;
//!
//! #[derive(serde::Deserialize)]
//! struct Category {
//!     category_id: i64,
//!     category_name: String,
//! }
//!
//! # async fn demo() -> Result<(), FluentDbError> {
//! let mut session = CommandSession::connect(&ConnectionConfig::sqlite("northwind.db")).await?;
//! let categories: Vec<Category> = session
//!     .set_command("SELECT CategoryID, CategoryName FROM Categories")
//!     .execute_list()
//!     .await?;
//! session.dispose().await;
//! # let _ = categories;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod materialize;
pub mod params;
pub mod prelude;
pub mod results;
pub mod session;
pub mod types;

#[cfg(any(feature = "sqlite", feature = "mssql"))]
mod directives;
#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use command::{Command, ExecuteMode, Execution};
pub use config::{ConnectionConfig, ConnectionSettings};
pub use engine::QueryEngine;
pub use error::FluentDbError;
pub use params::{Parameter, ParameterBag};
pub use results::{CustomDbRow, ResultSet};
pub use session::{CommandSession, Transaction};
pub use types::{CommandKind, DatabaseType, DbType, IsolationLevel, ParameterDirection, RowValues};
