//! SQL Server engine built on tiberius.

mod batch;
mod client;
mod config;
mod engine;
mod query;

pub use batch::sql_type;
pub use client::MssqlClient;
pub use config::MssqlOptions;
pub use engine::MssqlEngine;
