//! `SQLite` engine built on rusqlite.

mod config;
mod engine;
mod params;
mod query;

pub use config::SqliteOptions;
pub use engine::SqliteEngine;
