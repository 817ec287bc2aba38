use std::collections::HashMap;
use std::time::Duration;

use crate::error::FluentDbError;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for opening a `SQLite` engine.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    pub busy_timeout: Duration,
    /// Stored procedure bodies keyed by lowercase name.
    pub(crate) procedures: HashMap<String, String>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            procedures: HashMap::new(),
        }
    }

    /// Parse an ADO-style connection string (`Data Source=app.db;Busy Timeout=2000`).
    /// A string without `=` is taken as the database path.
    ///
    /// # Errors
    /// Returns `FluentDbError::ConfigError` when no data source is given or a value
    /// cannot be parsed.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, FluentDbError> {
        let trimmed = connection_string.trim();
        if !trimmed.contains('=') {
            if trimmed.is_empty() {
                return Err(FluentDbError::ConfigError(
                    "SQLite connection string is empty".into(),
                ));
            }
            return Ok(Self::new(trimmed));
        }

        let mut db_path = None;
        let mut busy_timeout = DEFAULT_BUSY_TIMEOUT;
        for pair in trimmed.split(';').filter(|p| !p.trim().is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                FluentDbError::ConfigError(format!("malformed connection string entry: {pair}"))
            })?;
            let key = key.trim().to_ascii_lowercase().replace(' ', "");
            let value = value.trim();
            match key.as_str() {
                "datasource" | "filename" | "data" => db_path = Some(value.to_string()),
                "busytimeout" | "defaulttimeout" => {
                    let millis = value.parse::<u64>().map_err(|e| {
                        FluentDbError::ConfigError(format!("invalid busy timeout {value}: {e}"))
                    })?;
                    busy_timeout = Duration::from_millis(millis);
                }
                _ => {}
            }
        }

        let db_path = db_path.ok_or_else(|| {
            FluentDbError::ConfigError("SQLite connection string has no Data Source".into())
        })?;
        Ok(Self {
            busy_timeout,
            ..Self::new(db_path)
        })
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Register the SQL body run when a session calls the stored procedure `name`.
    ///
    /// Bodies see the session's parameters by name; output parameters are read from the
    /// body's final result set.
    #[must_use]
    pub fn with_procedure(mut self, name: &str, body: impl Into<String>) -> Self {
        self.procedures.insert(procedure_key(name), body.into());
        self
    }
}

pub(crate) fn procedure_key(name: &str) -> String {
    name.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ado_style_strings() {
        let opts =
            SqliteOptions::from_connection_string("Data Source=/tmp/app.db; Busy Timeout=250;")
                .unwrap();
        assert_eq!(opts.db_path, "/tmp/app.db");
        assert_eq!(opts.busy_timeout, Duration::from_millis(250));

        let opts = SqliteOptions::from_connection_string(":memory:").unwrap();
        assert_eq!(opts.db_path, ":memory:");
        assert_eq!(opts.busy_timeout, DEFAULT_BUSY_TIMEOUT);
    }

    #[test]
    fn rejects_unusable_strings() {
        assert!(matches!(
            SqliteOptions::from_connection_string("  "),
            Err(FluentDbError::ConfigError(_))
        ));
        assert!(matches!(
            SqliteOptions::from_connection_string("Mode=ro"),
            Err(FluentDbError::ConfigError(_))
        ));
        assert!(matches!(
            SqliteOptions::from_connection_string("Data Source=x.db;Busy Timeout=soon"),
            Err(FluentDbError::ConfigError(_))
        ));
    }

    #[test]
    fn procedure_names_ignore_case_and_brackets() {
        let opts = SqliteOptions::new(":memory:").with_procedure("[dbo.GetTotals]", "SELECT 1");
        assert!(opts.procedures.contains_key(&procedure_key("DBO.gettotals")));
    }
}
