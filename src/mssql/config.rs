use tiberius::{AuthMethod, Config as TiberiusConfig};

use crate::error::FluentDbError;

/// Options for connecting to SQL Server.
#[derive(Debug, Clone)]
pub struct MssqlOptions {
    pub server: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub port: Option<u16>,
    pub instance_name: Option<String>,
    pub trust_cert: bool,
}

impl MssqlOptions {
    #[must_use]
    pub fn new(
        server: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            user: user.into(),
            password: password.into(),
            port: None,
            instance_name: None,
            trust_cert: true,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_instance_name(mut self, instance_name: Option<String>) -> Self {
        self.instance_name = instance_name;
        self
    }

    #[must_use]
    pub fn with_trust_cert(mut self, trust_cert: bool) -> Self {
        self.trust_cert = trust_cert;
        self
    }

    #[must_use]
    pub fn to_tiberius_config(&self) -> TiberiusConfig {
        let mut config = TiberiusConfig::new();
        config.host(&self.server);
        config.database(&self.database);
        config.port(self.port.unwrap_or(1433));
        config.authentication(AuthMethod::sql_server(&self.user, &self.password));
        if let Some(instance) = &self.instance_name {
            config.instance_name(instance);
        }
        if self.trust_cert {
            config.trust_cert();
        }
        config
    }
}

/// Parse an ADO.NET connection string
/// (`Server=tcp:host,1433;Database=app;User Id=sa;Password=...`).
///
/// # Errors
/// Returns `FluentDbError::ConfigError` if tiberius rejects the string.
pub fn config_from_ado_string(connection_string: &str) -> Result<TiberiusConfig, FluentDbError> {
    TiberiusConfig::from_ado_string(connection_string)
        .map_err(|e| FluentDbError::ConfigError(format!("invalid SQL Server connection string: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_address_from_options() {
        let config = MssqlOptions::new("db.local", "northwind", "sa", "pw")
            .with_port(Some(14330))
            .to_tiberius_config();
        assert_eq!(config.get_addr(), "db.local:14330");
    }

    #[test]
    fn parses_ado_strings() {
        let config =
            config_from_ado_string("Server=tcp:db.local,1433;Database=northwind;User Id=sa;Password=pw;TrustServerCertificate=true")
                .unwrap();
        assert_eq!(config.get_addr(), "db.local:1433");
    }
}
