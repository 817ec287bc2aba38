use tiberius::{Client, Config as TiberiusConfig, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::error::FluentDbError;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Open a TCP connection (resolving named instances through SQL Browser) and log in.
///
/// # Errors
/// Returns `FluentDbError::ConnectionError` if the MSSQL connection fails.
pub async fn create_mssql_client(config: TiberiusConfig) -> Result<MssqlClient, FluentDbError> {
    let tcp = TcpStream::connect_named(&config)
        .await
        .map_err(|e| FluentDbError::ConnectionError(format!("TCP connection error: {e}")))?;
    tcp.set_nodelay(true)?;

    Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| FluentDbError::ConnectionError(format!("SQL Server connection error: {e}")))
}
