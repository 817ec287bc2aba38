use tracing::{debug, warn};

use super::CommandSession;
use crate::error::FluentDbError;
use crate::types::IsolationLevel;

/// The transaction currently open on a session's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    isolation_level: IsolationLevel,
}

impl Transaction {
    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }
}

impl CommandSession {
    /// Start a transaction on the owned connection.
    ///
    /// # Errors
    /// `FluentDbError::InvalidOperation` if a transaction is already active,
    /// `FluentDbError::ObjectDisposed` after disposal, or the engine's error.
    pub async fn begin_transaction(
        &mut self,
        isolation_level: IsolationLevel,
    ) -> Result<(), FluentDbError> {
        let engine = self.engine.as_mut().ok_or(FluentDbError::ObjectDisposed)?;
        if self.transaction.is_some() {
            return Err(FluentDbError::InvalidOperation(
                "a transaction is already active on this session".into(),
            ));
        }
        engine.begin(isolation_level).await?;
        debug!(?isolation_level, "transaction started");
        self.transaction = Some(Transaction { isolation_level });
        Ok(())
    }

    /// Start a `ReadCommitted` transaction.
    ///
    /// # Errors
    /// See [`CommandSession::begin_transaction`].
    pub async fn begin_transaction_default(&mut self) -> Result<(), FluentDbError> {
        self.begin_transaction(IsolationLevel::default()).await
    }

    /// Commit the active transaction; does nothing when none is active.
    ///
    /// # Errors
    /// `FluentDbError::ObjectDisposed` after disposal, or the engine's error. A failed
    /// commit leaves the transaction in place.
    pub async fn commit_transaction(&mut self) -> Result<(), FluentDbError> {
        let engine = self.engine.as_mut().ok_or(FluentDbError::ObjectDisposed)?;
        if self.transaction.is_none() {
            return Ok(());
        }
        engine.commit().await?;
        debug!("transaction committed");
        self.transaction = None;
        Ok(())
    }

    /// Roll back the active transaction; does nothing when none is active.
    ///
    /// # Errors
    /// `FluentDbError::ObjectDisposed` after disposal, or the engine's error. A failed
    /// rollback leaves the transaction in place.
    pub async fn rollback_transaction(&mut self) -> Result<(), FluentDbError> {
        let engine = self.engine.as_mut().ok_or(FluentDbError::ObjectDisposed)?;
        if self.transaction.is_none() {
            return Ok(());
        }
        engine.rollback().await?;
        debug!("transaction rolled back");
        self.transaction = None;
        Ok(())
    }

    #[must_use]
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    /// Isolation level of the active transaction.
    #[must_use]
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.transaction.map(|tx| tx.isolation_level)
    }

    /// Close and release the engine. Safe to call any number of times; only the first
    /// call closes the connection.
    pub async fn dispose(&mut self) {
        let Some(mut engine) = self.engine.take() else {
            return;
        };
        self.transaction = None;
        if engine.is_open()
            && let Err(err) = engine.close().await
        {
            warn!(error = %err, "closing the connection failed during dispose");
        }
        debug!("command session disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.engine.is_none()
    }
}
